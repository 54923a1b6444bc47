//! 临时写入与原子替换的辅助方法。

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// 可原子替换为 `target` 的隐藏临时文件。
pub struct AtomicFile {
    target: PathBuf,
    temp_path: PathBuf,
    file: File,
}

impl AtomicFile {
    /// 在目标路径同目录创建临时文件。
    pub async fn create(target: &Path) -> io::Result<Self> {
        let parent = target
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent"))?;
        let base = target
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| "image".into());
        let temp_path = parent.join(format!(".{base}.tmp.{}", Uuid::new_v4()));
        let file = File::create(&temp_path).await?;
        Ok(Self {
            target: target.to_path_buf(),
            temp_path,
            file,
        })
    }

    pub async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data).await
    }

    /// 放弃并清理临时文件。
    pub async fn discard(self) {
        drop(self.file);
        let _ = fs::remove_file(&self.temp_path).await;
    }

    /// 同步落盘并原子替换目标文件。
    pub async fn commit(self) -> io::Result<()> {
        self.file.sync_all().await?;
        drop(self.file);

        if let Err(err) = fs::rename(&self.temp_path, &self.target).await {
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(err);
        }

        if let Some(parent) = self.target.parent() {
            let _ = sync_dir(parent).await;
        }
        Ok(())
    }
}

async fn sync_dir(path: &Path) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let dir = std::fs::File::open(path)?;
        dir.sync_all()
    })
    .await
    .map_err(|err| io::Error::other(err.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn commit_moves_content_into_place() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("a.png");
        let mut file = AtomicFile::create(&target).await.expect("create");
        file.write_all(b"png").await.expect("write");
        file.commit().await.expect("commit");

        assert_eq!(fs::read(&target).await.expect("read"), b"png");
        let leftovers = std::fs::read_dir(temp.path()).expect("read dir").count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn discard_leaves_nothing_behind() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("a.png");
        let mut file = AtomicFile::create(&target).await.expect("create");
        file.write_all(b"png").await.expect("write");
        file.discard().await;

        assert!(std::fs::read_dir(temp.path()).expect("read dir").next().is_none());
    }
}

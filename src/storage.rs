use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::ErrorKind;
use tracing::{debug, warn};

use crate::atomic::AtomicFile;

/// 允许上传的图片扩展名（同时作为 MIME 子类型校验）。
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];

const NAME_ATTEMPTS: usize = 8;

/// 图片写入前已知的元数据。
#[derive(Clone, Debug)]
pub struct ImageMeta {
    pub original_name: String,
    pub mime_type: String,
    /// 小写，不含前导点。
    pub extension: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageEntry {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// 上传图片的存储后端。
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// 写入 `bytes` 并返回生成的存储文件名。
    async fn put(&self, meta: &ImageMeta, bytes: &[u8]) -> Result<String, StorageError>;
    async fn list(&self) -> Result<Vec<ImageEntry>, StorageError>;
    async fn delete(&self, name: &str) -> Result<(), StorageError>;
}

/// 以单层目录平铺存放图片的磁盘存储。
#[derive(Clone, Debug)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    async fn resolve_existing(&self, name: &str) -> Result<PathBuf, StorageError> {
        let name = check_name(name)?;
        let target = self.root.join(name);
        let metadata = fs::symlink_metadata(&target).await?;
        if !metadata.file_type().is_file() {
            return Err(StorageError::InvalidName);
        }
        Ok(target)
    }
}

#[async_trait]
impl ImageStore for DiskStore {
    async fn put(&self, meta: &ImageMeta, bytes: &[u8]) -> Result<String, StorageError> {
        for _ in 0..NAME_ATTEMPTS {
            let name = generate_stored_name(&meta.extension);
            let target = self.root.join(&name);
            if fs::try_exists(&target).await? {
                debug!(stored_name = name, "generated name already taken");
                continue;
            }

            let mut file = AtomicFile::create(&target).await?;
            if let Err(err) = file.write_all(bytes).await {
                file.discard().await;
                return Err(err.into());
            }
            file.commit().await?;
            return Ok(name);
        }
        Err(StorageError::Exhausted)
    }

    async fn list(&self) -> Result<Vec<ImageEntry>, StorageError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(root = %self.root.display(), "upload directory is missing");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        let mut entries = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || image_extension(&name).is_none() {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // 遍历期间已被删除。
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            entries.push(ImageEntry {
                name,
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let target = self.resolve_existing(name).await?;
        fs::remove_file(target).await?;
        Ok(())
    }
}

/// 生成 `<毫秒时间戳>-<1e9 以内随机数>.<扩展名>` 形式的文件名。
pub fn generate_stored_name(extension: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}-{}.{}", Utc::now().timestamp_millis(), suffix, extension)
}

/// 扩展名属于 [`ALLOWED_EXTENSIONS`] 时返回其小写形式。
pub fn image_extension(name: &str) -> Option<String> {
    let extension = Path::new(name)
        .extension()?
        .to_string_lossy()
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// 仅接受单个非隐藏路径组件。
fn check_name(name: &str) -> Result<&str, StorageError> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(StorageError::InvalidName);
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(StorageError::InvalidName),
    }
}

#[derive(Debug)]
pub enum StorageError {
    InvalidName,
    /// 生成的文件名均与已有文件冲突。
    Exhausted,
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn png_meta() -> ImageMeta {
        ImageMeta {
            original_name: "cat.PNG".into(),
            mime_type: "image/png".into(),
            extension: "png".into(),
        }
    }

    fn make_store() -> (tempfile::TempDir, DiskStore) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("upload");
        std::fs::create_dir_all(&root).expect("create upload root");
        (temp, DiskStore::new(root))
    }

    #[test]
    fn stored_name_keeps_extension() {
        let name = generate_stored_name("webp");
        let (stem, ext) = name.rsplit_once('.').expect("extension");
        assert_eq!(ext, "webp");
        let (millis, suffix) = stem.split_once('-').expect("separator");
        assert!(millis.parse::<i64>().is_ok());
        assert!(suffix.parse::<u32>().expect("suffix") < 1_000_000_000);
    }

    #[test]
    fn image_extension_filters_case_insensitively() {
        assert_eq!(image_extension("a.JPG").as_deref(), Some("jpg"));
        assert_eq!(image_extension("a.tar.gz"), None);
        assert_eq!(image_extension("noext"), None);
    }

    #[test]
    fn check_name_rejects_traversal() {
        assert!(check_name("../etc/passwd").is_err());
        assert!(check_name("a/b.png").is_err());
        assert!(check_name("..").is_err());
        assert!(check_name(".hidden.png").is_err());
        assert!(check_name("1-2.png").is_ok());
    }

    #[tokio::test]
    async fn put_then_list_then_delete() {
        let (_temp, store) = make_store();
        let name = store.put(&png_meta(), b"image").await.expect("put");
        assert!(name.ends_with(".png"));

        let entries = store.list().await.expect("list");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, name);
        assert_eq!(entries[0].size, 5);
        assert!(entries[0].modified.is_some());

        store.delete(&name).await.expect("delete");
        assert!(store.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn list_skips_non_images_and_hidden_files() {
        let (_temp, store) = make_store();
        std::fs::write(store.root_path().join("notes.txt"), b"x").expect("write");
        std::fs::write(store.root_path().join(".a.png.tmp.1"), b"x").expect("write");
        std::fs::create_dir(store.root_path().join("dir.png")).expect("mkdir");
        std::fs::write(store.root_path().join("b.GIF"), b"gif").expect("write");

        let entries = store.list().await.expect("list");
        let names: Vec<_> = entries.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["b.GIF"]);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let (_temp, store) = make_store();
        let result = store.delete("missing.png").await;
        assert!(matches!(result, Err(StorageError::Io(err)) if err.kind() == ErrorKind::NotFound));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn delete_rejects_symlink() {
        use std::os::unix::fs::symlink;

        let (temp, store) = make_store();
        let outside = temp.path().join("outside.png");
        std::fs::write(&outside, b"secret").expect("write outside file");
        symlink(&outside, store.root_path().join("link.png")).expect("symlink");

        let result = store.delete("link.png").await;
        assert!(matches!(result, Err(StorageError::InvalidName)));
        assert!(outside.exists());
    }

    #[tokio::test]
    async fn list_of_missing_root_is_empty() {
        let temp = tempdir().expect("tempdir");
        let store = DiskStore::new(temp.path().join("gone"));
        assert!(store.list().await.expect("list").is_empty());
    }
}

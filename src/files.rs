//! 已上传图片的列表与删除处理器。

use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::upload::{SharedStore, UploadConfig};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedImage {
    pub filename: String,
    pub url: String,
    pub size: u64,
    pub upload_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct DeletedImage {
    pub filename: String,
}

/// 列出已上传图片。
pub async fn list_images(
    Extension(store): Extension<SharedStore>,
    Extension(upload): Extension<Arc<UploadConfig>>,
    headers: HeaderMap,
) -> Result<Envelope<Vec<ListedImage>>, ApiError> {
    let images: Vec<ListedImage> = store
        .list()
        .await?
        .into_iter()
        .map(|entry| ListedImage {
            url: upload.image_url(&headers, &entry.name),
            filename: entry.name,
            size: entry.size,
            upload_time: entry.modified,
        })
        .collect();
    info!(count = images.len(), "list images");
    Ok(Envelope::with_message("image list loaded", images))
}

/// 按文件名删除图片，不做鉴权。
pub async fn delete_image(
    Path(filename): Path<String>,
    Extension(store): Extension<SharedStore>,
) -> Result<Envelope<DeletedImage>, ApiError> {
    store.delete(&filename).await?;
    info!(stored_name = filename, "image deleted");
    Ok(Envelope::with_message(
        "image deleted",
        DeletedImage { filename },
    ))
}

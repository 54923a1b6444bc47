//! 图片上传处理器（multipart）。
//!
//! 单次请求要么全部成功，要么全部失败：所有文件先读取并校验，再开始写盘；
//! 批量写入中途失败时，本次请求已写入的图片会被删除。

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Extension, Multipart};
use axum::http::{HeaderMap, StatusCode};
use mime_guess::mime::{self, Mime};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::MULTIPART_OVERHEAD;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::http::request_origin;
use crate::storage::{ALLOWED_EXTENSIONS, ImageMeta, ImageStore, image_extension};

pub type SharedStore = Arc<dyn ImageStore>;

pub const SINGLE_FIELD: &str = "image";
pub const WECHAT_FIELD: &str = "file";
pub const MULTIPLE_FIELD: &str = "images";

#[derive(Debug)]
pub struct UploadConfig {
    pub max_file_size: u64,
    pub max_files: usize,
    /// 已规范化，见 [`crate::config::normalize_public_path`]。
    pub public_path: String,
    pub public_base_url: Option<String>,
}

impl UploadConfig {
    /// 上传路由的请求体大小上限。
    pub fn body_limit(&self) -> usize {
        let per_file = usize::try_from(self.max_file_size).unwrap_or(usize::MAX);
        per_file
            .saturating_mul(self.max_files.max(1))
            .saturating_add(MULTIPART_OVERHEAD)
    }

    /// 图片对外访问的绝对 URL。
    pub fn image_url(&self, headers: &HeaderMap, stored_name: &str) -> String {
        let origin = match self.public_base_url.as_deref() {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => request_origin(headers),
        };
        format!("{origin}{}/{stored_name}", self.public_path)
    }
}

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub filename: String,
    pub originalname: String,
    pub size: u64,
    pub mimetype: String,
    pub url: String,
}

struct PendingImage {
    meta: ImageMeta,
    bytes: Vec<u8>,
}

/// 单图上传（`POST /api/upload/single`，字段 `image`）。
pub async fn upload_single(
    Extension(store): Extension<SharedStore>,
    Extension(upload): Extension<Arc<UploadConfig>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Envelope<UploadedFile>, ApiError> {
    upload_one(store, &upload, &headers, multipart?, SINGLE_FIELD).await
}

/// 小程序上传（`POST /api/upload/wechat`，字段 `file`）。
pub async fn upload_wechat(
    Extension(store): Extension<SharedStore>,
    Extension(upload): Extension<Arc<UploadConfig>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Envelope<UploadedFile>, ApiError> {
    upload_one(store, &upload, &headers, multipart?, WECHAT_FIELD).await
}

/// 多图上传（`POST /api/upload/multiple`，字段 `images`）。
pub async fn upload_multiple(
    Extension(store): Extension<SharedStore>,
    Extension(upload): Extension<Arc<UploadConfig>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Envelope<Vec<UploadedFile>>, ApiError> {
    let mut multipart = multipart?;
    let pending = collect_images(&mut multipart, MULTIPLE_FIELD, upload.max_files, &upload).await?;
    let uploaded = persist_all(store.as_ref(), &upload, &headers, pending).await?;
    info!(count = uploaded.len(), "images uploaded");
    let message = format!("uploaded {} images", uploaded.len());
    Ok(Envelope::with_message(message, uploaded))
}

async fn upload_one(
    store: SharedStore,
    upload: &UploadConfig,
    headers: &HeaderMap,
    mut multipart: Multipart,
    field_name: &str,
) -> Result<Envelope<UploadedFile>, ApiError> {
    let pending = collect_images(&mut multipart, field_name, 1, upload).await?;
    let uploaded = persist_all(store.as_ref(), upload, headers, pending)
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("no image persisted".into()))?;
    info!(
        stored_name = uploaded.filename,
        size = uploaded.size,
        "image uploaded"
    );
    Ok(Envelope::with_message("image uploaded", uploaded))
}

/// 读取 `field_name` 下的全部文件字段并逐个校验。
async fn collect_images(
    multipart: &mut Multipart,
    field_name: &str,
    max_count: usize,
    upload: &UploadConfig,
) -> Result<Vec<PendingImage>, ApiError> {
    let mut pending = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(original_name) = field.file_name().map(str::to_string) else {
            // 普通文本字段忽略。
            continue;
        };
        if field.name() != Some(field_name) {
            return Err(ApiError::BadRequest(format!(
                "unexpected file field `{}`",
                field.name().unwrap_or_default()
            )));
        }
        if pending.len() >= max_count {
            return Err(ApiError::BadRequest(format!(
                "too many files (max {max_count})"
            )));
        }

        let meta = validate_image(&original_name, field.content_type())?;
        let bytes = read_limited(field, upload.max_file_size).await?;
        pending.push(PendingImage { meta, bytes });
    }

    if pending.is_empty() {
        return Err(ApiError::BadRequest("please choose an image to upload".into()));
    }
    Ok(pending)
}

async fn read_limited(mut field: Field<'_>, max_size: u64) -> Result<Vec<u8>, ApiError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if (bytes.len() + chunk.len()) as u64 > max_size {
            return Err(ApiError::BadRequest(format!(
                "file exceeds the size limit (max {})",
                format_size(max_size)
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// 校验文件扩展名与声明的 MIME 类型均在允许列表内。
fn validate_image(original_name: &str, content_type: Option<&str>) -> Result<ImageMeta, ApiError> {
    let rejected = || {
        ApiError::BadRequest(format!(
            "only image files are allowed ({})",
            ALLOWED_EXTENSIONS.join(", ")
        ))
    };

    let extension = image_extension(original_name).ok_or_else(rejected)?;
    let declared: Mime = content_type
        .and_then(|value| value.parse().ok())
        .ok_or_else(rejected)?;
    let subtype = declared.subtype().as_str().to_ascii_lowercase();
    if declared.type_() != mime::IMAGE || !ALLOWED_EXTENSIONS.contains(&subtype.as_str()) {
        return Err(rejected());
    }

    Ok(ImageMeta {
        original_name: original_name.to_string(),
        mime_type: declared.essence_str().to_ascii_lowercase(),
        extension,
    })
}

async fn persist_all(
    store: &dyn ImageStore,
    upload: &UploadConfig,
    headers: &HeaderMap,
    pending: Vec<PendingImage>,
) -> Result<Vec<UploadedFile>, ApiError> {
    let mut uploaded: Vec<UploadedFile> = Vec::with_capacity(pending.len());

    for image in pending {
        match store.put(&image.meta, &image.bytes).await {
            Ok(stored_name) => uploaded.push(UploadedFile {
                url: upload.image_url(headers, &stored_name),
                filename: stored_name,
                originalname: image.meta.original_name,
                size: image.bytes.len() as u64,
                mimetype: image.meta.mime_type,
            }),
            Err(err) => {
                for done in &uploaded {
                    if store.delete(&done.filename).await.is_err() {
                        warn!(stored_name = done.filename, "failed to roll back stored image");
                    }
                }
                return Err(err.into());
            }
        }
    }

    Ok(uploaded)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::BadRequest("request body exceeds the upload limit".into());
    }
    ApiError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
}

fn format_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}

//! 处理器与路由测试共用的辅助方法。

use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use http_body_util::BodyExt;

use crate::config::{DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_FILES, DEFAULT_PUBLIC_PATH};
use crate::upload::UploadConfig;

pub const BOUNDARY: &str = "flora-test-boundary";

pub struct FilePart<'a> {
    pub field: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

impl<'a> FilePart<'a> {
    pub fn new(field: &'a str, filename: &'a str, content_type: &'a str, data: &'a [u8]) -> Self {
        Self {
            field,
            filename,
            content_type,
            data,
        }
    }
}

pub fn multipart_body(parts: &[FilePart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                part.field, part.filename, part.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, parts: &[FilePart<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::HOST, "localhost:3000")
        .body(Body::from(multipart_body(parts)))
        .expect("build multipart request")
}

pub fn test_upload_config() -> UploadConfig {
    UploadConfig {
        max_file_size: DEFAULT_MAX_FILE_SIZE,
        max_files: DEFAULT_MAX_FILES,
        public_path: DEFAULT_PUBLIC_PATH.to_string(),
        public_base_url: None,
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

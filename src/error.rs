//! 统一的 API 错误类型与转换。

use axum::extract::multipart::MultipartRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::io::ErrorKind;
use tracing::error;

use crate::envelope::Envelope;
use crate::storage::StorageError;
use crate::wechat::IdentityError;

const INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// 身份服务拒绝请求，原样转发其错误信息。
    Upstream(String),
    /// 仅记录日志，调用方只看到通用错误信息。
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Upstream(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// 返回状态码与对外错误信息，内部错误在此记录日志。
    pub fn into_parts(self) -> (StatusCode, String) {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => msg,
            ApiError::Upstream(msg) => format!("wechat api error: {msg}"),
            ApiError::Internal(detail) => {
                error!(error = %detail, "request failed");
                INTERNAL_MESSAGE.to_string()
            }
        };
        (status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.into_parts();
        Envelope::<()>::failure(status, message).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::InvalidName => ApiError::BadRequest("invalid file name".into()),
            StorageError::Exhausted => {
                ApiError::Internal("could not generate a unique file name".into())
            }
            StorageError::Io(err) => match err.kind() {
                ErrorKind::NotFound => ApiError::NotFound("image not found".into()),
                _ => ApiError::Internal(err.to_string()),
            },
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(format!(
            "invalid multipart request: {}",
            rejection.body_text()
        ))
    }
}

impl From<IdentityError> for ApiError {
    fn from(error: IdentityError) -> Self {
        match error {
            IdentityError::Rejected { errcode, errmsg } => {
                ApiError::Upstream(format!("{errmsg} ({errcode})"))
            }
            IdentityError::MissingOpenId => ApiError::BadRequest("failed to obtain openid".into()),
            IdentityError::NotConfigured => {
                ApiError::Internal("wechat appid/secret are not configured".into())
            }
            IdentityError::Transport(detail) => ApiError::Internal(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    use crate::test_support::body_json;

    #[tokio::test]
    async fn internal_error_hides_detail() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["code"], 500);
        assert_eq!(body["message"], INTERNAL_MESSAGE);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn upstream_error_relays_message() {
        let error: ApiError = IdentityError::Rejected {
            errcode: 40029,
            errmsg: "invalid code".into(),
        }
        .into();
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap_or("").contains("invalid code"));
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let error: ApiError = StorageError::Io(io::Error::from(ErrorKind::NotFound)).into();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }
}

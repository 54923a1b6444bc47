//! 模拟账号接口：创建用户与管理员登录。

use axum::Json;
use axum::extract::Extension;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::envelope::Outcome;
use crate::error::ApiError;
use crate::session::TokenIssuer;

const ADMIN_ROLE: &str = "admin";

#[derive(Debug)]
pub struct AccountConfig {
    pub admin_user: String,
    pub admin_pass: String,
}

#[derive(Deserialize)]
pub(crate) struct CreateUserRequest {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: u64,
    pub username: String,
    pub role: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoginSuccess {
    pub token: String,
    pub user: LoginUser,
}

/// 以 `{success, message}` 结构返回的错误。
#[derive(Debug)]
pub struct AccountError {
    status: StatusCode,
    message: String,
}

impl AccountError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        (self.status, Json(Outcome::failure(self.message))).into_response()
    }
}

impl From<JsonRejection> for AccountError {
    fn from(rejection: JsonRejection) -> Self {
        AccountError::new(
            StatusCode::BAD_REQUEST,
            format!("invalid request body: {}", rejection.body_text()),
        )
    }
}

impl From<ApiError> for AccountError {
    fn from(error: ApiError) -> Self {
        let (status, message) = error.into_parts();
        AccountError::new(status, message)
    }
}

/// 创建用户（`POST /api/users`）。
pub async fn create_user(
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Outcome<CreatedUser>>), AccountError> {
    let Json(payload) = payload?;
    let (Some(name), Some(email)) = (non_empty(payload.name), non_empty(payload.email)) else {
        return Err(AccountError::new(
            StatusCode::BAD_REQUEST,
            "name and email are required",
        ));
    };

    let now = Utc::now();
    let user = CreatedUser {
        id: now.timestamp_millis(),
        name,
        email,
        created_at: now,
    };
    info!(user_id = user.id, "user created");
    Ok((
        StatusCode::CREATED,
        Json(Outcome::success("user created", user)),
    ))
}

/// 管理员登录（`POST /api/login`）。
pub async fn login(
    Extension(accounts): Extension<Arc<AccountConfig>>,
    Extension(tokens): Extension<Arc<TokenIssuer>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Outcome<LoginSuccess>>, AccountError> {
    let Json(payload) = payload?;
    let (Some(username), Some(password)) =
        (non_empty(payload.username), non_empty(payload.password))
    else {
        return Err(AccountError::new(
            StatusCode::BAD_REQUEST,
            "username and password are required",
        ));
    };

    if username != accounts.admin_user || password != accounts.admin_pass {
        warn!(username, "login rejected");
        return Err(AccountError::new(
            StatusCode::UNAUTHORIZED,
            "invalid username or password",
        ));
    }

    let token = tokens.issue(&username, Some(ADMIN_ROLE))?;
    info!(username, "login succeeded");
    Ok(Json(Outcome::success(
        "login succeeded",
        LoginSuccess {
            token,
            user: LoginUser {
                id: 1,
                username,
                role: ADMIN_ROLE,
            },
        },
    )))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

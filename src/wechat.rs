//! 微信小程序登录：用 `wx.login` 返回的 code 换取 `openid`。

use async_trait::async_trait;
use axum::extract::{Extension, Path};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, UserProfile};
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::session::TokenIssuer;

#[derive(Debug)]
pub enum IdentityError {
    /// `jscode2session` 返回了非零 `errcode`。
    Rejected { errcode: i64, errmsg: String },
    MissingOpenId,
    NotConfigured,
    Transport(String),
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        IdentityError::Transport(format!("jscode2session: {err}"))
    }
}

/// 将短期有效的登录 code 换成稳定的用户标识。
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError>;
}

pub type SharedIdentity = Arc<dyn IdentityProvider>;

#[derive(Clone, Debug)]
pub struct WechatCredentials {
    pub appid: String,
    pub secret: String,
}

#[derive(Debug)]
pub struct WechatClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<WechatCredentials>,
}

#[derive(Deserialize)]
struct SessionResponse {
    openid: Option<String>,
    errcode: Option<i64>,
    errmsg: Option<String>,
}

impl WechatClient {
    pub fn new(
        base_url: &str,
        credentials: Option<WechatCredentials>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }
}

#[async_trait]
impl IdentityProvider for WechatClient {
    async fn exchange_code(&self, code: &str) -> Result<String, IdentityError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(IdentityError::NotConfigured)?;
        let response: SessionResponse = self
            .http
            .get(format!("{}/sns/jscode2session", self.base_url))
            .query(&[
                ("appid", credentials.appid.as_str()),
                ("secret", credentials.secret.as_str()),
                ("js_code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(errcode) = response.errcode.filter(|errcode| *errcode != 0) {
            let errmsg = response.errmsg.unwrap_or_default();
            warn!(errcode, errmsg, "jscode2session rejected code");
            return Err(IdentityError::Rejected { errcode, errmsg });
        }
        response
            .openid
            .filter(|openid| !openid.is_empty())
            .ok_or(IdentityError::MissingOpenId)
    }
}

#[derive(Debug, Serialize)]
pub struct LoginToken {
    pub token: String,
}

/// 微信登录（`GET /weixin/wxLogin/{code}`）。
pub async fn wx_login(
    Path(code): Path<String>,
    Extension(identity): Extension<SharedIdentity>,
    Extension(tokens): Extension<Arc<TokenIssuer>>,
) -> Result<Envelope<LoginToken>, ApiError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(missing_code());
    }

    let openid = identity.exchange_code(code).await?;
    debug!("wechat code exchanged");
    let token = tokens.issue(&openid, None)?;
    info!("wechat login succeeded");
    Ok(Envelope::ok(LoginToken { token }))
}

/// 未携带 code 的微信登录请求（`GET /weixin/wxLogin`）。
pub async fn wx_login_without_code() -> ApiError {
    missing_code()
}

fn missing_code() -> ApiError {
    ApiError::BadRequest("missing code parameter".into())
}

/// 返回目录中的默认用户资料（`GET /weixin/getuserInfo`）。
pub async fn user_info(Extension(catalog): Extension<Arc<Catalog>>) -> Envelope<UserProfile> {
    Envelope::ok(catalog.profile().clone())
}

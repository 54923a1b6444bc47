//! 登录成功后签发的应用令牌。

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// 微信 `openid` 或账号名。
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// 为 `subject` 签发 HS256 令牌。
    pub fn issue(&self, subject: &str, role: Option<&str>) -> Result<String, ApiError> {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: subject.to_string(),
            role: role.map(str::to_string),
            iat,
            exp: iat.saturating_add(ttl),
        };
        encode(&Header::default(), &claims, &self.key)
            .map_err(|err| ApiError::Internal(format!("sign token: {err}")))
    }
}

/// 未配置密钥时生成的 256 位十六进制随机密钥。
pub fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(64), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

    #[test]
    fn issued_token_carries_subject() {
        let issuer = TokenIssuer::new("test-secret", Duration::from_secs(60));
        let token = issuer.issue("openid-123", None).expect("issue");

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::new(Algorithm::HS256),
        )
        .expect("decode");
        assert_eq!(data.claims.sub, "openid-123");
        assert_eq!(data.claims.role, None);
        assert_eq!(data.claims.exp - data.claims.iat, 60);
    }

    #[test]
    fn token_does_not_verify_with_other_secret() {
        let issuer = TokenIssuer::new("test-secret", Duration::from_secs(60));
        let token = issuer.issue("admin", Some("admin")).expect("issue");

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(result.is_err());
    }

    #[test]
    fn random_secrets_differ() {
        let first = random_secret();
        assert_eq!(first.len(), 64);
        assert_ne!(first, random_secret());
    }
}

//! CLI arguments and server configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DEFAULT_UPLOAD_DIR: &str = "./assets/images/upload";
pub const DEFAULT_PUBLIC_PATH: &str = "/assets/images/upload";
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 10;
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_WECHAT_API_BASE: &str = "https://api.weixin.qq.com";
pub const DEFAULT_WECHAT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ADMIN_USER: &str = "admin";
pub const DEFAULT_ADMIN_PASS: &str = "123456";
/// Multipart framing overhead allowed on top of the file payloads.
pub const MULTIPART_OVERHEAD: usize = 1024 * 1024;
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "flora-server", version = VERSION_INFO, about = "Flora mini-program backend")]
pub struct Args {
    #[arg(
        short = 'b',
        long,
        env = "FLORA_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "PORT",
        default_value_t = 3000,
        help = "HTTP port"
    )]
    pub port: u16,
    #[arg(
        short = 'u',
        long,
        env = "FLORA_UPLOAD_DIR",
        default_value = DEFAULT_UPLOAD_DIR,
        help = "Directory uploaded images are stored in"
    )]
    pub upload_dir: String,
    #[arg(
        long,
        env = "FLORA_PUBLIC_PATH",
        default_value = DEFAULT_PUBLIC_PATH,
        help = "URL path prefix uploaded images are served under"
    )]
    pub public_path: String,
    #[arg(
        long,
        env = "FLORA_PUBLIC_BASE_URL",
        help = "Origin used in image URLs instead of the request Host header"
    )]
    pub public_base_url: Option<String>,
    #[arg(
        long,
        env = "FLORA_MAX_FILE_SIZE",
        default_value_t = DEFAULT_MAX_FILE_SIZE,
        help = "Max size of a single uploaded image in bytes"
    )]
    pub max_file_size: u64,
    #[arg(
        long,
        env = "FLORA_MAX_FILES",
        default_value_t = DEFAULT_MAX_FILES,
        help = "Max images per upload request"
    )]
    pub max_files: usize,
    #[arg(
        long,
        env = "JWT_SECRET",
        hide_env_values = true,
        help = "Token signing secret (random per process when unset)"
    )]
    pub jwt_secret: Option<String>,
    #[arg(
        long,
        env = "FLORA_TOKEN_TTL_SECS",
        default_value_t = DEFAULT_TOKEN_TTL_SECS,
        help = "Issued token lifetime in seconds"
    )]
    pub token_ttl_secs: u64,
    #[arg(long, env = "WECHAT_APPID", help = "WeChat mini-program app id")]
    pub wechat_appid: Option<String>,
    #[arg(
        long,
        env = "WECHAT_SECRET",
        hide_env_values = true,
        help = "WeChat mini-program app secret"
    )]
    pub wechat_secret: Option<String>,
    #[arg(
        long,
        env = "WECHAT_API_BASE",
        default_value = DEFAULT_WECHAT_API_BASE,
        help = "WeChat API base URL"
    )]
    pub wechat_api_base: String,
    #[arg(
        long,
        env = "WECHAT_TIMEOUT_SECS",
        default_value_t = DEFAULT_WECHAT_TIMEOUT_SECS,
        help = "Timeout for the code exchange request in seconds"
    )]
    pub wechat_timeout_secs: u64,
    #[arg(
        long,
        env = "FLORA_ADMIN_USER",
        default_value = DEFAULT_ADMIN_USER,
        help = "Username accepted by /api/login"
    )]
    pub admin_user: String,
    #[arg(
        long,
        env = "FLORA_ADMIN_PASS",
        default_value = DEFAULT_ADMIN_PASS,
        hide_default_value = true,
        help = "Password accepted by /api/login"
    )]
    pub admin_pass: String,
    #[arg(
        long,
        env = "FLORA_CATALOG_FILE",
        help = "JSON file replacing the embedded catalog"
    )]
    pub catalog_file: Option<String>,
    #[arg(long, env = "FLORA_CORS_ORIGINS", help = "Comma separated CORS origins")]
    pub cors_origins: Option<String>,
}

/// Normalizes a public path prefix to `/segment/...` without a trailing slash.
pub fn normalize_public_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    format!("/{trimmed}")
}

//! Flora 服务端入口。
//!
//! 花店小程序后端：图片上传与静态访问、微信登录换取会话、模拟账号与只读商品目录。
//! 入口负责加载配置、组装依赖、挂载路由并启动 HTTP 服务，收到退出信号后优雅关闭。

mod app;
mod atomic;
mod catalog;
mod config;
mod envelope;
mod error;
mod files;
mod http;
mod logging;
mod session;
mod storage;
mod upload;
mod users;
mod version;
mod wechat;

#[cfg(test)]
mod test_support;

use axum::extract::connect_info::ConnectInfo;
use axum::http::Request;
use axum::middleware;
use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span, warn};

use crate::app::Services;
use crate::catalog::Catalog;
use crate::config::{Args, SHUTDOWN_GRACE_SECS, normalize_public_path};
use crate::http::{add_security_headers, build_cors_layer, extract_forwarded_ip};
use crate::session::{TokenIssuer, random_secret};
use crate::storage::DiskStore;
use crate::upload::UploadConfig;
use crate::users::AccountConfig;
use crate::wechat::{WechatClient, WechatCredentials};

shadow!(build);

/// 启动服务并阻塞直到关闭。
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let public_path = normalize_public_path(&args.public_path);
    if public_path.is_empty() {
        return Err(invalid_input("public path must not be empty"));
    }

    let upload_dir = PathBuf::from(&args.upload_dir);
    let store = DiskStore::new(upload_dir.clone());
    store.ensure_root().await?;
    info!(
        upload_dir = %store.root_path().display(),
        public_path,
        "serving uploaded images"
    );

    let catalog = match args.catalog_file.as_deref() {
        Some(path) => Catalog::load(Path::new(path)).await?,
        None => Catalog::embedded()?,
    };

    let secret = args.jwt_secret.clone().unwrap_or_else(|| {
        warn!("JWT_SECRET is not set, issued tokens will not survive a restart");
        random_secret()
    });

    let credentials = match (args.wechat_appid.clone(), args.wechat_secret.clone()) {
        (Some(appid), Some(secret)) => Some(WechatCredentials { appid, secret }),
        _ => {
            warn!("WECHAT_APPID/WECHAT_SECRET are not set, wechat login is disabled");
            None
        }
    };
    let wechat = WechatClient::new(
        &args.wechat_api_base,
        credentials,
        Duration::from_secs(args.wechat_timeout_secs),
    )
    .map_err(|err| invalid_input(&err.to_string()))?;

    let services = Services {
        store: Arc::new(store),
        upload_dir,
        upload: Arc::new(UploadConfig {
            max_file_size: args.max_file_size,
            max_files: args.max_files,
            public_path,
            public_base_url: args.public_base_url.clone(),
        }),
        identity: Arc::new(wechat),
        tokens: Arc::new(TokenIssuer::new(
            &secret,
            Duration::from_secs(args.token_ttl_secs),
        )),
        accounts: Arc::new(AccountConfig {
            admin_user: args.admin_user.clone(),
            admin_pass: args.admin_pass.clone(),
        }),
        catalog: Arc::new(catalog),
    };

    let mut app = app::build_router(services)
        .layer(middleware::from_fn(add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let forwarded_ip =
                        extract_forwarded_ip(request.headers()).map(|ip| ip.to_string());
                    let connect_ip = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.to_string());
                    let client_ip = forwarded_ip
                        .or(connect_ip)
                        .unwrap_or_else(|| "unknown".to_string());

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    if let Some(cors_layer) = build_cors_layer(args.cors_origins.as_deref()) {
        app = app.layer(cors_layer);
    }

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| invalid_input(&err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);
    let handle = Handle::new();

    info!("🚀 Starting HTTP server at http://{}", addr);

    tokio::spawn(shutdown_signal(handle.clone()));
    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
}

fn invalid_input(message: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, message.to_string())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_GRACE_SECS)));
}

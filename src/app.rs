//! 路由表与共享依赖组装。

use axum::Router;
use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::catalog::{self, Catalog};
use crate::envelope::Outcome;
use crate::files;
use crate::session::TokenIssuer;
use crate::upload::{self, SharedStore, UploadConfig};
use crate::users::{self, AccountConfig};
use crate::version;
use crate::wechat::{self, SharedIdentity};

/// 通过请求扩展注入给处理器的共享依赖。
pub struct Services {
    pub store: SharedStore,
    /// 以静态文件形式挂载在 `upload.public_path` 下。
    pub upload_dir: PathBuf,
    pub upload: Arc<UploadConfig>,
    pub identity: SharedIdentity,
    pub tokens: Arc<TokenIssuer>,
    pub accounts: Arc<AccountConfig>,
    pub catalog: Arc<Catalog>,
}

pub fn build_router(services: Services) -> Router {
    let upload_routes = Router::new()
        .route("/api/upload/single", post(upload::upload_single))
        .route("/api/upload/wechat", post(upload::upload_wechat))
        .route("/api/upload/multiple", post(upload::upload_multiple))
        .layer(DefaultBodyLimit::max(services.upload.body_limit()));

    let mut app = Router::new()
        .route("/", get(index))
        .merge(upload_routes)
        .route("/api/upload/list", get(files::list_images))
        .route("/api/upload/{filename}", delete(files::delete_image))
        .route("/weixin/wxLogin", get(wechat::wx_login_without_code))
        .route("/weixin/wxLogin/", get(wechat::wx_login_without_code))
        .route("/weixin/wxLogin/{code}", get(wechat::wx_login))
        .route("/weixin/getuserInfo", get(wechat::user_info))
        .route("/index/findBanner", get(catalog::find_banner))
        .route("/index/findCategory1", get(catalog::find_category1))
        .route("/index/advertisement", get(catalog::advertisement))
        .route("/index/findListGoods", get(catalog::find_list_goods))
        .route("/index/findRecommendGoods", get(catalog::find_recommend_goods))
        .route("/index/findCategoryTree", get(catalog::find_category_tree))
        .route("/api/users", post(users::create_user))
        .route("/api/login", post(users::login))
        .route("/api/version", get(version::get_version_info));

    if !services.upload.public_path.is_empty() {
        app = app.nest_service(
            &services.upload.public_path,
            ServeDir::new(&services.upload_dir),
        );
    }

    app.fallback(not_found)
        .layer(Extension(services.store))
        .layer(Extension(services.upload))
        .layer(Extension(services.identity))
        .layer(Extension(services.tokens))
        .layer(Extension(services.accounts))
        .layer(Extension(services.catalog))
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "message": "flora server is running",
        "endpoints": {
            "POST /api/users": "create user",
            "POST /api/login": "admin login",
            "GET /weixin/wxLogin/{code}": "wechat login",
            "GET /weixin/getuserInfo": "wechat user profile",
            "POST /api/upload/single": "upload one image (field `image`)",
            "POST /api/upload/wechat": "upload one image from the mini-program (field `file`)",
            "POST /api/upload/multiple": "upload several images (field `images`)",
            "GET /api/upload/list": "list uploaded images",
            "DELETE /api/upload/{filename}": "delete an uploaded image",
            "GET /index/*": "shop catalog",
        },
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(Outcome::failure("route not found")),
    )
}

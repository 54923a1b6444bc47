//! 只读商品目录与 `/index/*` 接口。
//!
//! 目录在启动时加载一次，来源为内嵌的 JSON 资源或命令行指定的文件。

use axum::extract::Extension;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;

use crate::envelope::Envelope;

const CATALOG_ASSET: &str = "catalog.json";

#[derive(RustEmbed)]
#[folder = "data"]
struct CatalogAssets;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: u64,
    pub create_time: String,
    pub update_time: String,
    pub is_deleted: u8,
    pub title: String,
    pub image_url: String,
    pub link_url: String,
    pub sort: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    pub id: u64,
    pub name: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CategoryNode>,
}

/// 不含子分类的一级分类。
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: u64,
    pub name: String,
    pub image_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advertisement {
    pub id: u64,
    pub image_url: String,
    pub category2_id: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goods {
    pub id: u64,
    pub create_time: String,
    pub update_time: String,
    pub is_deleted: u8,
    pub category1_id: u64,
    pub category2_id: u64,
    pub name: String,
    pub price: f64,
    pub market_price: f64,
    pub sale_count: u64,
    pub stock_count: u64,
    pub image_url: String,
    pub floral_language: String,
    pub apply_user: String,
    pub material: String,
    pub packing: String,
    pub is_recommend: u8,
    #[serde(default)]
    pub detail_list: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub nickname: String,
    pub headimgurl: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    banners: Vec<Banner>,
    categories: Vec<CategoryNode>,
    advertisements: Vec<Advertisement>,
    goods: Vec<Goods>,
    profile: UserProfile,
}

impl Catalog {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let mut catalog: Catalog = serde_json::from_slice(bytes)?;
        catalog.banners.sort_by_key(|banner| banner.sort);
        Ok(catalog)
    }

    pub fn embedded() -> io::Result<Self> {
        let asset = CatalogAssets::get(CATALOG_ASSET).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "embedded catalog missing")
        })?;
        Self::from_json(&asset.data).map_err(io::Error::other)
    }

    pub async fn load(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path).await?;
        Self::from_json(&bytes).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: {err}", path.display()),
            )
        })
    }

    pub fn banners(&self) -> &[Banner] {
        &self.banners
    }

    pub fn top_categories(&self) -> Vec<CategorySummary> {
        self.categories
            .iter()
            .map(|node| CategorySummary {
                id: node.id,
                name: node.name.clone(),
                image_url: node.image_url.clone(),
            })
            .collect()
    }

    pub fn category_tree(&self) -> &[CategoryNode] {
        &self.categories
    }

    pub fn advertisements(&self) -> &[Advertisement] {
        &self.advertisements
    }

    pub fn goods(&self) -> &[Goods] {
        &self.goods
    }

    pub fn recommended_goods(&self) -> Vec<Goods> {
        self.goods
            .iter()
            .filter(|goods| goods.is_recommend == 1)
            .cloned()
            .collect()
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }
}

pub async fn find_banner(Extension(catalog): Extension<Arc<Catalog>>) -> Envelope<Vec<Banner>> {
    Envelope::ok(catalog.banners().to_vec())
}

pub async fn find_category1(
    Extension(catalog): Extension<Arc<Catalog>>,
) -> Envelope<Vec<CategorySummary>> {
    Envelope::ok(catalog.top_categories())
}

pub async fn advertisement(
    Extension(catalog): Extension<Arc<Catalog>>,
) -> Envelope<Vec<Advertisement>> {
    Envelope::ok(catalog.advertisements().to_vec())
}

pub async fn find_list_goods(Extension(catalog): Extension<Arc<Catalog>>) -> Envelope<Vec<Goods>> {
    Envelope::ok(catalog.goods().to_vec())
}

pub async fn find_recommend_goods(
    Extension(catalog): Extension<Arc<Catalog>>,
) -> Envelope<Vec<Goods>> {
    Envelope::ok(catalog.recommended_goods())
}

pub async fn find_category_tree(
    Extension(catalog): Extension<Arc<Catalog>>,
) -> Envelope<Vec<CategoryNode>> {
    Envelope::ok(catalog.category_tree().to_vec())
}

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::gateway::state::AppState;
use crate::gateway::types::{ok, ApiResult};
use crate::models::{Activity, ActivityStatus, Product};

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    #[serde(default)]
    pub seckill_only: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivitySummary {
    pub id: i64,
    pub name: String,
    pub window_start: chrono::DateTime<Utc>,
    pub window_end: chrono::DateTime<Utc>,
    pub discount: f64,
    pub limit_per_user: i64,
    pub is_active: bool,
}

impl ActivitySummary {
    fn from(activity: &Activity, now: chrono::DateTime<Utc>) -> Self {
        Self {
            id: activity.id,
            name: activity.name.clone(),
            window_start: activity.window_start,
            window_end: activity.window_end,
            discount: activity.discount,
            limit_per_user: activity.limit_per_user,
            is_active: activity.status == ActivityStatus::Active && activity.is_live_window(now),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductWithActivity {
    #[serde(flatten)]
    pub product: Product,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<ActivitySummary>,
}

/// GET /api/products
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListProductsQuery>,
) -> ApiResult<Vec<ProductWithActivity>> {
    let now = Utc::now();
    state.activity.sweep(now).await?;

    let products = state
        .store
        .list_products(query.category.as_deref(), query.q.as_deref(), query.seckill_only)
        .await?;

    let mut out = Vec::with_capacity(products.len());
    for product in products {
        let activity = if product.status == crate::models::ProductStatus::Seckill {
            state
                .activity
                .get_activity_by_product(product.id, now)
                .await?
                .map(|a| ActivitySummary::from(&a, now))
        } else {
            None
        };
        out.push(ProductWithActivity { product, activity });
    }
    ok(out)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SeckillStockData {
    pub stock: i64,
    pub is_active: bool,
}

/// GET /api/products/{id}/seckill-stock
pub async fn seckill_stock(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
) -> ApiResult<SeckillStockData> {
    let now = Utc::now();
    state.activity.sweep(now).await?;

    let product = state.store.get_product(product_id).await?;
    let is_active = product.status == crate::models::ProductStatus::Seckill
        && product
            .window_start
            .zip(product.window_end)
            .is_some_and(|(s, e)| now >= s && now < e);

    let stock = match state.cache.get(&crate::cache::keys::stock(product_id)).await? {
        Some(raw) => raw.parse().unwrap_or(0),
        None => state.store.authoritative_seckill_stock(product_id).await?,
    };

    ok(SeckillStockData { stock, is_active })
}

/// GET /api/products/{id}/activity
pub async fn product_activity(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
) -> ApiResult<Option<ActivitySummary>> {
    let now = Utc::now();
    state.activity.sweep(now).await?;

    let activity = state
        .activity
        .get_activity_by_product(product_id, now)
        .await?
        .map(|a| ActivitySummary::from(&a, now));
    ok(activity)
}

//! Admin-port handlers (spec.md §6): CRUD on products/activities and the
//! `/start` trigger. No separate admin auth scheme is specified — the admin
//! port is assumed to sit behind network-level access control, matching the
//! teacher's own split between the public gateway and its internal-only
//! mock routes.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::activity::CreateActivityRequest as ActivityCreate;
use crate::gateway::state::AppState;
use crate::gateway::types::{ok, ApiError, ApiResult};
use crate::models::{Activity, Product, ProductStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: u64,
    pub stock: i64,
    pub category: String,
}

/// POST /api/products
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProductRequest>,
) -> ApiResult<Product> {
    let product = Product {
        id: 0,
        name: req.name,
        price: crate::money::Money::new(req.price),
        stock: req.stock,
        seckill_stock: 0,
        category: req.category,
        window_start: None,
        window_end: None,
        status: ProductStatus::Normal,
    };
    let created = state.store.create_product(product).await?;
    ok(created)
}

/// GET /api/products (admin listing, no sweep side effect)
pub async fn list_products(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Product>> {
    let products = state.store.list_products(None, None, false).await?;
    ok(products)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: String,
    pub price: u64,
    pub stock: i64,
    pub category: String,
}

/// PUT /api/products/{id}
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<i64>,
    Json(req): Json<UpdateProductRequest>,
) -> ApiResult<Product> {
    let mut product = state.store.get_product(product_id).await?;
    product.name = req.name;
    product.price = crate::money::Money::new(req.price);
    product.stock = req.stock;
    product.category = req.category;
    state.store.update_product(&product).await?;
    ok(product)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateActivityApiRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    #[validate(range(min = 0.0001, max = 1.0))]
    pub discount: f64,
    #[validate(range(min = 1))]
    pub limit_per_user: i64,
    /// `{product_id: units}`; `product_ids` alone (no stock) is rejected —
    /// every product in an activity needs an explicit allocation request.
    pub product_stocks: HashMap<i64, i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductAllocationData {
    pub product_id: i64,
    pub requested_units: i64,
    pub allocated_units: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateActivityResponseData {
    pub activity: Activity,
    pub allocations: Vec<ProductAllocationData>,
}

/// POST /api/activities
pub async fn create_activity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateActivityApiRequest>,
) -> ApiResult<CreateActivityResponseData> {
    req.validate()
        .map_err(|e| ApiError::bad_request(crate::gateway::types::error_codes::INVALID_PARAMETER, e.to_string()))?;

    let (activity, allocations) = state
        .activity
        .create(ActivityCreate {
            name: req.name,
            description: req.description,
            window_start: req.window_start,
            window_end: req.window_end,
            discount: req.discount,
            limit_per_user: req.limit_per_user,
            product_stocks: req.product_stocks.into_iter().collect(),
        })
        .await?;

    ok(CreateActivityResponseData {
        activity,
        allocations: allocations
            .into_iter()
            .map(|a| ProductAllocationData {
                product_id: a.product_id,
                requested_units: a.requested_units,
                allocated_units: a.allocated_units,
                error: a.error,
            })
            .collect(),
    })
}

/// GET /api/activities
pub async fn list_activities(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Activity>> {
    let activities = state.store.list_activities().await?;
    ok(activities)
}

/// GET /api/activities/{id}
pub async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<i64>,
) -> ApiResult<Activity> {
    let activity = state.store.get_activity(activity_id).await?;
    ok(activity)
}

/// DELETE /api/activities/{id}
pub async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<i64>,
) -> ApiResult<()> {
    state.activity.cancel(activity_id).await?;
    ok(())
}

/// POST /api/seckill-activities/{id}/start
///
/// Triggers the same pending→active sweep every admission-adjacent handler
/// runs (spec.md §4.E); idempotent if the window hasn't opened yet.
pub async fn start_activity(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<i64>,
) -> ApiResult<Activity> {
    state.activity.sweep(Utc::now()).await?;
    let activity = state.store.get_activity(activity_id).await?;
    ok(activity)
}

/// GET /api/monitor
pub async fn monitor_stats(
    State(_state): State<Arc<AppState>>,
) -> ApiResult<crate::monitor::MonitorStats> {
    ok(crate::monitor::global().stats())
}

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Extension;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::Claims;
use crate::gateway::middleware::user_id_from_claims;
use crate::gateway::state::AppState;
use crate::gateway::types::{ok, ApiResult};

#[derive(Debug, Serialize, ToSchema)]
pub struct PathTokenData {
    pub path: String,
}

#[utoipa::path(
    get,
    path = "/api/seckill/{id}/path",
    params(("id" = i64, Path, description = "product id")),
    responses((status = 200, description = "Path token minted", body = PathTokenData)),
    tag = "Seckill"
)]
pub async fn issue_path(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(product_id): Path<i64>,
) -> ApiResult<PathTokenData> {
    let user_id = user_id_from_claims(&claims)?;
    state.activity.sweep(Utc::now()).await?;
    let path = state.admission.issue_path(user_id, product_id).await?;
    ok(PathTokenData { path })
}

#[utoipa::path(
    post,
    path = "/api/seckill/{id}/{path}",
    params(
        ("id" = i64, Path, description = "product id"),
        ("path" = String, Path, description = "path token from /path"),
    ),
    responses(
        (status = 200, description = "Accepted into the fulfillment queue"),
        (status = 400, description = "Business rule rejection (sold_out, over_limit, ...)"),
        (status = 429, description = "Rate limited"),
    ),
    tag = "Seckill"
)]
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path((product_id, path)): Path<(i64, String)>,
) -> ApiResult<&'static str> {
    let user_id = user_id_from_claims(&claims)?;

    if !state.submit_rate_limiter.allow() {
        return Err(crate::gateway::types::ApiError::rate_limited("rate_limited"));
    }

    state.activity.sweep(Utc::now()).await?;
    state.admission.seckill(user_id, product_id, &path).await?;
    ok("queued")
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SeckillResultData {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
}

/// The success-mark cache key is a fast-path hint; either way the order
/// table is the source of truth, so a cache miss falls back to a direct
/// scan (spec.md §7).
#[utoipa::path(
    get,
    path = "/api/seckill/{id}/result",
    params(("id" = i64, Path, description = "product id")),
    responses((status = 200, description = "Result for this user/product pair", body = SeckillResultData)),
    tag = "Seckill"
)]
pub async fn result(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(product_id): Path<i64>,
) -> ApiResult<SeckillResultData> {
    let user_id = user_id_from_claims(&claims)?;

    let order = state.store.find_order_by_user_product(user_id, product_id).await?;
    let data = match order {
        Some(order) => SeckillResultData {
            success: true,
            order_id: Some(order.id),
            status: Some(format!("{:?}", order.status).to_lowercase()),
            price: Some(order.price_paid.to_raw()),
        },
        None => SeckillResultData {
            success: false,
            order_id: None,
            status: None,
            price: None,
        },
    };
    ok(data)
}

//! Health check handler.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::gateway::types::ApiResponse;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub timestamp_ms: u64,
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service healthy", body = HealthResponse)),
    tag = "System"
)]
pub async fn health_check() -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    (StatusCode::OK, Json(ApiResponse::success(HealthResponse { timestamp_ms })))
}

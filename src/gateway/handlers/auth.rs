use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::gateway::state::AppState;
use crate::gateway::types::{ok, ApiError, ApiResult};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponseData {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponseData {
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses((status = 200, description = "User registered", body = RegisterResponseData)),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<RegisterResponseData> {
    req.validate()
        .map_err(|e| ApiError::bad_request(crate::gateway::types::error_codes::INVALID_PARAMETER, e.to_string()))?;

    let user_id = state.auth.register(&req.username, &req.password).await?;
    ok(RegisterResponseData {
        user_id,
        username: req.username,
    })
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses((status = 200, description = "Login succeeded", body = LoginResponseData)),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponseData> {
    req.validate()
        .map_err(|e| ApiError::bad_request(crate::gateway::types::error_codes::INVALID_PARAMETER, e.to_string()))?;

    let auth = state.auth.login(&req.username, &req.password).await?;
    ok(LoginResponseData { token: auth.token })
}

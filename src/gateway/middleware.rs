//! Auth middleware: verifies the raw token carried in the `Authorization`
//! header (spec.md §6: "raw token, no scheme prefix" — unlike a typical
//! `Bearer <token>` header, so this does not strip a prefix before
//! verifying) and injects [`Claims`] as a request extension for handlers.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;

use super::state::AppState;
use super::types::{error_codes, ApiError};
use crate::auth::Claims;

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized(error_codes::MISSING_AUTH, "missing_auth"))?
        .to_string();

    let claims = state.auth.verify(&token).await?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Pulls the verified user id out of request extensions. Only ever called
/// on routes behind [`auth_middleware`], so the extension is always present.
pub fn user_id_from_claims(claims: &Claims) -> Result<crate::core_types::UserId, ApiError> {
    claims
        .user_id()
        .map_err(|_| ApiError::unauthorized(error_codes::AUTH_FAILED, "invalid_token"))
}

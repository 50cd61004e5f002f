use std::sync::Arc;

use axum::extract::State;
use axum::Extension;

use crate::auth::Claims;
use crate::gateway::middleware::user_id_from_claims;
use crate::gateway::state::AppState;
use crate::gateway::types::{ok, ApiResult};
use crate::models::Order;

/// GET /api/orders
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Vec<Order>> {
    let user_id = user_id_from_claims(&claims)?;
    let orders = state.store.list_orders_by_user(user_id).await?;
    ok(orders)
}

//! HTTP Surface (component I): a thin dispatcher over the Token Issuer,
//! Activity Controller, Admission Service, and store, split across two
//! independent axum servers — a public user-facing API and an
//! operator-only admin API (spec.md §6).

pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use state::AppState;

/// Build the user-facing router: public product/catalog reads, plus the
/// auth-gated seckill and order routes.
fn user_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/products", get(handlers::products::list_products))
        .route(
            "/products/{id}/seckill-stock",
            get(handlers::products::seckill_stock),
        )
        .route(
            "/products/{id}/activity",
            get(handlers::products::product_activity),
        );

    let authenticated_routes = Router::new()
        .route("/seckill/{id}/path", get(handlers::seckill::issue_path))
        .route("/seckill/{id}/{path}", post(handlers::seckill::submit))
        .route("/seckill/{id}/result", get(handlers::seckill::result))
        .route("/orders", get(handlers::orders::list_orders))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    Router::new()
        .nest("/api", public_routes.merge(authenticated_routes))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .with_state(state)
}

/// Build the admin router: no auth middleware of its own (spec.md §6 leaves
/// admin-port protection to the deployment's network boundary, matching the
/// distinction the teacher draws between its public gateway and
/// internal-only mock routes).
fn admin_router(state: Arc<AppState>) -> Router {
    let product_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/products", post(handlers::admin::create_product))
        .route("/products", get(handlers::admin::list_products))
        .route("/products/{id}", put(handlers::admin::update_product));

    let activity_routes = Router::new()
        .route("/activities", post(handlers::admin::create_activity))
        .route("/activities", get(handlers::admin::list_activities))
        .route("/activities/{id}", get(handlers::admin::get_activity))
        .route("/activities/{id}", delete(handlers::admin::delete_activity))
        .route(
            "/seckill-activities/{id}/start",
            post(handlers::admin::start_activity),
        )
        .route("/monitor", get(handlers::admin::monitor_stats));

    Router::new()
        .nest("/api", product_routes.merge(activity_routes))
        .with_state(state)
}

/// Start the user-facing and admin HTTP servers concurrently. Each binds
/// its own listener and runs until the process exits or the handle is
/// aborted.
pub async fn run_servers(
    state: Arc<AppState>,
    user_port: u16,
    admin_port: u16,
) -> anyhow::Result<()> {
    let user_app = user_router(state.clone());
    let admin_app = admin_router(state);

    let user_listener = TcpListener::bind(("0.0.0.0", user_port)).await?;
    let admin_listener = TcpListener::bind(("0.0.0.0", admin_port)).await?;

    tracing::info!(port = user_port, "user API listening");
    tracing::info!(port = admin_port, "admin API listening");

    let user_server = axum::serve(user_listener, user_app);
    let admin_server = axum::serve(admin_listener, admin_app);

    tokio::try_join!(
        async { user_server.await.map_err(anyhow::Error::from) },
        async { admin_server.await.map_err(anyhow::Error::from) },
    )?;

    Ok(())
}

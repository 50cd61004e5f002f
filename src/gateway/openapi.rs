//! OpenAPI / Swagger UI documentation for the user-facing API.
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Seckill Engine API",
        version = "1.0.0",
        description = "Flash-sale admission and fulfillment engine."
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::auth::register,
        crate::gateway::handlers::auth::login,
        crate::gateway::handlers::seckill::issue_path,
        crate::gateway::handlers::seckill::submit,
        crate::gateway::handlers::seckill::result,
    ),
    components(schemas(
        crate::gateway::handlers::health::HealthResponse,
        crate::gateway::handlers::auth::RegisterRequest,
        crate::gateway::handlers::auth::RegisterResponseData,
        crate::gateway::handlers::auth::LoginRequest,
        crate::gateway::handlers::auth::LoginResponseData,
        crate::gateway::handlers::seckill::PathTokenData,
        crate::gateway::handlers::seckill::SeckillResultData,
    )),
    tags(
        (name = "System", description = "Health and readiness"),
        (name = "Auth", description = "Registration and login"),
        (name = "Seckill", description = "Path-token mint, submission, and result polling"),
    )
)]
pub struct ApiDoc;

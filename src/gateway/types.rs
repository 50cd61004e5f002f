//! API response envelope and error taxonomy (spec.md §6).
//!
//! - `ApiResponse<T>`: unified `{code, msg, data}` wrapper
//! - `ApiResult<T>`: handler return type alias
//! - `ApiError`: error type with `IntoResponse`, mapped from every adapter
//!   and service error in the crate so handlers can use `?` throughout
//! - `error_codes`: namespaced error code constants

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Unified response wrapper: `code=0` is success, `data` is omitted on error.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    #[schema(example = 0)]
    pub code: i32,
    #[schema(example = "ok")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

#[inline]
pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

/// Unified error type. Every fallible handler returns `ApiResult<T>`, so any
/// `From<...>` impl below lets `?` flow straight from an adapter or service
/// error into the HTTP response (spec.md §7's error-kind taxonomy).
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg)
    }

    pub fn unauthorized(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR, msg)
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, error_codes::RATE_LIMITED, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(ApiResponse::<()>::error(self.code, self.message))).into_response()
    }
}

impl From<crate::store::StoreError> for ApiError {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::NotFound => Self::not_found("not_found"),
            crate::store::StoreError::InsufficientFunds => {
                Self::bad_request(error_codes::INSUFFICIENT_FUNDS, "insufficient_funds")
            }
            crate::store::StoreError::Backend(msg) => Self::internal(msg),
        }
    }
}

impl From<crate::cache::CacheError> for ApiError {
    fn from(err: crate::cache::CacheError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<crate::activity::ActivityError> for ApiError {
    fn from(err: crate::activity::ActivityError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<crate::auth::AuthError> for ApiError {
    fn from(err: crate::auth::AuthError) -> Self {
        use crate::auth::AuthError as E;
        match err {
            E::InvalidCredentials => Self::unauthorized(error_codes::AUTH_FAILED, "invalid_credentials"),
            E::UsernameTaken => Self::bad_request(error_codes::USERNAME_TAKEN, "username_taken"),
            E::InvalidToken => Self::unauthorized(error_codes::AUTH_FAILED, "invalid_token"),
            E::Expired => Self::unauthorized(error_codes::TOKEN_EXPIRED, "expired_token"),
            E::Hashing(msg) => Self::internal(msg),
            E::Store(e) => e.into(),
            E::Cache(e) => e.into(),
        }
    }
}

/// Maps every `AdmissionError` variant to the stable `msg` string spec.md
/// §8's scenarios assert on directly.
impl From<crate::admission::AdmissionError> for ApiError {
    fn from(err: crate::admission::AdmissionError) -> Self {
        use crate::admission::AdmissionError as E;
        match err {
            E::NotFound => Self::not_found("not_found"),
            E::NotInSeckill => Self::bad_request(error_codes::BUSINESS_RULE, "not_in_seckill"),
            E::NotStarted => Self::bad_request(error_codes::BUSINESS_RULE, "not_started"),
            E::Ended => Self::bad_request(error_codes::BUSINESS_RULE, "ended"),
            E::InvalidPath => Self::bad_request(error_codes::BUSINESS_RULE, "invalid_path"),
            E::NoActiveActivity => Self::bad_request(error_codes::BUSINESS_RULE, "no_active_activity"),
            E::OverLimit => Self::bad_request(error_codes::BUSINESS_RULE, "over_limit"),
            E::SoldOut => Self::bad_request(error_codes::BUSINESS_RULE, "sold_out"),
            E::EnqueueFailed => Self::internal("enqueue_failed"),
            E::Store(e) => e.into(),
            E::Cache(e) => e.into(),
            E::Activity(e) => e.into(),
        }
    }
}

pub mod error_codes {
    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const BUSINESS_RULE: i32 = 1002;
    pub const USERNAME_TAKEN: i32 = 1003;
    pub const INSUFFICIENT_FUNDS: i32 = 1004;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;
    pub const TOKEN_EXPIRED: i32 = 2003;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4001;
    pub const RATE_LIMITED: i32 = 4291;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5001;
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("username already taken")]
    UsernameTaken,
    #[error("malformed token")]
    InvalidToken,
    #[error("expired token")]
    Expired,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("cache error: {0}")]
    Cache(#[from] crate::cache::CacheError),
}

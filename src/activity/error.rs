use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("cache error: {0}")]
    Cache(crate::cache::CacheError),
}

//! Key-Value Cache Adapter (component A).
//!
//! Exposes single-command atomic primitives only — `incr`/`decr` must be
//! native atomic round trips, never read-modify-write, so concurrent callers
//! observe a monotonically changing integer. Adapter errors are surfaced as
//! [`CacheError`]; this module never retries internally (§4.A).

mod memory;
mod redis_cache;

pub use memory::InMemoryCache;
pub use redis_cache::RedisCache;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait CacheAdapter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
    async fn setex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), CacheError>;
    async fn incr(&self, key: &str) -> Result<i64, CacheError>;
    async fn decr(&self, key: &str) -> Result<i64, CacheError>;
    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<(), CacheError>;
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
    async fn del(&self, key: &str) -> Result<(), CacheError>;
}

/// Cache key builders. Centralized so a typo in a format string can't create
/// a silently-orphaned key (cf. spec.md §3's "Cache keys" table).
pub mod keys {
    use crate::core_types::{ActivityId, ProductId, UserId};

    pub fn path(user: UserId, product: ProductId) -> String {
        format!("seckill:path:{user}:{product}")
    }

    pub fn stock(product: ProductId) -> String {
        format!("seckill:stock:{product}")
    }

    pub fn limit(user: UserId, product: ProductId, activity: ActivityId) -> String {
        format!("seckill:limit:{user}:{product}:{activity}")
    }

    pub fn succ(user: UserId, product: ProductId) -> String {
        format!("seckill:succ:{user}:{product}")
    }
}

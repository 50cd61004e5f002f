//! In-memory `CacheAdapter` test fake, `DashMap`-backed.
//!
//! TTLs are tracked as absolute expiry instants and checked lazily on read;
//! there is no background sweeper, which is fine for the bounded-lifetime
//! test scenarios this fake exists for.

use super::{CacheAdapter, CacheError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

#[derive(Default)]
pub struct InMemoryCache {
    store: DashMap<String, Entry>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_live(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Some(e) if e.is_live() => Some(e.value.clone()),
            Some(_) => {
                self.store.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl CacheAdapter for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.read_live(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.store.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn setex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), CacheError> {
        self.store.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let mut entry = self.store.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        if !entry.is_live() {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }
        let current: i64 = entry.value.parse().unwrap_or(0);
        let next = current + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn decr(&self, key: &str) -> Result<i64, CacheError> {
        let mut entry = self.store.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        if !entry.is_live() {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }
        let current: i64 = entry.value.parse().unwrap_or(0);
        let next = current - 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        if let Some(mut e) = self.store.get_mut(key) {
            e.expires_at = Some(Instant::now() + Duration::from_secs(ttl_seconds));
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.read_live(key).is_some())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn incr_decr_are_monotonic_round_trips() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.incr("k").await.unwrap(), 1);
        assert_eq!(cache.incr("k").await.unwrap(), 2);
        assert_eq!(cache.decr("k").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn setex_expires_after_ttl() {
        let cache = InMemoryCache::new();
        cache.setex("k", 0, "v").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn exists_and_del() {
        let cache = InMemoryCache::new();
        cache.set("k", "v").await.unwrap();
        assert!(cache.exists("k").await.unwrap());
        cache.del("k").await.unwrap();
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn decr_can_go_negative_for_rollback() {
        let cache = InMemoryCache::new();
        cache.set("stock", "0").await.unwrap();
        assert_eq!(cache.decr("stock").await.unwrap(), -1);
        assert_eq!(cache.incr("stock").await.unwrap(), 0);
    }
}

//! Verification-result cache: shards cached JWT claims across a consistent
//! hash ring keyed by auth node name, grounded in the original service's
//! `internal/auth/token_cache.go`. The ring itself doesn't change which
//! *process* serves a token (this crate runs as a single service, not the
//! original's fleet of auth nodes) — it changes which *cache key prefix* a
//! token maps to, which is what the Go version actually used the ring for:
//! spreading hot tokens' cache entries so a single Redis hash slot doesn't
//! become a bottleneck under a flash-sale's request burst.

use std::sync::Arc;

use super::hash_ring::HashRing;
use super::Claims;
use crate::cache::CacheAdapter;
use sha1::{Digest, Sha1};

pub struct TokenVerifyCache {
    cache: Arc<dyn CacheAdapter>,
    ring: HashRing,
    ttl_seconds: u64,
}

impl TokenVerifyCache {
    pub fn new(cache: Arc<dyn CacheAdapter>, ring: HashRing, ttl_seconds: u64) -> Self {
        Self {
            cache,
            ring,
            ttl_seconds,
        }
    }

    fn cache_key(&self, token: &str) -> String {
        let node = self.ring.get_node(token).unwrap_or("auth-node-default");
        let mut hasher = Sha1::new();
        hasher.update(token.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("auth:jwt:{node}:{digest}")
    }

    pub async fn get(&self, token: &str) -> Option<Claims> {
        let key = self.cache_key(token);
        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(claims) => Some(claims),
                Err(_) => {
                    // Corrupt entry: best-effort clear, fall through to a
                    // normal decode+verify on the caller's side.
                    let _ = self.cache.del(&key).await;
                    None
                }
            },
            _ => None,
        }
    }

    pub async fn set(&self, token: &str, claims: &Claims) {
        let key = self.cache_key(token);
        if let Ok(body) = serde_json::to_string(claims) {
            let _ = self.cache.setex(&key, self.ttl_seconds, &body).await;
        }
    }
}

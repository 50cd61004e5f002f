//! Cache/DB Reconciler (component H): a periodic sweep that repairs the
//! cache's `seckill:stock:{product}` counters against the store's
//! authoritative `seckill_stock` column.
//!
//! Grounded in the Go reference's `cmd/reconciler/main.go`, which runs the
//! same comparison on a ticker; adapted here onto a `tokio::time::interval`
//! task, matching the teacher's pattern of a long-lived background task
//! spawned alongside the HTTP servers in `main.rs`.

use std::sync::Arc;

use tracing::warn;

use crate::cache::{keys, CacheAdapter};
use crate::models::ProductStatus;
use crate::monitor::Monitor;
use crate::store::Store;

pub struct Reconciler {
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheAdapter>,
    monitor: &'static Monitor,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn CacheAdapter>) -> Self {
        Self {
            store,
            cache,
            monitor: crate::monitor::global(),
        }
    }

    /// Spawn the periodic sweep on `interval`. Runs until the returned
    /// handle is aborted or dropped along with the process.
    pub fn spawn(self: Arc<Self>, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.sweep_once().await;
            }
        })
    }

    /// One pass over every `status=seckill` product: compares the cache
    /// counter to the authoritative DB value and overwrites the cache on
    /// drift (spec.md §4.H: "the store is always right").
    pub async fn sweep_once(&self) {
        let products = match self.store.list_products(None, None, true).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "reconciler failed to list seckill products");
                self.monitor.record_db_error();
                return;
            }
        };

        for product in products {
            if product.status != ProductStatus::Seckill {
                continue;
            }
            if let Err(e) = self.reconcile_one(product.id).await {
                warn!(product_id = product.id, error = %e, "reconciler failed on product");
            }
        }
    }

    async fn reconcile_one(&self, product_id: i64) -> Result<(), crate::store::StoreError> {
        let authoritative = self.store.authoritative_seckill_stock(product_id).await?;
        let key = keys::stock(product_id);
        let cached: Option<i64> = self
            .cache
            .get(&key)
            .await
            .ok()
            .flatten()
            .and_then(|s| s.parse().ok());

        match cached {
            Some(cached) if cached == authoritative => {}
            Some(cached) => {
                let delta = authoritative - cached;
                warn!(product_id, cached, authoritative, delta, "cache/db stock drift corrected");
                if let Err(e) = self.cache.set(&key, &authoritative.to_string()).await {
                    warn!(product_id, error = %e, "failed to repair cache stock counter");
                }
            }
            None => {
                warn!(product_id, authoritative, "cache stock counter missing, seeding");
                if let Err(e) = self.cache.set(&key, &authoritative.to_string()).await {
                    warn!(product_id, error = %e, "failed to seed cache stock counter");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::money::Money;
    use crate::store::MemoryStore;

    fn sample_product(id: i64, seckill_stock: i64) -> crate::models::Product {
        crate::models::Product {
            id,
            name: "widget".into(),
            price: Money::new(500),
            stock: 0,
            seckill_stock,
            category: "misc".into(),
            window_start: None,
            window_end: None,
            status: ProductStatus::Seckill,
        }
    }

    #[tokio::test]
    async fn corrects_drifted_cache_counter() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        store.seed_product(sample_product(1, 10)).await;
        cache.set(&keys::stock(1), "15").await.unwrap();

        let reconciler = Reconciler::new(store.clone(), cache.clone());
        reconciler.sweep_once().await;

        let repaired: i64 = cache.get(&keys::stock(1)).await.unwrap().unwrap().parse().unwrap();
        assert_eq!(repaired, 10);
    }

    #[tokio::test]
    async fn seeds_missing_cache_counter() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        store.seed_product(sample_product(2, 7)).await;

        let reconciler = Reconciler::new(store.clone(), cache.clone());
        reconciler.sweep_once().await;

        let seeded: i64 = cache.get(&keys::stock(2)).await.unwrap().unwrap().parse().unwrap();
        assert_eq!(seeded, 7);
    }

    #[tokio::test]
    async fn leaves_matching_counter_untouched() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        store.seed_product(sample_product(3, 4)).await;
        cache.set(&keys::stock(3), "4").await.unwrap();

        let reconciler = Reconciler::new(store.clone(), cache.clone());
        reconciler.sweep_once().await;

        let value: i64 = cache.get(&keys::stock(3)).await.unwrap().unwrap().parse().unwrap();
        assert_eq!(value, 4);
    }

    #[tokio::test]
    async fn ignores_non_seckill_products() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let mut product = sample_product(4, 9);
        product.status = ProductStatus::Normal;
        store.seed_product(product).await;

        let reconciler = Reconciler::new(store.clone(), cache.clone());
        reconciler.sweep_once().await;

        assert!(cache.get(&keys::stock(4)).await.unwrap().is_none());
    }
}

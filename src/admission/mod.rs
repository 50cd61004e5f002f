//! Admission Service (component F): path-token mint/verify, eligibility
//! checks, atomic stock pre-decrement, per-user limit counter, enqueue.
//!
//! `seckill` implements spec.md §4.F's nine-step ordered contract literally
//! — each step gates the next, and every cache mutation made before a
//! failing step is rolled back in reverse order, except that the limit
//! counter survives an `enqueue_failed` (spec.md §7: "preserve the
//! anti-abuse property that attempted submissions count against the
//! per-user cap"). Grounded in the Go reference's `SeckillService.Seckill`,
//! generalized from its single Redis/AMQP pair to this crate's
//! `CacheAdapter`/`QueueAdapter` traits.

mod error;

pub use error::AdmissionError;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use tracing::warn;

use crate::activity::ActivityController;
use crate::cache::{keys, CacheAdapter};
use crate::core_types::{ProductId, UserId};
use crate::models::ProductStatus;
use crate::monitor::Monitor;
use crate::queue::{QueueAdapter, SeckillMessage};
use crate::store::Store;

pub struct AdmissionService {
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheAdapter>,
    queue: Arc<dyn QueueAdapter>,
    activity: Arc<ActivityController>,
    jwt_secret: String,
    path_token_ttl_secs: u64,
    limit_counter_ttl_secs: u64,
    monitor: &'static Monitor,
}

impl AdmissionService {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn CacheAdapter>,
        queue: Arc<dyn QueueAdapter>,
        activity: Arc<ActivityController>,
        jwt_secret: impl Into<String>,
        path_token_ttl_secs: u64,
        limit_counter_ttl_secs: u64,
    ) -> Self {
        Self {
            store,
            cache,
            queue,
            activity,
            jwt_secret: jwt_secret.into(),
            path_token_ttl_secs,
            limit_counter_ttl_secs,
            monitor: crate::monitor::global(),
        }
    }

    /// Endpoint 1: mint a path token for `(user, product)`. The token is a
    /// cheap nonce, not a capability — its job is to keep scrapers from
    /// submitting without the preceding GET (spec.md §4.F).
    pub async fn issue_path(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<String, AdmissionError> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let raw = format!("u{user_id}-p{product_id}-{nanos}-{}", self.jwt_secret);
        let token = hex::encode(md5::compute(raw.as_bytes()).0);

        self.cache
            .setex(&keys::path(user_id, product_id), self.path_token_ttl_secs, &token)
            .await?;
        Ok(token)
    }

    /// Endpoint 2: submit a seckill claim. Implements spec.md §4.F's
    /// nine-step ordered contract.
    pub async fn seckill(
        &self,
        user_id: UserId,
        product_id: ProductId,
        submitted_path: &str,
    ) -> Result<(), AdmissionError> {
        self.monitor.record_seckill_request();

        match self.seckill_inner(user_id, product_id, submitted_path).await {
            Ok(()) => {
                self.monitor.record_seckill_success();
                Ok(())
            }
            Err(e) => {
                self.monitor.record_seckill_error();
                Err(e)
            }
        }
    }

    async fn seckill_inner(
        &self,
        user_id: UserId,
        product_id: ProductId,
        submitted_path: &str,
    ) -> Result<(), AdmissionError> {
        // 1. Load product.
        let product = self
            .store
            .get_product(product_id)
            .await
            .map_err(|e| match e {
                crate::store::StoreError::NotFound => AdmissionError::NotFound,
                other => other.into(),
            })?;

        // 2. Require status=seckill.
        if product.status != ProductStatus::Seckill {
            return Err(AdmissionError::NotInSeckill);
        }

        // 3. Require window_start <= now < window_end (on the product).
        let now = Utc::now();
        if let (Some(start), Some(end)) = (product.window_start, product.window_end) {
            if now < start {
                return Err(AdmissionError::NotStarted);
            }
            if now >= end {
                return Err(AdmissionError::Ended);
            }
        }

        // 4. Path must match.
        let stored_path = self.cache.get(&keys::path(user_id, product_id)).await?;
        if stored_path.as_deref() != Some(submitted_path) {
            return Err(AdmissionError::InvalidPath);
        }

        // 5. Locate the active activity.
        let activity = self
            .activity
            .get_activity_by_product(product_id, now)
            .await?
            .filter(|a| a.status == crate::models::ActivityStatus::Active && a.is_live_window(now))
            .ok_or(AdmissionError::NoActiveActivity)?;

        // 6. Atomically bump the per-user limit counter.
        let limit_key = keys::limit(user_id, product_id, activity.id);
        let attempts = self.cache.incr(&limit_key).await?;
        if attempts == 1 {
            self.cache.expire(&limit_key, self.limit_counter_ttl_secs).await?;
        }
        if attempts > activity.limit_per_user {
            self.cache.decr(&limit_key).await?;
            return Err(AdmissionError::OverLimit);
        }

        // 7. Atomically pre-decrement stock.
        let stock_key = keys::stock(product_id);
        let remaining = self.cache.decr(&stock_key).await?;
        if remaining < 0 {
            self.cache.incr(&stock_key).await?;
            return Err(AdmissionError::SoldOut);
        }

        // 8. Publish the intent. On failure, roll back the stock decrement
        // only — the limit counter stands (spec.md §7).
        let msg = SeckillMessage { user_id, product_id };
        if let Err(e) = self.queue.publish(&msg).await {
            warn!(user_id, product_id, error = %e, "enqueue failed, rolling back stock decrement");
            self.monitor.record_queue_error();
            self.cache.incr(&stock_key).await?;
            return Err(AdmissionError::EnqueueFailed);
        }

        // 9. Accepted.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::CreateActivityRequest;
    use crate::cache::InMemoryCache;
    use crate::models::Product;
    use crate::money::Money;
    use crate::queue::InMemoryQueue;
    use crate::store::MemoryStore;
    use chrono::Duration;

    struct Harness {
        admission: AdmissionService,
        store: Arc<MemoryStore>,
        cache: Arc<InMemoryCache>,
        queue: Arc<InMemoryQueue>,
        activity: Arc<ActivityController>,
    }

    async fn harness() -> Harness {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let queue = Arc::new(InMemoryQueue::new());
        let activity = Arc::new(ActivityController::new(store.clone(), cache.clone()));
        let admission = AdmissionService::new(
            store.clone() as Arc<dyn Store>,
            cache.clone() as Arc<dyn CacheAdapter>,
            queue.clone() as Arc<dyn QueueAdapter>,
            activity.clone(),
            "test-secret",
            300,
            86_400,
        );
        Harness {
            admission,
            store,
            cache,
            queue,
            activity,
        }
    }

    fn sample_product(id: ProductId, seckill_stock: i64, window: (chrono::DateTime<Utc>, chrono::DateTime<Utc>)) -> Product {
        Product {
            id,
            name: "widget".into(),
            price: Money::new(500),
            stock: 0,
            seckill_stock,
            category: "misc".into(),
            window_start: Some(window.0),
            window_end: Some(window.1),
            status: ProductStatus::Seckill,
        }
    }

    async fn seed_active_activity(h: &Harness, product_id: ProductId, seckill_stock: i64, limit_per_user: i64) {
        let now = Utc::now();
        let window = (now - Duration::seconds(5), now + Duration::seconds(60));
        h.store
            .seed_product(sample_product(product_id, seckill_stock, window))
            .await;

        let (_activity, _) = h
            .activity
            .create(CreateActivityRequest {
                name: "flash".into(),
                description: String::new(),
                window_start: window.0,
                window_end: window.1,
                discount: 1.0,
                limit_per_user,
                product_stocks: vec![(product_id, seckill_stock)],
            })
            .await
            .unwrap();
        h.activity.sweep(now).await.unwrap();
    }

    #[tokio::test]
    async fn full_round_trip_accepts_and_enqueues() {
        let h = harness().await;
        seed_active_activity(&h, 1, 3, 1).await;

        let path = h.admission.issue_path(42, 1).await.unwrap();
        h.admission.seckill(42, 1, &path).await.unwrap();

        let delivery = h.queue.consume_one().await.unwrap();
        let msg: SeckillMessage = serde_json::from_slice(&delivery.payload).unwrap();
        assert_eq!(msg.user_id, 42);
        assert_eq!(msg.product_id, 1);
    }

    #[tokio::test]
    async fn invalid_path_is_rejected() {
        let h = harness().await;
        seed_active_activity(&h, 1, 3, 1).await;
        h.admission.issue_path(42, 1).await.unwrap();

        let err = h.admission.seckill(42, 1, "not-the-real-path").await.unwrap_err();
        assert_eq!(err, AdmissionError::InvalidPath);
    }

    #[tokio::test]
    async fn s1_sold_out_admits_exactly_the_allocated_stock() {
        let h = harness().await;
        seed_active_activity(&h, 1, 3, 1).await;

        let mut accepted = 0;
        let mut sold_out = 0;
        for user in 0..10 {
            let path = h.admission.issue_path(user, 1).await.unwrap();
            match h.admission.seckill(user, 1, &path).await {
                Ok(()) => accepted += 1,
                Err(AdmissionError::SoldOut) => sold_out += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(accepted, 3);
        assert_eq!(sold_out, 7);

        let remaining: i64 = h
            .cache
            .get(&keys::stock(1))
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn s2_limit_counts_attempts_not_successes() {
        let h = harness().await;
        seed_active_activity(&h, 1, 100, 2).await;

        let mut ok_count = 0;
        let mut over_limit = 0;
        for _ in 0..5 {
            let path = h.admission.issue_path(7, 1).await.unwrap();
            match h.admission.seckill(7, 1, &path).await {
                Ok(()) => ok_count += 1,
                Err(AdmissionError::OverLimit) => over_limit += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(ok_count, 2);
        assert_eq!(over_limit, 3);

        let activity = h.store.list_activities().await.unwrap().remove(0);
        let attempts: i64 = h
            .cache
            .get(&keys::limit(7, 1, activity.id))
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(attempts, 5);
    }

    #[tokio::test]
    async fn s3_window_not_started_then_ended() {
        let h = harness().await;
        let now = Utc::now();
        let window = (now + Duration::seconds(60), now + Duration::seconds(120));
        h.store.seed_product(sample_product(1, 3, window)).await;
        h.activity
            .create(CreateActivityRequest {
                name: "flash".into(),
                description: String::new(),
                window_start: window.0,
                window_end: window.1,
                discount: 1.0,
                limit_per_user: 1,
                product_stocks: vec![(1, 3)],
            })
            .await
            .unwrap();

        let path = h.admission.issue_path(1, 1).await.unwrap();
        let err = h.admission.seckill(1, 1, &path).await.unwrap_err();
        assert_eq!(err, AdmissionError::NotStarted);

        // Move the product's own window into the past to simulate `ended`.
        let mut product = h.store.get_product(1).await.unwrap();
        product.window_start = Some(now - Duration::seconds(120));
        product.window_end = Some(now - Duration::seconds(1));
        h.store.update_product(&product).await.unwrap();

        let err = h.admission.seckill(1, 1, &path).await.unwrap_err();
        assert_eq!(err, AdmissionError::Ended);
    }

    #[tokio::test]
    async fn s4_replay_path_succeeds_again_while_under_limit() {
        let h = harness().await;
        seed_active_activity(&h, 1, 100, 2).await;

        let path = h.admission.issue_path(9, 1).await.unwrap();
        h.admission.seckill(9, 1, &path).await.unwrap();
        // Same path, same user, still under limit_per_user=2: succeeds again.
        h.admission.seckill(9, 1, &path).await.unwrap();
        // A random 32-hex string was never stored: rejected.
        let err = h
            .admission
            .seckill(9, 1, "00000000000000000000000000000000")
            .await
            .unwrap_err();
        assert_eq!(err, AdmissionError::InvalidPath);
    }

    #[tokio::test]
    async fn s5_publish_failure_rolls_back_stock_but_not_limit() {
        let h = harness().await;
        seed_active_activity(&h, 1, 5, 3).await;
        let path = h.admission.issue_path(1, 1).await.unwrap();
        let activity = h.store.list_activities().await.unwrap().remove(0);

        // Simulate a broker outage with a queue that always fails publish.
        struct AlwaysFailsQueue;
        #[async_trait::async_trait]
        impl crate::queue::QueueAdapter for AlwaysFailsQueue {
            async fn publish(&self, _msg: &SeckillMessage) -> Result<(), crate::queue::QueueError> {
                Err(crate::queue::QueueError::Backend("broker down".into()))
            }
            async fn consume_one(&self) -> Result<crate::queue::Delivery, crate::queue::QueueError> {
                Err(crate::queue::QueueError::Backend("broker down".into()))
            }
        }

        let broken_admission = AdmissionService::new(
            h.store.clone() as Arc<dyn Store>,
            h.cache.clone() as Arc<dyn CacheAdapter>,
            Arc::new(AlwaysFailsQueue) as Arc<dyn QueueAdapter>,
            h.activity.clone(),
            "test-secret",
            300,
            86_400,
        );

        let stock_before: i64 = h
            .cache
            .get(&keys::stock(1))
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        let limit_before: i64 = h
            .cache
            .get(&keys::limit(1, 1, activity.id))
            .await
            .unwrap()
            .map(|v| v.parse().unwrap())
            .unwrap_or(0);

        let err = broken_admission.seckill(1, 1, &path).await.unwrap_err();
        assert_eq!(err, AdmissionError::EnqueueFailed);

        let stock_after: i64 = h
            .cache
            .get(&keys::stock(1))
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        let limit_after: i64 = h
            .cache
            .get(&keys::limit(1, 1, activity.id))
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();

        assert_eq!(stock_after, stock_before);
        assert_eq!(limit_after, limit_before + 1);
    }
}

//! Fulfillment Worker (component G): consumes the durable queue with
//! explicit ack, performs the authoritative debit + order insert + success
//! mark, and compensates on failure. Grounded in the Go reference's
//! `cmd/seckill-worker/main.go` consumer loop, generalized over this
//! crate's `QueueAdapter`/`Store`/`CacheAdapter` traits and split into a
//! pure-ish `handle_delivery` core (decide ack/nack) separate from the pool
//! loop that actually resolves the delivery — mirroring the split the
//! teacher's `internal_transfer` FSM keeps between "decide the next state"
//! and "persist/transmit it".

mod error;

pub use error::{DeliveryOutcome, FulfillmentError};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::activity::ActivityController;
use crate::cache::{keys, CacheAdapter};
use crate::core_types::ProductId;
use crate::models::{ActivityStatus, Order};
use crate::money::Money;
use crate::monitor::Monitor;
use crate::queue::{QueueAdapter, SeckillMessage};
use crate::store::Store;

pub struct FulfillmentWorker {
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheAdapter>,
    queue: Arc<dyn QueueAdapter>,
    activity: Arc<ActivityController>,
    succ_mark_ttl_secs: u64,
    monitor: &'static Monitor,
}

impl FulfillmentWorker {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn CacheAdapter>,
        queue: Arc<dyn QueueAdapter>,
        activity: Arc<ActivityController>,
        succ_mark_ttl_secs: u64,
    ) -> Self {
        Self {
            store,
            cache,
            queue,
            activity,
            succ_mark_ttl_secs,
            monitor: crate::monitor::global(),
        }
    }

    /// Spawn `concurrency` tasks, each consuming one message at a time
    /// forever (spec.md §5's scheduling model). Returns the join handles so
    /// callers can hold or abort them.
    pub fn spawn_pool(self: Arc<Self>, concurrency: usize) -> Vec<JoinHandle<()>> {
        (0..concurrency.max(1))
            .map(|worker_id| {
                let worker = self.clone();
                tokio::spawn(async move { worker.run_loop(worker_id).await })
            })
            .collect()
    }

    async fn run_loop(&self, worker_id: usize) {
        loop {
            let delivery = match self.queue.consume_one().await {
                Ok(d) => d,
                Err(e) => {
                    warn!(worker_id, error = %e, "queue consume failed, backing off");
                    self.monitor.record_queue_error();
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    continue;
                }
            };

            let (outcome, _order) = self.handle_delivery(&delivery.payload).await;
            let resolve = match outcome {
                DeliveryOutcome::Ack => delivery.ack().await,
                DeliveryOutcome::NackRequeue => delivery.nack_requeue().await,
                DeliveryOutcome::NackDrop => delivery.nack_drop().await,
            };
            if let Err(e) = resolve {
                warn!(worker_id, error = %e, "failed to resolve delivery");
                self.monitor.record_queue_error();
            }
        }
    }

    /// Core per-message handling: spec.md §4.G's eight-step contract. Public
    /// so tests (and an eventual offline replay tool) can drive it directly
    /// against a raw payload without a live queue.
    pub async fn handle_delivery(&self, payload: &[u8]) -> (DeliveryOutcome, Option<Order>) {
        // 1. Parse. Poison message: drop, never redeliver.
        let msg: SeckillMessage = match serde_json::from_slice(payload) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "poison message, dropping");
                return (DeliveryOutcome::NackDrop, None);
            }
        };

        // 2. Load product.
        let product = match self.store.get_product(msg.product_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(product_id = msg.product_id, error = %e, "product load failed, requeueing");
                self.monitor.record_db_error();
                self.compensate_cache_stock(msg.product_id).await;
                return (DeliveryOutcome::NackRequeue, None);
            }
        };

        // 3-4. Atomic authoritative decrement, guarded by `seckill_stock > 0`.
        match self.store.try_decrement_seckill_stock(msg.product_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(product_id = msg.product_id, "seckill_stock exhausted at fulfillment, requeueing");
                self.monitor.record_worker_failed();
                self.compensate_cache_stock(msg.product_id).await;
                return (DeliveryOutcome::NackRequeue, None);
            }
            Err(e) => {
                warn!(product_id = msg.product_id, error = %e, "decrement failed, requeueing");
                self.monitor.record_db_error();
                self.compensate_cache_stock(msg.product_id).await;
                return (DeliveryOutcome::NackRequeue, None);
            }
        }

        // 5. Price: discounted if a valid active activity exists.
        let price = self.price_for(&product, msg.product_id).await;

        // 6-7. Debit, insert order, record ledger entry, all in one
        // transaction. On failure, compensate the step-4 decrement.
        match self
            .store
            .debit_and_record_order(msg.user_id, msg.product_id, price)
            .await
        {
            Ok(order) => {
                // 8. Success mark, best-effort (spec.md §7: "the order is
                // real; the success mark is a fast-path hint").
                self.mark_success(msg.user_id, msg.product_id).await;
                self.monitor.record_worker_processed();
                (DeliveryOutcome::Ack, Some(order))
            }
            Err(e) => {
                warn!(user_id = msg.user_id, product_id = msg.product_id, error = %e, "debit failed, compensating and requeueing");
                self.monitor.record_worker_failed();
                if let Err(e) = self.store.compensate_seckill_stock(msg.product_id).await {
                    warn!(product_id = msg.product_id, error = %e, "failed to compensate seckill_stock");
                    self.monitor.record_db_error();
                }
                (DeliveryOutcome::NackRequeue, None)
            }
        }
    }

    async fn price_for(&self, product: &crate::models::Product, product_id: ProductId) -> Money {
        let now = Utc::now();
        match self.activity.get_activity_by_product(product_id, now).await {
            Ok(Some(activity))
                if activity.status == ActivityStatus::Active
                    && activity.discount > 0.0
                    && activity.discount <= 1.0 =>
            {
                let discounted = (product.price.to_raw() as f64 * activity.discount).round();
                Money::new(discounted as u64)
            }
            _ => product.price,
        }
    }

    /// Compensates the admission-time cache decrement whenever fulfillment
    /// cannot consume the pre-allocated unit (spec.md §4.G's final
    /// paragraph). This is the only path by which the cache counter
    /// recovers such units.
    async fn compensate_cache_stock(&self, product_id: ProductId) {
        if let Err(e) = self.cache.incr(&keys::stock(product_id)).await {
            warn!(product_id, error = %e, "failed to compensate cache stock counter");
        }
    }

    async fn mark_success(&self, user_id: crate::core_types::UserId, product_id: ProductId) {
        let key = keys::succ(user_id, product_id);
        match self.cache.incr(&key).await {
            Ok(1) => {
                if let Err(e) = self.cache.expire(&key, self.succ_mark_ttl_secs).await {
                    warn!(user_id, product_id, error = %e, "failed to set succ mark TTL");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(user_id, product_id, error = %e, "failed to set succ mark"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityController, CreateActivityRequest};
    use crate::cache::InMemoryCache;
    use crate::models::{Product, ProductStatus};
    use crate::store::MemoryStore;
    use chrono::Duration as ChronoDuration;

    struct Harness {
        worker: FulfillmentWorker,
        store: Arc<MemoryStore>,
        cache: Arc<InMemoryCache>,
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let activity = Arc::new(ActivityController::new(
            store.clone() as Arc<dyn Store>,
            cache.clone() as Arc<dyn CacheAdapter>,
        ));
        let worker = FulfillmentWorker::new(
            store.clone() as Arc<dyn Store>,
            cache.clone() as Arc<dyn CacheAdapter>,
            Arc::new(crate::queue::InMemoryQueue::new()) as Arc<dyn QueueAdapter>,
            activity,
            86_400,
        );
        Harness { worker, store, cache }
    }

    fn sample_product(id: ProductId, seckill_stock: i64) -> Product {
        Product {
            id,
            name: "widget".into(),
            price: Money::new(1_000),
            stock: 0,
            seckill_stock,
            category: "misc".into(),
            window_start: None,
            window_end: None,
            status: ProductStatus::Seckill,
        }
    }

    fn payload(user_id: i64, product_id: i64) -> Vec<u8> {
        serde_json::to_vec(&SeckillMessage { user_id, product_id }).unwrap()
    }

    #[tokio::test]
    async fn poison_message_is_dropped() {
        let h = harness().await;
        let (outcome, order) = h.worker.handle_delivery(b"not json").await;
        assert_eq!(outcome, DeliveryOutcome::NackDrop);
        assert!(order.is_none());
    }

    #[tokio::test]
    async fn missing_product_requeues_and_compensates_cache() {
        let h = harness().await;
        h.cache.set(&keys::stock(1), "0").await.unwrap();
        let (outcome, order) = h.worker.handle_delivery(&payload(1, 1)).await;
        assert_eq!(outcome, DeliveryOutcome::NackRequeue);
        assert!(order.is_none());
        let stock: i64 = h.cache.get(&keys::stock(1)).await.unwrap().unwrap().parse().unwrap();
        assert_eq!(stock, 1);
    }

    #[tokio::test]
    async fn exhausted_stock_requeues_and_compensates_cache() {
        let h = harness().await;
        h.store.seed_product(sample_product(1, 0)).await;
        h.cache.set(&keys::stock(1), "0").await.unwrap();

        let (outcome, _) = h.worker.handle_delivery(&payload(1, 1)).await;
        assert_eq!(outcome, DeliveryOutcome::NackRequeue);
        let stock: i64 = h.cache.get(&keys::stock(1)).await.unwrap().unwrap().parse().unwrap();
        assert_eq!(stock, 1);
    }

    #[tokio::test]
    async fn insufficient_funds_compensates_db_not_cache() {
        let h = harness().await;
        h.store.seed_product(sample_product(1, 5)).await;
        h.store.seed_account(9, Money::new(0)).await;
        h.cache.set(&keys::stock(1), "3").await.unwrap();

        let (outcome, order) = h.worker.handle_delivery(&payload(9, 1)).await;
        assert_eq!(outcome, DeliveryOutcome::NackRequeue);
        assert!(order.is_none());

        let product = h.store.get_product(1).await.unwrap();
        assert_eq!(product.seckill_stock, 5, "db decrement must be compensated back");

        let cache_stock: i64 = h.cache.get(&keys::stock(1)).await.unwrap().unwrap().parse().unwrap();
        assert_eq!(cache_stock, 3, "cache is not touched on a transactional failure");
    }

    #[tokio::test]
    async fn success_debits_creates_order_and_sets_succ_mark() {
        let h = harness().await;
        h.store.seed_product(sample_product(1, 5)).await;
        h.store.seed_account(9, Money::new(10_000)).await;

        let (outcome, order) = h.worker.handle_delivery(&payload(9, 1)).await;
        assert_eq!(outcome, DeliveryOutcome::Ack);
        let order = order.unwrap();
        assert_eq!(order.price_paid, Money::new(1_000));

        let product = h.store.get_product(1).await.unwrap();
        assert_eq!(product.seckill_stock, 4);

        let succ: i64 = h
            .cache
            .get(&keys::succ(9, 1))
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(succ, 1);
    }

    #[tokio::test]
    async fn applies_activity_discount_to_price() {
        let h = harness().await;
        h.store.seed_product(sample_product(1, 5)).await;
        h.store.seed_account(9, Money::new(10_000)).await;

        let now = Utc::now();
        let controller = ActivityController::new(
            h.store.clone() as Arc<dyn Store>,
            h.cache.clone() as Arc<dyn CacheAdapter>,
        );
        controller
            .create(CreateActivityRequest {
                name: "half off".into(),
                description: String::new(),
                window_start: now - ChronoDuration::seconds(5),
                window_end: now + ChronoDuration::seconds(60),
                discount: 0.5,
                limit_per_user: 1,
                product_stocks: vec![(1, 5)],
            })
            .await
            .unwrap();
        controller.sweep(now).await.unwrap();

        let (outcome, order) = h.worker.handle_delivery(&payload(9, 1)).await;
        assert_eq!(outcome, DeliveryOutcome::Ack);
        assert_eq!(order.unwrap().price_paid, Money::new(500));
    }
}

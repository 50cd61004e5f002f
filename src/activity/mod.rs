//! Activity Controller (component E): the time-windowed state machine that
//! gates admission and seeds the admission cache counter.
//!
//! The transition function itself is pure — no I/O, straightforward to unit
//! test — and `ActivityController` is the thin orchestrator that applies its
//! side effects (seeding/clearing `seckill:stock:{product}`, flipping
//! `Product.status`) transactionally through the store. Grounded in the Go
//! reference's `SeckillActivityService`, which keeps the same split between
//! "decide the next state" and "apply it".

mod error;

pub use error::ActivityError;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{keys, CacheAdapter};
use crate::core_types::{ActivityId, ProductId};
use crate::models::{Activity, ActivityStatus};
use crate::store::Store;

/// Request body for admin activity creation (spec.md §4.E "Create").
pub struct CreateActivityRequest {
    pub name: String,
    pub description: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub discount: f64,
    pub limit_per_user: i64,
    pub product_stocks: Vec<(ProductId, i64)>,
}

/// Per-product outcome of `create`. Allocation is not atomic across
/// products — each product's allocation either succeeds for some amount (up
/// to its requested units) or fails independently; a failure on one product
/// never aborts the others.
#[derive(Debug, Clone)]
pub struct ProductAllocationResult {
    pub product_id: ProductId,
    pub requested_units: i64,
    pub allocated_units: i64,
    pub error: Option<String>,
}

/// Pure transition function: given an activity and the current time, what
/// status should it be in? Returns `None` when no transition applies
/// (already in the terminal/correct state for `now`). Idempotent: calling
/// this repeatedly with the same `(activity, now)` always yields the same
/// answer, so sweeping twice in a row is harmless.
pub fn next(activity: &Activity, now: DateTime<Utc>) -> Option<ActivityStatus> {
    match activity.status {
        ActivityStatus::Pending if now >= activity.window_start && now < activity.window_end => {
            Some(ActivityStatus::Active)
        }
        ActivityStatus::Active if now >= activity.window_end => Some(ActivityStatus::Ended),
        _ => None,
    }
}

pub struct ActivityController {
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheAdapter>,
}

impl ActivityController {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn CacheAdapter>) -> Self {
        Self { store, cache }
    }

    /// Admin create: persists the activity row, then attempts to allocate
    /// stock for each requested product independently.
    pub async fn create(
        &self,
        req: CreateActivityRequest,
    ) -> Result<(Activity, Vec<ProductAllocationResult>), ActivityError> {
        let activity = self
            .store
            .create_activity(Activity {
                id: 0,
                name: req.name,
                description: req.description,
                window_start: req.window_start,
                window_end: req.window_end,
                discount: req.discount,
                limit_per_user: req.limit_per_user,
                status: ActivityStatus::Pending,
            })
            .await?;

        let mut results = Vec::with_capacity(req.product_stocks.len());
        for (product_id, requested_units) in req.product_stocks {
            match self
                .store
                .allocate_for_activity(activity.id, product_id, requested_units)
                .await
            {
                Ok(allocated_units) => results.push(ProductAllocationResult {
                    product_id,
                    requested_units,
                    allocated_units,
                    error: None,
                }),
                Err(e) => results.push(ProductAllocationResult {
                    product_id,
                    requested_units,
                    allocated_units: 0,
                    error: Some(e.to_string()),
                }),
            }
        }

        Ok((activity, results))
    }

    /// Best-effort sweep over every non-terminal activity, applying any
    /// transition `now` warrants. Called at the start of every
    /// admission-adjacent HTTP handler and on the reconciler's timer.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<(), ActivityError> {
        let activities = self.store.list_activities().await?;
        for activity in activities {
            if let Some(target) = next(&activity, now) {
                self.apply_transition(&activity, target).await?;
            }
        }
        Ok(())
    }

    async fn apply_transition(
        &self,
        activity: &Activity,
        target: ActivityStatus,
    ) -> Result<(), ActivityError> {
        let joins = self.store.list_by_activity(activity.id).await?;
        match target {
            ActivityStatus::Active => {
                for join in &joins {
                    let seeded = self
                        .store
                        .activate_product(activity.id, join.product_id)
                        .await?;
                    self.cache
                        .set(&keys::stock(join.product_id), &seeded.to_string())
                        .await
                        .map_err(ActivityError::Cache)?;

                    // Stamp the product with this activity's window so the
                    // admission service's step-3 check (spec.md §4.F) can
                    // read it straight off the product row.
                    let mut product = self.store.get_product(join.product_id).await?;
                    product.window_start = Some(activity.window_start);
                    product.window_end = Some(activity.window_end);
                    self.store.update_product(&product).await?;
                }
                info!(activity_id = activity.id, "activity transitioned to active");
            }
            ActivityStatus::Ended => {
                for join in &joins {
                    self.store.end_product(activity.id, join.product_id).await?;
                }
                info!(activity_id = activity.id, "activity transitioned to ended");
            }
            ActivityStatus::Pending | ActivityStatus::Cancelled => {}
        }

        let mut updated = activity.clone();
        updated.status = target;
        self.store.update_activity(&updated).await?;
        Ok(())
    }

    /// Admin delete or cancel: returns unsold `seckill_stock` to
    /// `product.stock` for every joined product, then marks the activity
    /// cancelled (spec.md §4.E: same return-stock policy for delete and
    /// cancel).
    pub async fn cancel(&self, activity_id: ActivityId) -> Result<(), ActivityError> {
        let mut activity = self.store.get_activity(activity_id).await?;
        let joins = self.store.list_by_activity(activity_id).await?;
        for join in &joins {
            self.store
                .return_unsold_stock(activity_id, join.product_id)
                .await?;
        }
        activity.status = ActivityStatus::Cancelled;
        self.store.update_activity(&activity).await?;
        Ok(())
    }

    /// spec.md §4.E: "the unique active join's activity if one exists in
    /// `(window_start, window_end)`; otherwise the most recent."
    pub async fn get_activity_by_product(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<Option<Activity>, ActivityError> {
        let joins = self.store.list_by_product(product_id).await?;
        if joins.is_empty() {
            return Ok(None);
        }

        let mut most_recent: Option<Activity> = None;
        for join in &joins {
            let activity = match self.store.get_activity(join.activity_id).await {
                Ok(a) => a,
                Err(crate::store::StoreError::NotFound) => continue,
                Err(e) => return Err(e.into()),
            };
            if activity.status == ActivityStatus::Active && activity.is_live_window(now) {
                return Ok(Some(activity));
            }
            most_recent = match most_recent {
                Some(current) if current.id >= activity.id => Some(current),
                _ => Some(activity),
            };
        }

        if most_recent.is_none() {
            warn!(product_id, "no resolvable activity for product");
        }
        Ok(most_recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn controller() -> (ActivityController, Arc<MemoryStore>, Arc<InMemoryCache>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let controller = ActivityController::new(store.clone(), cache.clone());
        (controller, store, cache)
    }

    #[test]
    fn next_is_none_for_pending_before_window() {
        let now = Utc::now();
        let activity = Activity {
            id: 1,
            name: "a".into(),
            description: String::new(),
            window_start: now + Duration::seconds(60),
            window_end: now + Duration::seconds(120),
            discount: 1.0,
            limit_per_user: 1,
            status: ActivityStatus::Pending,
        };
        assert_eq!(next(&activity, now), None);
    }

    #[test]
    fn next_activates_mid_window() {
        let now = Utc::now();
        let activity = Activity {
            id: 1,
            name: "a".into(),
            description: String::new(),
            window_start: now - Duration::seconds(10),
            window_end: now + Duration::seconds(10),
            discount: 1.0,
            limit_per_user: 1,
            status: ActivityStatus::Pending,
        };
        assert_eq!(next(&activity, now), Some(ActivityStatus::Active));
    }

    #[test]
    fn next_ends_at_window_end_half_open() {
        let now = Utc::now();
        let activity = Activity {
            id: 1,
            name: "a".into(),
            description: String::new(),
            window_start: now - Duration::seconds(20),
            window_end: now,
            discount: 1.0,
            limit_per_user: 1,
            status: ActivityStatus::Active,
        };
        assert_eq!(next(&activity, now), Some(ActivityStatus::Ended));
    }

    fn sample_product(id: crate::core_types::ProductId, stock: i64) -> crate::models::Product {
        crate::models::Product {
            id,
            name: "widget".into(),
            price: crate::money::Money::new(500),
            stock,
            seckill_stock: 0,
            category: "misc".into(),
            window_start: None,
            window_end: None,
            status: crate::models::ProductStatus::Normal,
        }
    }

    #[tokio::test]
    async fn create_allocates_up_to_available_stock_per_product() {
        let (controller, store, _cache) = controller();
        let product = sample_product(100, 10);
        store.seed_product(product.clone()).await;

        let now = Utc::now();
        let (_activity, results) = controller
            .create(CreateActivityRequest {
                name: "flash".into(),
                description: String::new(),
                window_start: now,
                window_end: now + Duration::seconds(60),
                discount: 0.5,
                limit_per_user: 1,
                product_stocks: vec![(product.id, 999)],
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].allocated_units, 10);
    }

    #[tokio::test]
    async fn sweep_activates_then_ends_and_seeds_cache() {
        let (controller, store, cache) = controller();
        let product = sample_product(200, 5);
        store.seed_product(product.clone()).await;

        let now = Utc::now();
        let (activity, _) = controller
            .create(CreateActivityRequest {
                name: "flash".into(),
                description: String::new(),
                window_start: now - Duration::seconds(5),
                window_end: now + Duration::seconds(5),
                discount: 1.0,
                limit_per_user: 1,
                product_stocks: vec![(product.id, 5)],
            })
            .await
            .unwrap();

        controller.sweep(now).await.unwrap();
        let cached: i64 = cache
            .get(&keys::stock(product.id))
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(cached, 5);

        controller.sweep(now + Duration::seconds(10)).await.unwrap();
        let ended = store.get_activity(activity.id).await.unwrap();
        assert_eq!(ended.status, ActivityStatus::Ended);
    }
}

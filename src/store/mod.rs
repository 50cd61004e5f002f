//! Transactional Store Adapter (component C).
//!
//! Narrow per-entity capability traits — `ProductStore`, `ActivityStore`,
//! `ActivityProductStore`, `AccountStore`, `OrderStore`, `TransactionStore`,
//! `UserStore` — cover the read/query paths the HTTP surface and activity
//! controller need. The handful of operations that are inherently
//! cross-entity and must run inside one locked transaction (seckill
//! fulfillment's debit-and-order, and the activity lifecycle's stock
//! transfers) are grouped on the [`Store`] supertrait instead of forcing a
//! generic transaction handle through every narrow trait — see DESIGN.md for
//! the rationale.
//!
//! `PgStore` implements `Store` against Postgres with `SELECT ... FOR UPDATE`
//! row locking (grounded in the teacher's `funding/service.rs` transfer
//! execution). `MemoryStore` implements the same surface over
//! `tokio::sync::Mutex<HashMap<...>>` for deterministic, lock-explicit tests.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::core_types::{ActivityId, OrderId, ProductId, UserId};
use crate::models::{Account, Activity, ActivityProduct, AccountTransaction, Order, Product, User};
use crate::money::Money;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError>;
    async fn list_products(
        &self,
        category: Option<&str>,
        query: Option<&str>,
        seckill_only: bool,
    ) -> Result<Vec<Product>, StoreError>;
    async fn create_product(&self, product: Product) -> Result<Product, StoreError>;
    async fn update_product(&self, product: &Product) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn create_activity(&self, activity: Activity) -> Result<Activity, StoreError>;
    async fn get_activity(&self, id: ActivityId) -> Result<Activity, StoreError>;
    async fn update_activity(&self, activity: &Activity) -> Result<(), StoreError>;
    async fn list_activities(&self) -> Result<Vec<Activity>, StoreError>;
    async fn delete_activity(&self, id: ActivityId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ActivityProductStore: Send + Sync {
    async fn upsert_activity_product(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
        seckill_stock: i64,
    ) -> Result<(), StoreError>;
    async fn list_by_activity(
        &self,
        activity_id: ActivityId,
    ) -> Result<Vec<ActivityProduct>, StoreError>;
    async fn list_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ActivityProduct>, StoreError>;
    async fn remove_activity_product(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Created lazily on first read (spec.md §3).
    async fn get_or_create_account(&self, user_id: UserId) -> Result<Account, StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, id: OrderId) -> Result<Order, StoreError>;
    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError>;
    async fn find_order_by_user_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<Order>, StoreError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn list_transactions_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<AccountTransaction>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;
    async fn get_user_by_username(&self, username: &str) -> Result<User, StoreError>;
    async fn get_user(&self, id: UserId) -> Result<User, StoreError>;
}

/// Cross-entity operations that must run inside a single locked transaction.
#[async_trait]
pub trait Store:
    ProductStore
    + ActivityStore
    + ActivityProductStore
    + AccountStore
    + OrderStore
    + TransactionStore
    + UserStore
    + Send
    + Sync
{
    /// Admin `create` allocation step (spec.md §4.E "Create"): reserve
    /// `min(requested_units, product.stock)` from `product.stock` into the
    /// join row. Returns the actually-allocated amount. Locks the product
    /// row only; callers iterate products one at a time, so a failure on one
    /// product never aborts the others.
    async fn allocate_for_activity(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
        requested_units: i64,
    ) -> Result<i64, StoreError>;

    /// Activity activation (pending → active) for one product: moves the
    /// join row's `seckill_stock` out of `product.stock`... no — the stock
    /// was already moved into the join row at creation time. Activation
    /// instead moves it from the join row into `product.seckill_stock` and
    /// flips `product.status` to `seckill`. Returns the seeded amount so the
    /// activity controller can prime the cache counter with it.
    async fn activate_product(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
    ) -> Result<i64, StoreError>;

    /// Activity expiry (active → ended) for one product: if still
    /// `status=seckill`, reverts it to `normal` with `seckill_stock=0`.
    async fn end_product(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
    ) -> Result<(), StoreError>;

    /// Admin delete/cancel: returns unsold `seckill_stock` to
    /// `product.stock`.
    async fn return_unsold_stock(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
    ) -> Result<(), StoreError>;

    /// Atomically `product.seckill_stock -= 1` guarded by `> 0`; returns
    /// `Ok(true)` if the decrement applied, `Ok(false)` if stock was already
    /// exhausted (fulfillment worker step 3-4).
    async fn try_decrement_seckill_stock(&self, product_id: ProductId) -> Result<bool, StoreError>;

    /// Worker-side compensation: undo a `try_decrement_seckill_stock` that
    /// could not be consumed (fulfillment worker step 7, and the
    /// requeue/drop paths of steps 2-3).
    async fn compensate_seckill_stock(&self, product_id: ProductId) -> Result<(), StoreError>;

    /// Fulfillment worker step 6: lock the account (create if missing), fail
    /// `InsufficientFunds` if `balance < price`, else debit, insert a paid
    /// order, and append the ledger entry — all in one transaction.
    async fn debit_and_record_order(
        &self,
        user_id: UserId,
        product_id: ProductId,
        price: Money,
    ) -> Result<Order, StoreError>;

    /// Read-only: current `seckill_stock` for a product, used by the
    /// reconciler to compare against the cache counter.
    async fn authoritative_seckill_stock(&self, product_id: ProductId) -> Result<i64, StoreError>;
}

//! `tokio::sync::Mutex<HashMap<...>>`-backed store fake.
//!
//! A single internal mutex stands in for Postgres's row locks: every
//! operation takes the lock, mutates, and releases it before returning,
//! which is sufficient to drive the invariants in spec.md §8 deterministically
//! without a live database.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{
    AccountStore, ActivityProductStore, ActivityStore, OrderStore, ProductStore, Store,
    StoreError, TransactionStore, UserStore,
};
use crate::core_types::{ActivityId, OrderId, ProductId, UserId};
use crate::models::{
    Account, Activity, ActivityProduct, AccountTransaction, Order, OrderStatus, Product,
    TransactionType, User,
};
use crate::money::{Money, SignedMoney};

#[derive(Default)]
struct Inner {
    products: HashMap<ProductId, Product>,
    activities: HashMap<ActivityId, Activity>,
    activity_products: HashMap<(ActivityId, ProductId), ActivityProduct>,
    accounts: HashMap<UserId, Account>,
    orders: HashMap<OrderId, Order>,
    transactions: Vec<AccountTransaction>,
    users: HashMap<UserId, User>,
    username_index: HashMap<String, UserId>,
    next_product_id: ProductId,
    next_activity_id: ActivityId,
    next_order_id: OrderId,
    next_user_id: UserId,
    next_tx_id: i64,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Test helper: seed a product directly, bypassing id assignment.
    pub async fn seed_product(&self, product: Product) {
        let mut inner = self.inner.lock().await;
        if product.id >= inner.next_product_id {
            inner.next_product_id = product.id + 1;
        }
        inner.products.insert(product.id, product);
    }

    /// Test helper: seed an activity directly.
    pub async fn seed_activity(&self, activity: Activity) {
        let mut inner = self.inner.lock().await;
        if activity.id >= inner.next_activity_id {
            inner.next_activity_id = activity.id + 1;
        }
        inner.activities.insert(activity.id, activity);
    }

    /// Test helper: seed a join row directly.
    pub async fn seed_activity_product(&self, ap: ActivityProduct) {
        let mut inner = self.inner.lock().await;
        inner
            .activity_products
            .insert((ap.activity_id, ap.product_id), ap);
    }

    /// Test helper: set an account balance directly.
    pub async fn seed_account(&self, user_id: UserId, balance: Money) {
        let mut inner = self.inner.lock().await;
        inner.accounts.insert(
            user_id,
            Account {
                user_id,
                balance,
                frozen: Money::ZERO,
            },
        );
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError> {
        let inner = self.inner.lock().await;
        inner.products.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_products(
        &self,
        category: Option<&str>,
        query: Option<&str>,
        seckill_only: bool,
    ) -> Result<Vec<Product>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .products
            .values()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .filter(|p| {
                query.is_none_or(|q| p.name.to_lowercase().contains(&q.to_lowercase()))
            })
            .filter(|p| !seckill_only || matches!(p.status, crate::models::ProductStatus::Seckill))
            .cloned()
            .collect())
    }

    async fn create_product(&self, mut product: Product) -> Result<Product, StoreError> {
        let mut inner = self.inner.lock().await;
        product.id = inner.next_product_id;
        inner.next_product_id += 1;
        inner.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.products.contains_key(&product.id) {
            return Err(StoreError::NotFound);
        }
        inner.products.insert(product.id, product.clone());
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn create_activity(&self, mut activity: Activity) -> Result<Activity, StoreError> {
        let mut inner = self.inner.lock().await;
        activity.id = inner.next_activity_id;
        inner.next_activity_id += 1;
        inner.activities.insert(activity.id, activity.clone());
        Ok(activity)
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Activity, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .activities
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.activities.contains_key(&activity.id) {
            return Err(StoreError::NotFound);
        }
        inner.activities.insert(activity.id, activity.clone());
        Ok(())
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.activities.values().cloned().collect())
    }

    async fn delete_activity(&self, id: ActivityId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.activities.remove(&id).ok_or(StoreError::NotFound)?;
        Ok(())
    }
}

#[async_trait]
impl ActivityProductStore for MemoryStore {
    async fn upsert_activity_product(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
        seckill_stock: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.activity_products.insert(
            (activity_id, product_id),
            ActivityProduct {
                activity_id,
                product_id,
                seckill_stock,
            },
        );
        Ok(())
    }

    async fn list_by_activity(
        &self,
        activity_id: ActivityId,
    ) -> Result<Vec<ActivityProduct>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .activity_products
            .values()
            .filter(|ap| ap.activity_id == activity_id)
            .cloned()
            .collect())
    }

    async fn list_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ActivityProduct>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .activity_products
            .values()
            .filter(|ap| ap.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn remove_activity_product(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.activity_products.remove(&(activity_id, product_id));
        Ok(())
    }
}

/// New accounts start with this signup gift balance (spec.md's Non-goals
/// leave payment gateways out of scope; §3 is silent on the exact mechanism,
/// so this follows the Go reference's `AccountService` signup gift, minus
/// its admin-username special case — see DESIGN.md).
const SIGNUP_GIFT: i64 = 10_000;

impl Inner {
    fn account_or_gift(&mut self, user_id: UserId) -> Account {
        if let Some(existing) = self.accounts.get(&user_id) {
            return existing.clone();
        }
        let account = Account {
            user_id,
            balance: Money::new(SIGNUP_GIFT as u64),
            frozen: Money::ZERO,
        };
        self.accounts.insert(user_id, account.clone());
        let tx_id = self.next_tx_id;
        self.next_tx_id += 1;
        self.transactions.push(AccountTransaction {
            id: tx_id,
            user_id,
            amount: SignedMoney::new(SIGNUP_GIFT),
            transaction_type: TransactionType::Gift,
            status: 1,
            note: "signup gift".to_string(),
            created_at: chrono::Utc::now(),
        });
        account
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_or_create_account(&self, user_id: UserId) -> Result<Account, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.account_or_gift(user_id))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn get_order(&self, id: OrderId) -> Result<Order, StoreError> {
        let inner = self.inner.lock().await;
        inner.orders.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_order_by_user_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .values()
            .find(|o| o.user_id == user_id && o.product_id == product_id)
            .cloned())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn list_transactions_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<AccountTransaction>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.username_index.contains_key(username) {
            return Err(StoreError::Backend("username already taken".to_string()));
        }
        let id = inner.next_user_id;
        inner.next_user_id += 1;
        let user = User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        inner.users.insert(id, user.clone());
        inner.username_index.insert(username.to_string(), id);
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, StoreError> {
        let inner = self.inner.lock().await;
        let id = inner
            .username_index
            .get(username)
            .copied()
            .ok_or(StoreError::NotFound)?;
        inner.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        let inner = self.inner.lock().await;
        inner.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn allocate_for_activity(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
        requested_units: i64,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        let product = inner
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::NotFound)?;
        let allocated = requested_units.min(product.stock).max(0);
        product.stock -= allocated;
        inner.activity_products.insert(
            (activity_id, product_id),
            ActivityProduct {
                activity_id,
                product_id,
                seckill_stock: allocated,
            },
        );
        Ok(allocated)
    }

    async fn activate_product(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        let allocated = inner
            .activity_products
            .get(&(activity_id, product_id))
            .map(|ap| ap.seckill_stock)
            .ok_or(StoreError::NotFound)?;
        let product = inner
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::NotFound)?;
        product.seckill_stock = allocated;
        product.status = crate::models::ProductStatus::Seckill;
        Ok(allocated)
    }

    async fn end_product(
        &self,
        _activity_id: ActivityId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let product = inner
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::NotFound)?;
        if matches!(product.status, crate::models::ProductStatus::Seckill) {
            product.status = crate::models::ProductStatus::Normal;
            product.seckill_stock = 0;
        }
        Ok(())
    }

    async fn return_unsold_stock(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let unsold = inner
            .activity_products
            .get(&(activity_id, product_id))
            .map(|ap| ap.seckill_stock)
            .unwrap_or(0);
        if let Some(product) = inner.products.get_mut(&product_id) {
            product.stock += unsold;
        }
        Ok(())
    }

    async fn try_decrement_seckill_stock(&self, product_id: ProductId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let product = inner
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::NotFound)?;
        if product.seckill_stock > 0 {
            product.seckill_stock -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn compensate_seckill_stock(&self, product_id: ProductId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let product = inner
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::NotFound)?;
        product.seckill_stock += 1;
        Ok(())
    }

    async fn debit_and_record_order(
        &self,
        user_id: UserId,
        product_id: ProductId,
        price: Money,
    ) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock().await;

        inner.account_or_gift(user_id);
        let account = inner.accounts.get_mut(&user_id).expect("just created above");
        if account.balance.is_less_than(&price) {
            return Err(StoreError::InsufficientFunds);
        }
        account.balance = account
            .balance
            .checked_sub(price)
            .ok_or(StoreError::InsufficientFunds)?;

        let order_id = inner.next_order_id;
        inner.next_order_id += 1;
        let order = Order {
            id: order_id,
            user_id,
            product_id,
            price_paid: price,
            status: OrderStatus::Paid,
            created_at: chrono::Utc::now(),
        };
        inner.orders.insert(order_id, order.clone());

        let tx_id = inner.next_tx_id;
        inner.next_tx_id += 1;
        inner.transactions.push(AccountTransaction {
            id: tx_id,
            user_id,
            amount: SignedMoney::new(-price.as_signed().to_raw()),
            transaction_type: TransactionType::Seckill,
            status: 1,
            note: format!("seckill order #{}", order_id),
            created_at: chrono::Utc::now(),
        });

        Ok(order)
    }

    async fn authoritative_seckill_stock(&self, product_id: ProductId) -> Result<i64, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .products
            .get(&product_id)
            .map(|p| p.seckill_stock)
            .ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductStatus;

    fn sample_product(id: ProductId, stock: i64) -> Product {
        Product {
            id,
            name: "widget".into(),
            price: Money::new(1000),
            stock,
            seckill_stock: 0,
            category: "misc".into(),
            window_start: None,
            window_end: None,
            status: ProductStatus::Normal,
        }
    }

    #[tokio::test]
    async fn allocate_caps_at_available_stock() {
        let store = MemoryStore::new();
        store.seed_product(sample_product(1, 5)).await;
        let allocated = store.allocate_for_activity(1, 1, 20).await.unwrap();
        assert_eq!(allocated, 5);
        let product = store.get_product(1).await.unwrap();
        assert_eq!(product.stock, 0);
    }

    #[tokio::test]
    async fn activate_then_end_round_trips_seckill_stock() {
        let store = MemoryStore::new();
        store.seed_product(sample_product(1, 10)).await;
        store.allocate_for_activity(100, 1, 3).await.unwrap();
        let seeded = store.activate_product(100, 1).await.unwrap();
        assert_eq!(seeded, 3);
        let product = store.get_product(1).await.unwrap();
        assert!(matches!(product.status, ProductStatus::Seckill));

        store.end_product(100, 1).await.unwrap();
        let product = store.get_product(1).await.unwrap();
        assert!(matches!(product.status, ProductStatus::Normal));
        assert_eq!(product.seckill_stock, 0);
    }

    #[tokio::test]
    async fn debit_fails_when_balance_insufficient() {
        let store = MemoryStore::new();
        store.seed_account(7, Money::new(50)).await;
        let err = store
            .debit_and_record_order(7, 1, Money::new(100))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds));
    }

    #[tokio::test]
    async fn try_decrement_seckill_stock_stops_at_zero() {
        let store = MemoryStore::new();
        let mut p = sample_product(1, 0);
        p.seckill_stock = 1;
        store.seed_product(p).await;
        assert!(store.try_decrement_seckill_stock(1).await.unwrap());
        assert!(!store.try_decrement_seckill_stock(1).await.unwrap());
    }
}

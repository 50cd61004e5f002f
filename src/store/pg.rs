//! Postgres-backed `Store`, using `sqlx::query`/`query_as` (not the
//! compile-time `query!` macro, which needs a live `DATABASE_URL` at build
//! time) against `products`, `activities`, `activity_products`, `accounts`,
//! `orders`, `account_transactions`, `users`. Row-level locking follows the
//! teacher's `funding/service.rs` transfer-execution pattern: `SELECT ... FOR
//! UPDATE` inside an explicit `sqlx::Transaction`, account-row before
//! product-row when both are touched (spec.md §5's deadlock-avoidance rule).

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;

use super::{
    AccountStore, ActivityProductStore, ActivityStore, OrderStore, ProductStore, Store,
    StoreError, TransactionStore, UserStore,
};
use crate::core_types::{ActivityId, OrderId, ProductId, UserId};
use crate::models::{
    Account, Activity, ActivityProduct, ActivityStatus as ActStatus, AccountTransaction, Order,
    OrderStatus, Product, ProductStatus, TransactionType, User,
};
use crate::money::{Money, SignedMoney};

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_product(row: &sqlx::postgres::PgRow) -> Product {
        Product {
            id: row.get("id"),
            name: row.get("name"),
            price: Money::new(row.get::<i64, _>("price") as u64),
            stock: row.get("stock"),
            seckill_stock: row.get("seckill_stock"),
            category: row.get("category"),
            window_start: row.get("window_start"),
            window_end: row.get("window_end"),
            status: ProductStatus::from_i16(row.get("status")),
        }
    }

    fn row_to_activity(row: &sqlx::postgres::PgRow) -> Activity {
        Activity {
            id: row.get("id"),
            name: row.get("name"),
            description: row.get("description"),
            window_start: row.get("window_start"),
            window_end: row.get("window_end"),
            discount: row.get("discount"),
            limit_per_user: row.get("limit_per_user"),
            status: ActStatus::from_i16(row.get("status")),
        }
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError> {
        let row = sqlx::query("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(Self::row_to_product(&row))
    }

    async fn list_products(
        &self,
        category: Option<&str>,
        query: Option<&str>,
        seckill_only: bool,
    ) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM products
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
              AND (NOT $3 OR status = 2)
            ORDER BY id
            "#,
        )
        .bind(category)
        .bind(query)
        .bind(seckill_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_product).collect())
    }

    async fn create_product(&self, product: Product) -> Result<Product, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, price, stock, seckill_stock, category, window_start, window_end, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&product.name)
        .bind(product.price.to_raw() as i64)
        .bind(product.stock)
        .bind(product.seckill_stock)
        .bind(&product.category)
        .bind(product.window_start)
        .bind(product.window_end)
        .bind(product.status as i16)
        .fetch_one(&self.pool)
        .await?;
        Ok(Self::row_to_product(&row))
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE products SET name=$2, price=$3, stock=$4, seckill_stock=$5, category=$6,
                window_start=$7, window_end=$8, status=$9
            WHERE id=$1
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.price.to_raw() as i64)
        .bind(product.stock)
        .bind(product.seckill_stock)
        .bind(&product.category)
        .bind(product.window_start)
        .bind(product.window_end)
        .bind(product.status as i16)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn create_activity(&self, activity: Activity) -> Result<Activity, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO activities (name, description, window_start, window_end, discount, limit_per_user, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&activity.name)
        .bind(&activity.description)
        .bind(activity.window_start)
        .bind(activity.window_end)
        .bind(activity.discount)
        .bind(activity.limit_per_user)
        .bind(activity.status as i16)
        .fetch_one(&self.pool)
        .await?;
        Ok(Self::row_to_activity(&row))
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Activity, StoreError> {
        let row = sqlx::query("SELECT * FROM activities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(Self::row_to_activity(&row))
    }

    async fn update_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE activities SET name=$2, description=$3, window_start=$4, window_end=$5,
                discount=$6, limit_per_user=$7, status=$8
            WHERE id=$1
            "#,
        )
        .bind(activity.id)
        .bind(&activity.name)
        .bind(&activity.description)
        .bind(activity.window_start)
        .bind(activity.window_end)
        .bind(activity.discount)
        .bind(activity.limit_per_user)
        .bind(activity.status as i16)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, StoreError> {
        let rows = sqlx::query("SELECT * FROM activities ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::row_to_activity).collect())
    }

    async fn delete_activity(&self, id: ActivityId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM activities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ActivityProductStore for PgStore {
    async fn upsert_activity_product(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
        seckill_stock: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO activity_products (activity_id, product_id, seckill_stock)
            VALUES ($1, $2, $3)
            ON CONFLICT (activity_id, product_id)
            DO UPDATE SET seckill_stock = EXCLUDED.seckill_stock
            "#,
        )
        .bind(activity_id)
        .bind(product_id)
        .bind(seckill_stock)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_activity(
        &self,
        activity_id: ActivityId,
    ) -> Result<Vec<ActivityProduct>, StoreError> {
        let rows = sqlx::query(
            "SELECT activity_id, product_id, seckill_stock FROM activity_products WHERE activity_id = $1",
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| ActivityProduct {
                activity_id: r.get("activity_id"),
                product_id: r.get("product_id"),
                seckill_stock: r.get("seckill_stock"),
            })
            .collect())
    }

    async fn list_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ActivityProduct>, StoreError> {
        let rows = sqlx::query(
            "SELECT activity_id, product_id, seckill_stock FROM activity_products WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| ActivityProduct {
                activity_id: r.get("activity_id"),
                product_id: r.get("product_id"),
                seckill_stock: r.get("seckill_stock"),
            })
            .collect())
    }

    async fn remove_activity_product(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM activity_products WHERE activity_id = $1 AND product_id = $2")
            .bind(activity_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// New accounts start with this signup gift balance (mirrors `MemoryStore`'s
/// `SIGNUP_GIFT`; see DESIGN.md).
const SIGNUP_GIFT: i64 = 10_000;

#[async_trait]
impl AccountStore for PgStore {
    async fn get_or_create_account(&self, user_id: UserId) -> Result<Account, StoreError> {
        let mut tx = self.pool.begin().await?;
        let account = get_or_gift_account(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(account)
    }
}

/// Lazily creates an account with the signup gift balance and its matching
/// ledger row the first time a user's account is touched; returns the
/// existing account unchanged otherwise. Runs inside the caller's
/// transaction so the insert and the ledger row are atomic with whatever
/// else the caller is doing (e.g. the immediate debit in
/// `debit_and_record_order`).
async fn get_or_gift_account(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: UserId,
) -> Result<Account, StoreError> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO accounts (user_id, balance, frozen)
        VALUES ($1, $2, 0)
        ON CONFLICT (user_id) DO NOTHING
        RETURNING user_id, balance, frozen
        "#,
    )
    .bind(user_id)
    .bind(SIGNUP_GIFT)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(row) = inserted {
        sqlx::query(
            r#"
            INSERT INTO account_transactions (user_id, amount, transaction_type, status, note, created_at)
            VALUES ($1, $2, 'gift', 1, 'signup gift', now())
            "#,
        )
        .bind(user_id)
        .bind(SIGNUP_GIFT)
        .execute(&mut **tx)
        .await?;
        return Ok(Account {
            user_id: row.get("user_id"),
            balance: Money::new(row.get::<i64, _>("balance") as u64),
            frozen: Money::new(row.get::<i64, _>("frozen") as u64),
        });
    }

    let row = sqlx::query("SELECT user_id, balance, frozen FROM accounts WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(Account {
        user_id: row.get("user_id"),
        balance: Money::new(row.get::<i64, _>("balance") as u64),
        frozen: Money::new(row.get::<i64, _>("frozen") as u64),
    })
}

#[async_trait]
impl OrderStore for PgStore {
    async fn get_order(&self, id: OrderId) -> Result<Order, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(row_to_order(&row))
    }

    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query("SELECT * FROM orders WHERE user_id = $1 ORDER BY id DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_order).collect())
    }

    async fn find_order_by_user_product(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM orders WHERE user_id = $1 AND product_id = $2 ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_order))
    }
}

fn row_to_order(row: &sqlx::postgres::PgRow) -> Order {
    Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        product_id: row.get("product_id"),
        price_paid: Money::new(row.get::<i64, _>("price_paid") as u64),
        status: OrderStatus::from_i16(row.get("status")),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn list_transactions_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<AccountTransaction>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM account_transactions WHERE user_id = $1 ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| AccountTransaction {
                id: r.get("id"),
                user_id: r.get("user_id"),
                amount: SignedMoney::new(r.get("amount")),
                transaction_type: TransactionType::from_str_lenient(r.get("transaction_type")),
                status: r.get("status"),
                note: r.get("note"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let row = sqlx::query(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id, username, password_hash",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(User {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
        })
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, StoreError> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(User {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
        })
    }

    async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(User {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn allocate_for_activity(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
        requested_units: i64,
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound)?;
        let available: i64 = row.get("stock");
        let allocated = requested_units.min(available).max(0);

        sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1")
            .bind(product_id)
            .bind(allocated)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO activity_products (activity_id, product_id, seckill_stock)
            VALUES ($1, $2, $3)
            ON CONFLICT (activity_id, product_id) DO UPDATE SET seckill_stock = EXCLUDED.seckill_stock
            "#,
        )
        .bind(activity_id)
        .bind(product_id)
        .bind(allocated)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(allocated)
    }

    async fn activate_product(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT seckill_stock FROM activity_products WHERE activity_id = $1 AND product_id = $2 FOR UPDATE",
        )
        .bind(activity_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;
        let allocated: i64 = row.get("seckill_stock");

        sqlx::query("UPDATE products SET seckill_stock = $2, status = 2 WHERE id = $1")
            .bind(product_id)
            .bind(allocated)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(allocated)
    }

    async fn end_product(
        &self,
        _activity_id: ActivityId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE products SET status = 1, seckill_stock = 0 WHERE id = $1 AND status = 2",
        )
        .bind(product_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn return_unsold_stock(
        &self,
        activity_id: ActivityId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT seckill_stock FROM activity_products WHERE activity_id = $1 AND product_id = $2 FOR UPDATE",
        )
        .bind(activity_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = row {
            let unsold: i64 = row.get("seckill_stock");
            sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
                .bind(product_id)
                .bind(unsold)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn try_decrement_seckill_stock(&self, product_id: ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE products SET seckill_stock = seckill_stock - 1 WHERE id = $1 AND seckill_stock > 0",
        )
        .bind(product_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn compensate_seckill_stock(&self, product_id: ProductId) -> Result<(), StoreError> {
        sqlx::query("UPDATE products SET seckill_stock = seckill_stock + 1 WHERE id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn debit_and_record_order(
        &self,
        user_id: UserId,
        product_id: ProductId,
        price: Money,
    ) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        get_or_gift_account(&mut tx, user_id).await?;

        let row = sqlx::query("SELECT balance FROM accounts WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        let balance = Money::new(row.get::<i64, _>("balance") as u64);
        if balance.is_less_than(&price) {
            return Err(StoreError::InsufficientFunds);
        }

        sqlx::query("UPDATE accounts SET balance = balance - $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(price.to_raw() as i64)
            .execute(&mut *tx)
            .await?;

        let order_row = sqlx::query(
            r#"
            INSERT INTO orders (user_id, product_id, price_paid, status, created_at)
            VALUES ($1, $2, $3, 1, now())
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(price.to_raw() as i64)
        .fetch_one(&mut *tx)
        .await?;
        let order = row_to_order(&order_row);

        sqlx::query(
            r#"
            INSERT INTO account_transactions (user_id, amount, transaction_type, status, note, created_at)
            VALUES ($1, $2, 'seckill', 1, $3, now())
            "#,
        )
        .bind(user_id)
        .bind(-(price.to_raw() as i64))
        .bind(format!("seckill order #{}", order.id))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(order)
    }

    async fn authoritative_seckill_stock(&self, product_id: ProductId) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT seckill_stock FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(row.get("seckill_stock"))
    }
}

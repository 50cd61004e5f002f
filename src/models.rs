//! Persistent entity types: `products`, `activities`, `activity_products`,
//! `accounts`, `orders`, `account_transactions`, `users`.
//!
//! These mirror the relational rows the store adapter reads and writes.
//! The transactional store is the source of truth for every type here; the
//! cache only ever holds derived admission counters (see [`crate::cache`]).

use crate::core_types::{ActivityId, OrderId, ProductId, UserId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `Product.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum ProductStatus {
    Offline = 0,
    Normal = 1,
    Seckill = 2,
}

impl ProductStatus {
    pub fn from_i16(v: i16) -> Self {
        match v {
            0 => Self::Offline,
            2 => Self::Seckill,
            _ => Self::Normal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i64,
    pub seckill_stock: i64,
    pub category: String,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub status: ProductStatus,
}

/// `Activity.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum ActivityStatus {
    Pending = 0,
    Active = 1,
    Ended = 2,
    Cancelled = 3,
}

impl ActivityStatus {
    pub fn from_i16(v: i16) -> Self {
        match v {
            1 => Self::Active,
            2 => Self::Ended,
            3 => Self::Cancelled,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
    pub description: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// `(0, 1]`. `1.0` means no discount.
    pub discount: f64,
    pub limit_per_user: i64,
    pub status: ActivityStatus,
}

impl Activity {
    /// `status=active` must hold `now ∈ [window_start, window_end)` —
    /// tie-break at `window_end` counts as ended (half-open interval).
    pub fn is_live_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.window_start && now < self.window_end
    }
}

/// Join row binding an activity to one of its products with its reserved
/// seckill allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityProduct {
    pub activity_id: ActivityId,
    pub product_id: ProductId,
    pub seckill_stock: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub balance: Money,
    pub frozen: Money,
}

/// `Order.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum OrderStatus {
    Created = 0,
    Paid = 1,
    Cancelled = 2,
}

impl OrderStatus {
    pub fn from_i16(v: i16) -> Self {
        match v {
            1 => Self::Paid,
            2 => Self::Cancelled,
            _ => Self::Created,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub price_paid: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry type for `account_transactions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Purchase,
    Seckill,
    Recharge,
    Refund,
    Gift,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Seckill => "seckill",
            Self::Recharge => "recharge",
            Self::Refund => "refund",
            Self::Gift => "gift",
        }
    }

    pub fn from_str_lenient(s: &str) -> Self {
        match s {
            "purchase" => Self::Purchase,
            "recharge" => Self::Recharge,
            "refund" => Self::Refund,
            "gift" => Self::Gift,
            _ => Self::Seckill,
        }
    }
}

/// Append-only ledger row. `amount` is signed: negative for debits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountTransaction {
    pub id: i64,
    pub user_id: UserId,
    pub amount: crate::money::SignedMoney,
    pub transaction_type: TransactionType,
    pub status: i16,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn window_is_half_open_on_end() {
        let now = Utc::now();
        let activity = Activity {
            id: 1,
            name: "flash".into(),
            description: String::new(),
            window_start: now - Duration::seconds(10),
            window_end: now,
            discount: 0.5,
            limit_per_user: 1,
            status: ActivityStatus::Active,
        };
        assert!(!activity.is_live_window(now));
        assert!(activity.is_live_window(now - Duration::seconds(1)));
    }

    #[test]
    fn product_status_round_trips_unknown_as_normal() {
        assert!(matches!(ProductStatus::from_i16(1), ProductStatus::Normal));
        assert!(matches!(ProductStatus::from_i16(99), ProductStatus::Normal));
        assert!(matches!(ProductStatus::from_i16(2), ProductStatus::Seckill));
    }
}

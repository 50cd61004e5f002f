//! Durable Queue Adapter (component B).
//!
//! Carries seckill *intents*, never state (spec.md §3). `publish` persists
//! the message before returning; `consume` hands the worker a [`Delivery`]
//! that must be resolved via `ack`, `nack_requeue`, or `nack_drop` — there is
//! no auto-ack, matching §4.G's "no in-memory retry loop: redelivery is the
//! retry mechanism".

mod memory;
mod redis_stream;

pub use memory::InMemoryQueue;
pub use redis_stream::RedisStreamQueue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::{ProductId, UserId};

pub const SECKILL_QUEUE: &str = "seckill_queue";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(String),
}

/// Wire payload: `{"user_id": i64, "product_id": i64}` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeckillMessage {
    pub user_id: UserId,
    pub product_id: ProductId,
}

/// A single delivered message the worker must explicitly resolve.
pub struct Delivery {
    pub payload: Vec<u8>,
    resolver: Box<dyn DeliveryResolver>,
}

#[async_trait]
trait DeliveryResolver: Send + Sync {
    async fn ack(&self) -> Result<(), QueueError>;
    async fn nack_requeue(&self) -> Result<(), QueueError>;
    async fn nack_drop(&self) -> Result<(), QueueError>;
}

impl Delivery {
    pub async fn ack(self) -> Result<(), QueueError> {
        self.resolver.ack().await
    }

    pub async fn nack_requeue(self) -> Result<(), QueueError> {
        self.resolver.nack_requeue().await
    }

    pub async fn nack_drop(self) -> Result<(), QueueError> {
        self.resolver.nack_drop().await
    }
}

#[async_trait]
pub trait QueueAdapter: Send + Sync {
    /// Publish with persistent delivery.
    async fn publish(&self, msg: &SeckillMessage) -> Result<(), QueueError>;

    /// Block (cooperatively) until the next delivery is available.
    async fn consume_one(&self) -> Result<Delivery, QueueError>;
}

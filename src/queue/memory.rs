//! In-memory `QueueAdapter` test fake: an mpsc channel with a side table of
//! unacked deliveries, enough to drive the worker's ack/nack state machine
//! without a broker.

use super::{Delivery, DeliveryResolver, QueueAdapter, QueueError, SeckillMessage};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::sync::mpsc;

pub struct InMemoryQueue {
    sender: mpsc::UnboundedSender<SeckillMessage>,
    receiver: Mutex<mpsc::UnboundedReceiver<SeckillMessage>>,
    unacked: Arc<DashMap<u64, SeckillMessage>>,
    next_id: AtomicU64,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            unacked: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of deliveries handed out but not yet ack'd/dropped. Used by
    /// tests to assert redelivery actually happened.
    pub fn unacked_count(&self) -> usize {
        self.unacked.len()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryResolver {
    id: u64,
    sender: mpsc::UnboundedSender<SeckillMessage>,
    unacked: Arc<DashMap<u64, SeckillMessage>>,
}

#[async_trait]
impl DeliveryResolver for MemoryResolver {
    async fn ack(&self) -> Result<(), QueueError> {
        self.unacked.remove(&self.id);
        Ok(())
    }

    async fn nack_requeue(&self) -> Result<(), QueueError> {
        if let Some((_, msg)) = self.unacked.remove(&self.id) {
            self.sender
                .send(msg)
                .map_err(|e| QueueError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    async fn nack_drop(&self) -> Result<(), QueueError> {
        self.unacked.remove(&self.id);
        Ok(())
    }
}

#[async_trait]
impl QueueAdapter for InMemoryQueue {
    async fn publish(&self, msg: &SeckillMessage) -> Result<(), QueueError> {
        self.sender
            .send(msg.clone())
            .map_err(|e| QueueError::Backend(e.to_string()))
    }

    async fn consume_one(&self) -> Result<Delivery, QueueError> {
        let msg = {
            let mut rx = self.receiver.lock().await;
            rx.recv()
                .await
                .ok_or_else(|| QueueError::Backend("queue closed".to_string()))?
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let payload = serde_json::to_vec(&msg).map_err(|e| QueueError::Backend(e.to_string()))?;
        self.unacked.insert(id, msg);
        Ok(Delivery {
            payload,
            resolver: Box::new(MemoryResolver {
                id,
                sender: self.sender.clone(),
                unacked: self.unacked.clone(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_consume_round_trips_payload() {
        let q = InMemoryQueue::new();
        q.publish(&SeckillMessage {
            user_id: 1,
            product_id: 2,
        })
        .await
        .unwrap();
        let delivery = q.consume_one().await.unwrap();
        let msg: SeckillMessage = serde_json::from_slice(&delivery.payload).unwrap();
        assert_eq!(msg.user_id, 1);
        assert_eq!(msg.product_id, 2);
        delivery.ack().await.unwrap();
        assert_eq!(q.unacked_count(), 0);
    }

    #[tokio::test]
    async fn nack_requeue_redelivers() {
        let q = InMemoryQueue::new();
        q.publish(&SeckillMessage {
            user_id: 1,
            product_id: 2,
        })
        .await
        .unwrap();
        let delivery = q.consume_one().await.unwrap();
        delivery.nack_requeue().await.unwrap();

        let redelivered = q.consume_one().await.unwrap();
        let msg: SeckillMessage = serde_json::from_slice(&redelivered.payload).unwrap();
        assert_eq!(msg.product_id, 2);
        redelivered.ack().await.unwrap();
    }

    #[tokio::test]
    async fn nack_drop_does_not_redeliver() {
        let q = InMemoryQueue::new();
        q.publish(&SeckillMessage {
            user_id: 1,
            product_id: 2,
        })
        .await
        .unwrap();
        let delivery = q.consume_one().await.unwrap();
        delivery.nack_drop().await.unwrap();
        assert_eq!(q.unacked_count(), 0);
    }
}

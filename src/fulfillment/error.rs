use thiserror::Error;

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("cache error: {0}")]
    Cache(#[from] crate::cache::CacheError),
    #[error("queue error: {0}")]
    Queue(#[from] crate::queue::QueueError),
}

/// The three terminal actions available on a delivered message (spec.md
/// §4.G's "received → ... → acked" state machine). A tagged variant, not a
/// `Result`, because "requeue" and "drop" are both successful *handling* of
/// the message — the failure, if any, already happened upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Ack,
    NackRequeue,
    NackDrop,
}

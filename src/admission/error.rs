use thiserror::Error;

/// One variant per failure mode in spec.md §4.F's ordered contract, so the
/// HTTP layer can map each to the exact `msg` string spec.md §8's scenarios
/// assert on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("not_found")]
    NotFound,
    #[error("not_in_seckill")]
    NotInSeckill,
    #[error("not_started")]
    NotStarted,
    #[error("ended")]
    Ended,
    #[error("invalid_path")]
    InvalidPath,
    #[error("no_active_activity")]
    NoActiveActivity,
    #[error("over_limit")]
    OverLimit,
    #[error("sold_out")]
    SoldOut,
    #[error("enqueue_failed")]
    EnqueueFailed,
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("cache error: {0}")]
    Cache(#[from] crate::cache::CacheError),
    #[error("activity error: {0}")]
    Activity(#[from] crate::activity::ActivityError),
}

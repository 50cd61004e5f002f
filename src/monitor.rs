//! Process-wide counters for adapter errors and pipeline throughput.
//!
//! All operations are commutative increments, which is the one case the
//! component design allows as a true singleton (wired once, read by the
//! admin surface, never passed around as a dependency).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;

#[derive(Debug, Default)]
pub struct Monitor {
    pub redis_errors: AtomicI64,
    pub queue_errors: AtomicI64,
    pub db_errors: AtomicI64,
    pub seckill_errors: AtomicI64,
    pub worker_errors: AtomicI64,

    pub seckill_requests: AtomicI64,
    pub seckill_success: AtomicI64,
    pub worker_processed: AtomicI64,
    pub worker_failed: AtomicI64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MonitorStats {
    pub redis_errors: i64,
    pub queue_errors: i64,
    pub db_errors: i64,
    pub seckill_errors: i64,
    pub worker_errors: i64,
    pub seckill_requests: i64,
    pub seckill_success: i64,
    pub seckill_success_rate: f64,
    pub worker_processed: i64,
    pub worker_failed: i64,
}

impl Monitor {
    pub fn record_redis_error(&self) {
        self.redis_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_error(&self) {
        self.queue_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_db_error(&self) {
        self.db_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_seckill_request(&self) {
        self.seckill_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_seckill_success(&self) {
        self.seckill_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_seckill_error(&self) {
        self.seckill_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker_processed(&self) {
        self.worker_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker_failed(&self) {
        self.worker_failed.fetch_add(1, Ordering::Relaxed);
        self.worker_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> MonitorStats {
        let requests = self.seckill_requests.load(Ordering::Relaxed);
        let success = self.seckill_success.load(Ordering::Relaxed);
        let success_rate = if requests > 0 {
            success as f64 / requests as f64 * 100.0
        } else {
            0.0
        };

        MonitorStats {
            redis_errors: self.redis_errors.load(Ordering::Relaxed),
            queue_errors: self.queue_errors.load(Ordering::Relaxed),
            db_errors: self.db_errors.load(Ordering::Relaxed),
            seckill_errors: self.seckill_errors.load(Ordering::Relaxed),
            worker_errors: self.worker_errors.load(Ordering::Relaxed),
            seckill_requests: requests,
            seckill_success: success,
            seckill_success_rate: success_rate,
            worker_processed: self.worker_processed.load(Ordering::Relaxed),
            worker_failed: self.worker_failed.load(Ordering::Relaxed),
        }
    }
}

static GLOBAL_MONITOR: OnceLock<Monitor> = OnceLock::new();

/// The process-wide monitor instance.
pub fn global() -> &'static Monitor {
    GLOBAL_MONITOR.get_or_init(Monitor::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_is_zero_with_no_requests() {
        let m = Monitor::default();
        assert_eq!(m.stats().seckill_success_rate, 0.0);
    }

    #[test]
    fn counters_accumulate() {
        let m = Monitor::default();
        m.record_seckill_request();
        m.record_seckill_request();
        m.record_seckill_success();
        let stats = m.stats();
        assert_eq!(stats.seckill_requests, 2);
        assert_eq!(stats.seckill_success, 1);
        assert_eq!(stats.seckill_success_rate, 50.0);
    }

    #[test]
    fn worker_failed_also_increments_worker_errors() {
        let m = Monitor::default();
        m.record_worker_failed();
        let stats = m.stats();
        assert_eq!(stats.worker_failed, 1);
        assert_eq!(stats.worker_errors, 1);
    }
}

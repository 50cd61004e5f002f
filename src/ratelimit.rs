//! Token-bucket rate limiter for the seckill submission route.
//!
//! Grounded directly in the Go reference's `internal/middleware/rate_limit.go`
//! `TokenBucket`: a mutex-protected counter refilled lazily on each `allow`
//! call rather than by a background ticker. Kept as a plain `std::sync::Mutex`
//! since the critical section is pure arithmetic, never `.await`ed across.

use std::sync::Mutex;
use std::time::Instant;

struct State {
    tokens: i64,
    last_refill: Instant,
}

pub struct TokenBucket {
    capacity: i64,
    refill_per_sec: i64,
    state: Mutex<State>,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: u32) -> Self {
        Self {
            capacity: capacity as i64,
            refill_per_sec: refill_per_sec as i64,
            state: Mutex::new(State {
                tokens: capacity as i64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Returns `true` if a token was available and consumed.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let now = Instant::now();
        let elapsed_secs = now.duration_since(state.last_refill).as_secs() as i64;
        let to_add = elapsed_secs * self.refill_per_sec;
        if to_add > 0 {
            state.tokens = (state.tokens + to_add).min(self.capacity);
            state.last_refill = now;
        }

        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_then_refuses() {
        let bucket = TokenBucket::new(3, 5);
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }

    #[test]
    fn refills_over_time() {
        let bucket = TokenBucket::new(2, 100);
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(!bucket.allow());
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(bucket.allow());
    }
}

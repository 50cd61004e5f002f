//! Service configuration, loaded from environment variables with sane
//! defaults for local development.
//!
//! Every knob named in the component design (rate limiter, worker pool,
//! cache TTLs, hash-ring replica count) lives here so the rest of the crate
//! never hardcodes a default inline.

use std::env;
use std::time::Duration;

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,

    /// Port for the user-facing HTTP API.
    pub user_port: u16,
    /// Port for the admin HTTP API (product/activity CRUD).
    pub admin_port: u16,

    /// Number of fulfillment worker tasks, each consuming one message at a time.
    pub worker_concurrency: usize,
    /// Interval between reconciler sweeps.
    pub reconciler_interval: Duration,

    /// Token-bucket capacity for the seckill submission route.
    pub rate_limit_capacity: u32,
    /// Token-bucket refill rate, in tokens per second.
    pub rate_limit_refill_per_sec: u32,

    /// TTL for the JWT verification cache, per shard.
    pub verify_cache_ttl: Duration,
    /// Number of virtual nodes per physical shard on the verification hash ring.
    pub hash_ring_replicas: usize,

    /// TTL for `seckill:path:{user}:{product}` entries.
    pub path_token_ttl_secs: u64,
    /// TTL for `seckill:limit:{user}:{product}:{activity}` entries.
    pub limit_counter_ttl_secs: u64,
    /// TTL for `seckill:succ:{user}:{product}` entries.
    pub succ_mark_ttl_secs: u64,

    pub log_dir: String,
    pub log_file: String,
    /// "hourly", "daily", or anything else for a single never-rotated file.
    pub rotation: String,
    pub log_level: String,
    pub use_json: bool,
    pub enable_tracing: bool,
}

impl AppConfig {
    /// Load configuration from the environment, falling back to development
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            database_url: env_string(
                "DATABASE_URL",
                "postgres://localhost/seckill",
            ),
            redis_url: env_string("REDIS_URL", "redis://127.0.0.1:6379"),
            jwt_secret: env_string("JWT_SECRET", "dev-secret-change-me"),

            user_port: env_parsed("USER_PORT", 8080),
            admin_port: env_parsed("ADMIN_PORT", 8081),

            worker_concurrency: env_parsed("WORKER_CONCURRENCY", 4),
            reconciler_interval: Duration::from_secs(env_parsed(
                "RECONCILER_INTERVAL_SECS",
                300,
            )),

            rate_limit_capacity: env_parsed("RATE_LIMIT_CAPACITY", 10),
            rate_limit_refill_per_sec: env_parsed("RATE_LIMIT_REFILL_PER_SEC", 5),

            verify_cache_ttl: Duration::from_secs(env_parsed("VERIFY_CACHE_TTL_SECS", 600)),
            hash_ring_replicas: env_parsed("HASH_RING_REPLICAS", 50),

            path_token_ttl_secs: env_parsed("PATH_TOKEN_TTL_SECS", 300),
            limit_counter_ttl_secs: env_parsed("LIMIT_COUNTER_TTL_SECS", 86400),
            succ_mark_ttl_secs: env_parsed("SUCC_MARK_TTL_SECS", 86400),

            log_dir: env_string("LOG_DIR", "logs"),
            log_file: env_string("LOG_FILE", "seckill.log"),
            rotation: env_string("LOG_ROTATION", "daily"),
            log_level: env_string("LOG_LEVEL", "info"),
            use_json: env_parsed("LOG_JSON", false),
            enable_tracing: env_parsed("ENABLE_TRACING", true),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.user_port, 8080);
        assert_eq!(cfg.admin_port, 8081);
        assert_eq!(cfg.worker_concurrency, 4);
        assert_eq!(cfg.reconciler_interval, Duration::from_secs(300));
        assert_eq!(cfg.rate_limit_capacity, 10);
        assert_eq!(cfg.rate_limit_refill_per_sec, 5);
        assert_eq!(cfg.verify_cache_ttl, Duration::from_secs(600));
        assert_eq!(cfg.hash_ring_replicas, 50);
        assert_eq!(cfg.path_token_ttl_secs, 300);
        assert_eq!(cfg.limit_counter_ttl_secs, 86400);
        assert_eq!(cfg.succ_mark_ttl_secs, 86400);
    }
}

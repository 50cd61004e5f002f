//! Seckill Engine service entry point.
//!
//! Wires the transactional store, cache adapter, and durable queue (Postgres
//! + Redis in production, or fully in-memory for local development when
//! `BACKEND=memory`), then starts the fulfillment worker pool, the
//! reconciler, and the two HTTP servers (user + admin ports).

use std::sync::Arc;

use seckill_engine::activity::ActivityController;
use seckill_engine::admission::AdmissionService;
use seckill_engine::auth::{HashRing, TokenIssuer, TokenVerifyCache};
use seckill_engine::cache::{CacheAdapter, InMemoryCache, RedisCache};
use seckill_engine::config::AppConfig;
use seckill_engine::fulfillment::FulfillmentWorker;
use seckill_engine::gateway::state::AppState;
use seckill_engine::queue::{InMemoryQueue, QueueAdapter, RedisStreamQueue};
use seckill_engine::ratelimit::TokenBucket;
use seckill_engine::reconciler::Reconciler;
use seckill_engine::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let _log_guard = seckill_engine::logging::init_logging(&config);

    tracing::info!(git_hash = env!("GIT_HASH"), "starting seckill engine");

    let use_memory_backend = std::env::var("BACKEND").as_deref() == Ok("memory");

    let store: Arc<dyn Store> = if use_memory_backend {
        tracing::warn!("BACKEND=memory: running against in-process fakes, not for production");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(PgStore::connect(&config.database_url).await?)
    };

    let cache: Arc<dyn CacheAdapter> = if use_memory_backend {
        Arc::new(InMemoryCache::new())
    } else {
        Arc::new(RedisCache::connect(&config.redis_url).await?)
    };

    let queue: Arc<dyn QueueAdapter> = if use_memory_backend {
        Arc::new(InMemoryQueue::new())
    } else {
        Arc::new(RedisStreamQueue::connect(&config.redis_url, "seckill-worker").await?)
    };

    let activity = Arc::new(ActivityController::new(store.clone(), cache.clone()));

    let admission = Arc::new(AdmissionService::new(
        store.clone(),
        cache.clone(),
        queue.clone(),
        activity.clone(),
        config.jwt_secret.clone(),
        config.path_token_ttl_secs,
        config.limit_counter_ttl_secs,
    ));

    let fulfillment = Arc::new(FulfillmentWorker::new(
        store.clone(),
        cache.clone(),
        queue.clone(),
        activity.clone(),
        config.succ_mark_ttl_secs,
    ));
    let _worker_handles = fulfillment.clone().spawn_pool(config.worker_concurrency);

    let reconciler = Arc::new(Reconciler::new(store.clone(), cache.clone()));
    let _reconciler_handle = reconciler.spawn(config.reconciler_interval);

    let hash_ring = HashRing::new(&[], config.hash_ring_replicas);
    let verify_cache = TokenVerifyCache::new(cache.clone(), hash_ring, config.verify_cache_ttl.as_secs());
    let auth = Arc::new(TokenIssuer::new(store.clone(), verify_cache, config.jwt_secret.clone(), 2));

    let submit_rate_limiter = Arc::new(TokenBucket::new(
        config.rate_limit_capacity,
        config.rate_limit_refill_per_sec,
    ));

    let state = Arc::new(AppState {
        store,
        cache,
        queue,
        activity,
        admission,
        auth,
        submit_rate_limiter,
    });

    seckill_engine::gateway::run_servers(state, config.user_port, config.admin_port).await
}

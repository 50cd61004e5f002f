//! Shared application state handed to every axum handler.

use std::sync::Arc;

use crate::activity::ActivityController;
use crate::admission::AdmissionService;
use crate::auth::TokenIssuer;
use crate::cache::CacheAdapter;
use crate::queue::QueueAdapter;
use crate::ratelimit::TokenBucket;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn CacheAdapter>,
    pub queue: Arc<dyn QueueAdapter>,
    pub activity: Arc<ActivityController>,
    pub admission: Arc<AdmissionService>,
    pub auth: Arc<TokenIssuer>,
    pub submit_rate_limiter: Arc<TokenBucket>,
}

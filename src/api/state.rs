//! Application state for shared services

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::api_key::{IpRateLimiter, KeyService};
use crate::infrastructure::render::ConvertService;

pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Shared state behind every handler. Cheap to clone; everything mutable
/// sits behind its own synchronization.
#[derive(Clone)]
pub struct AppState {
    /// Process-lifetime client keys from configuration. Never mutated.
    pub static_keys: Arc<HashSet<String>>,
    /// Process-lifetime administrator keys from configuration.
    pub master_keys: Arc<HashSet<String>>,
    /// Temporary-key service; `None` when the dynamic-key feature is
    /// disabled.
    pub key_service: Option<Arc<KeyService>>,
    pub converter: ConvertService,
    pub admin_limiter: Arc<IpRateLimiter>,
    /// Advertised in the Retry-After header on store failures.
    pub retry_after: Duration,
}

impl AppState {
    pub fn new(
        static_keys: HashSet<String>,
        master_keys: HashSet<String>,
        key_service: Option<Arc<KeyService>>,
        converter: ConvertService,
    ) -> Self {
        Self {
            static_keys: Arc::new(static_keys),
            master_keys: Arc::new(master_keys),
            key_service,
            converter,
            admin_limiter: Arc::new(IpRateLimiter::default()),
            retry_after: DEFAULT_RETRY_AFTER,
        }
    }

    pub fn with_admin_limiter(mut self, limiter: IpRateLimiter) -> Self {
        self.admin_limiter = Arc::new(limiter);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }
}

//! Adapter wiring - picks concrete implementations for each port.

use std::sync::Arc;

use campus_core::ports::{BackendApi, IdentityProvider, RateLimiter, RealtimeConnector};
use campus_infra::{
    BackendConfig, HttpBackend, IdentityToolkitConfig, IdentityToolkitProvider,
    InMemoryIdentityProvider, RateLimitConfig, SlidingWindowRateLimiter, SocketIoConfig,
    SocketIoConnector,
};

/// Concrete adapters the coordinator runs on.
pub struct Adapters {
    pub provider: Arc<dyn IdentityProvider>,
    pub backend: Arc<dyn BackendApi>,
    pub limiter: Arc<dyn RateLimiter>,
    pub connector: Arc<dyn RealtimeConnector>,
}

impl Adapters {
    /// Build adapters from environment configuration.
    pub fn from_env() -> anyhow::Result<Self> {
        let provider: Arc<dyn IdentityProvider> = match IdentityToolkitConfig::from_env() {
            Some(config) => Arc::new(IdentityToolkitProvider::new(config)?),
            None => {
                tracing::warn!("IDENTITY_API_KEY not set. Using in-memory identity provider.");
                Arc::new(InMemoryIdentityProvider::new())
            }
        };

        let backend = Arc::new(HttpBackend::new(BackendConfig::from_env())?);

        let limit = RateLimitConfig::from_env();
        tracing::debug!(
            max_calls = limit.max_calls,
            window_ms = limit.window.as_millis() as u64,
            "Profile check rate limit"
        );
        let limiter = Arc::new(SlidingWindowRateLimiter::new(limit));

        let connector = Arc::new(SocketIoConnector::new(SocketIoConfig::from_env()));

        Ok(Self {
            provider,
            backend,
            limiter,
            connector,
        })
    }
}

//! Rate limiting port.

use async_trait::async_trait;
use std::time::Duration;

/// Rate limiter trait - per-key call gate.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check if a call is allowed and record it if so.
    /// Rejected calls are not recorded.
    async fn check(&self, key: &str) -> Result<RateLimitResult, RateLimitError>;

    /// Time until the next call for `key` would be allowed. Zero if allowed now.
    async fn time_until_next_call(&self, key: &str) -> Duration;

    /// Forget all recorded calls for `key`.
    async fn clear(&self, key: &str);
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_after: Duration,
}

/// Rate limit errors.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Backend error: {0}")]
    Backend(String),
}

//! In-memory sliding-window rate limiter.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use campus_core::ports::{RateLimitError, RateLimitResult, RateLimiter};

/// In-memory rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum calls per window.
    pub max_calls: u32,
    /// Window duration.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 5,
            window: Duration::from_millis(30_000),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        Self {
            max_calls: std::env::var("PROFILE_CHECK_MAX_CALLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(5),
            window: Duration::from_millis(
                std::env::var("PROFILE_CHECK_WINDOW_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30_000),
            ),
        }
    }
}

/// Per-key sliding-window limiter.
///
/// Keeps the timestamp of every allowed call inside the trailing window, so the
/// quota holds for any window position rather than per fixed bucket.
/// Note: Limits are per-process.
pub struct SlidingWindowRateLimiter {
    calls: Mutex<HashMap<String, VecDeque<Instant>>>,
    config: RateLimitConfig,
}

impl SlidingWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(RateLimitConfig::from_env())
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Drop timestamps that have left the window.
    fn prune(&self, stamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = stamps.front() {
            if now.duration_since(*oldest) >= self.config.window {
                stamps.pop_front();
            } else {
                break;
            }
        }
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.calls.lock().await.len()
    }

    fn wait_time(&self, stamps: &VecDeque<Instant>, now: Instant) -> Duration {
        if stamps.len() < self.config.max_calls as usize {
            return Duration::ZERO;
        }
        stamps
            .front()
            .map(|oldest| self.config.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for SlidingWindowRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowRateLimiter {
    async fn check(&self, key: &str) -> Result<RateLimitResult, RateLimitError> {
        let now = Instant::now();
        let mut calls = self.calls.lock().await;
        // Sweep every key so idle ones do not linger with empty windows.
        calls.retain(|_, stamps| {
            self.prune(stamps, now);
            !stamps.is_empty()
        });
        let stamps = calls.entry(key.to_string()).or_default();

        let max = self.config.max_calls as usize;
        if stamps.len() < max {
            stamps.push_back(now);
            // Time until the oldest recorded call frees its slot.
            let reset_after = stamps
                .front()
                .map(|oldest| self.config.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.config.window);
            Ok(RateLimitResult {
                allowed: true,
                remaining: (max - stamps.len()) as u32,
                reset_after,
            })
        } else {
            let reset_after = self.wait_time(stamps, now);
            tracing::debug!(
                key = %key,
                retry_after_ms = reset_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            Ok(RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_after,
            })
        }
    }

    async fn time_until_next_call(&self, key: &str) -> Duration {
        let now = Instant::now();
        let mut calls = self.calls.lock().await;
        let Some(stamps) = calls.get_mut(key) else {
            return Duration::ZERO;
        };
        self.prune(stamps, now);
        let wait = self.wait_time(stamps, now);
        if stamps.is_empty() {
            calls.remove(key);
        }
        wait
    }

    async fn clear(&self, key: &str) {
        self.calls.lock().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_calls: u32, window_ms: u64) -> SlidingWindowRateLimiter {
        SlidingWindowRateLimiter::new(RateLimitConfig {
            max_calls,
            window: Duration::from_millis(window_ms),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_allows_up_to_quota() {
        let limiter = limiter(5, 30_000);

        for expected_remaining in (0..5).rev() {
            let res = limiter.check("profile-check").await.unwrap();
            assert!(res.allowed);
            assert_eq!(res.remaining, expected_remaining);
        }

        let res = limiter.check("profile-check").await.unwrap();
        assert!(!res.allowed);
        assert_eq!(res.remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_calls_are_not_recorded() {
        let limiter = limiter(1, 1_000);
        assert!(limiter.check("k").await.unwrap().allowed);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(!limiter.check("k").await.unwrap().allowed);

        // Only the first call counts, so the slot frees at t=1000, not t=1600.
        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(limiter.check("k").await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides_instead_of_resetting() {
        let limiter = limiter(2, 1_000);

        assert!(limiter.check("k").await.unwrap().allowed); // t=0
        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(limiter.check("k").await.unwrap().allowed); // t=900

        // A fixed 1s bucket would reset here; a sliding window still holds t=900.
        tokio::time::advance(Duration::from_millis(200)).await; // t=1100
        assert!(limiter.check("k").await.unwrap().allowed);
        assert!(!limiter.check("k").await.unwrap().allowed);

        tokio::time::advance(Duration::from_millis(800)).await; // t=1900, t=900 expired
        assert!(limiter.check("k").await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_quota_in_any_trailing_window() {
        let limiter = limiter(3, 1_000);
        let mut allowed_at: Vec<u64> = Vec::new();

        for step in 0..200u64 {
            if limiter.check("k").await.unwrap().allowed {
                allowed_at.push(step * 70);
            }
            tokio::time::advance(Duration::from_millis(70)).await;
        }

        assert!(!allowed_at.is_empty());
        for (i, start) in allowed_at.iter().enumerate() {
            let in_window = allowed_at[i..]
                .iter()
                .take_while(|t| **t < start + 1_000)
                .count();
            assert!(in_window <= 3, "{} calls within window starting at {}", in_window, start);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_until_next_call_when_exhausted() {
        let limiter = limiter(5, 30_000);
        assert_eq!(limiter.time_until_next_call("k").await, Duration::ZERO);

        for _ in 0..5 {
            limiter.check("k").await.unwrap();
        }
        assert!(!limiter.check("k").await.unwrap().allowed);

        let wait = limiter.time_until_next_call("k").await;
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_millis(30_000));

        tokio::time::advance(Duration::from_millis(10_000)).await;
        assert_eq!(
            limiter.time_until_next_call("k").await,
            Duration::from_millis(20_000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_resets_key() {
        let limiter = limiter(2, 30_000);
        for _ in 0..4 {
            let _ = limiter.check("k").await.unwrap();
        }
        assert!(!limiter.check("k").await.unwrap().allowed);

        limiter.clear("k").await;
        assert!(limiter.check("k").await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = limiter(1, 30_000);
        assert!(limiter.check("a").await.unwrap().allowed);
        assert!(!limiter.check("a").await.unwrap().allowed);
        assert!(limiter.check("b").await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_keys_are_dropped() {
        let limiter = limiter(2, 1_000);
        limiter.check("a").await.unwrap();
        limiter.check("b").await.unwrap();
        assert_eq!(limiter.tracked_keys().await, 2);

        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert!(limiter.check("c").await.unwrap().allowed);
        assert_eq!(limiter.tracked_keys().await, 1);

        // A key that comes back starts with a full quota.
        let res = limiter.check("a").await.unwrap();
        assert_eq!(res.remaining, 1);
        assert_eq!(limiter.tracked_keys().await, 2);
    }
}

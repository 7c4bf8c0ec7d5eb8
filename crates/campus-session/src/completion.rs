//! Profile completion cache.
//!
//! Answers "is this user's profile complete" from a short-lived cache, going
//! to the backend at most once per key at a time and only while the shared
//! rate limiter allows it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use campus_core::domain::{AuthToken, DegradeReason, Outcome, Role};
use campus_core::ports::{BackendApi, RateLimiter};

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Age after which an entry no longer counts as fresh.
    pub freshness: Duration,
    /// Limiter key shared by every completion fetch.
    pub limiter_key: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(30),
            limiter_key: "profile-check".to_string(),
        }
    }
}

impl CompletionConfig {
    pub fn from_env() -> Self {
        Self {
            freshness: Duration::from_secs(
                std::env::var("PROFILE_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            ..Default::default()
        }
    }
}

type CacheKey = (i64, Role);

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    is_complete: bool,
    computed_at: Instant,
}

pub struct ProfileCompletionCache {
    backend: Arc<dyn BackendApi>,
    limiter: Arc<dyn RateLimiter>,
    config: CompletionConfig,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    /// One fetch per key at a time; late callers wait and read the result.
    inflight: parking_lot::Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl ProfileCompletionCache {
    pub fn new(
        backend: Arc<dyn BackendApi>,
        limiter: Arc<dyn RateLimiter>,
        config: CompletionConfig,
    ) -> Self {
        Self {
            backend,
            limiter,
            config,
            entries: Mutex::new(HashMap::new()),
            inflight: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Completeness of `user_id`'s profile for `role`.
    ///
    /// Never fails: a rate-limited call answers with the last known value
    /// (or `false`), a failed fetch caches and answers `false`.
    pub async fn get_completion_status(
        &self,
        user_id: i64,
        role: Role,
        token: &AuthToken,
    ) -> Outcome<bool> {
        let key = (user_id, role);

        if let Some(is_complete) = self.fresh(key).await {
            return Outcome::Fresh(is_complete);
        }

        let gate = self.gate(key);
        let outcome = {
            let _fetching = gate.lock().await;
            self.refresh(user_id, role, token).await
        };
        self.release(key, &gate);
        outcome
    }

    /// Forget the entry for `(user_id, role)` so the next read fetches.
    pub async fn invalidate(&self, user_id: i64, role: Role) {
        if self.entries.lock().await.remove(&(user_id, role)).is_some() {
            tracing::debug!(user_id, role = %role, "Profile completion invalidated");
        }
    }

    /// Fetch under the key's gate, unless a caller ahead of us already did.
    async fn refresh(&self, user_id: i64, role: Role, token: &AuthToken) -> Outcome<bool> {
        let key = (user_id, role);
        if let Some(is_complete) = self.fresh(key).await {
            return Outcome::Fresh(is_complete);
        }

        match self.limiter.check(&self.config.limiter_key).await {
            Ok(result) if !result.allowed => {
                let value = self.last_known(key).await.unwrap_or(false);
                tracing::debug!(
                    user_id,
                    role = %role,
                    retry_after_ms = result.reset_after.as_millis() as u64,
                    "Profile check rate limited, answering from cache"
                );
                return Outcome::Degraded {
                    value,
                    reason: DegradeReason::RateLimited {
                        retry_after: result.reset_after,
                    },
                };
            }
            Ok(_) => {}
            Err(e) => {
                // Fail open
                tracing::warn!(error = %e, "Rate limiter unavailable, allowing profile check");
            }
        }

        match self.backend.fetch_profile(token).await {
            Ok(profile) => {
                let is_complete = profile.is_complete_for(role);
                self.store(key, is_complete).await;
                tracing::debug!(user_id, role = %role, is_complete, "Profile completion computed");
                Outcome::Fresh(is_complete)
            }
            Err(e) => {
                tracing::warn!(
                    user_id,
                    role = %role,
                    error = %e,
                    "Profile fetch failed, caching incomplete"
                );
                self.store(key, false).await;
                Outcome::Degraded {
                    value: false,
                    reason: DegradeReason::FetchFailed(e.to_string()),
                }
            }
        }
    }

    async fn fresh(&self, key: CacheKey) -> Option<bool> {
        let entries = self.entries.lock().await;
        entries
            .get(&key)
            .filter(|entry| entry.computed_at.elapsed() < self.config.freshness)
            .map(|entry| entry.is_complete)
    }

    async fn last_known(&self, key: CacheKey) -> Option<bool> {
        self.entries.lock().await.get(&key).map(|entry| entry.is_complete)
    }

    async fn store(&self, key: CacheKey, is_complete: bool) {
        self.entries.lock().await.insert(
            key,
            CacheEntry {
                is_complete,
                computed_at: Instant::now(),
            },
        );
    }

    fn gate(&self, key: CacheKey) -> Arc<Mutex<()>> {
        self.inflight.lock().entry(key).or_default().clone()
    }

    /// Drop the key's gate once nobody else holds or waits on it.
    fn release(&self, key: CacheKey, gate: &Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock();
        // Clones are only handed out under this lock: two means the map and us.
        if Arc::strong_count(gate) <= 2 {
            inflight.remove(&key);
        }
    }

    #[cfg(test)]
    fn gate_count(&self) -> usize {
        self.inflight.lock().len()
    }
}

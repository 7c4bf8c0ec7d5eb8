use std::time::Duration;

/// A value that may have been produced without the fresh computation it asked for.
///
/// Degraded values are still safe to use for UI gating; the reason is kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Fresh(T),
    Degraded { value: T, reason: DegradeReason },
}

/// Why an [`Outcome`] is degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradeReason {
    /// The rate limiter refused a fetch; value is the last cached one (or the default).
    RateLimited { retry_after: Duration },
    /// The backend fetch failed; the conservative default was cached.
    FetchFailed(String),
    /// There is no current session to evaluate.
    NoSession,
}

impl<T> Outcome<T> {
    pub fn value(&self) -> &T {
        match self {
            Outcome::Fresh(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Fresh(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Outcome::Fresh(_))
    }

    pub fn reason(&self) -> Option<&DegradeReason> {
        match self {
            Outcome::Fresh(_) => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }
}

impl<T: Copy> Outcome<T> {
    pub fn get(&self) -> T {
        *self.value()
    }
}

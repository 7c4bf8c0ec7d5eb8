//! Session-level error types.

use thiserror::Error;

use crate::ports::{BackendError, ProviderError};

/// Errors surfaced by session operations.
///
/// Only operations that back a user-facing form return these; everything
/// else degrades to a conservative value instead.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Backend registration failed after the provider account was created.
    /// The provider identity `uid` now exists without an application record.
    #[error("Registration failed for provider identity {uid}: {source}")]
    Registration { uid: String, source: BackendError },

    #[error("Backend request failed: {0}")]
    Backend(#[from] BackendError),

    #[error("No active session")]
    NoActiveSession,
}

impl SessionError {
    /// Provider identity left behind by a failed sign-up, if any.
    pub fn orphaned_uid(&self) -> Option<&str> {
        match self {
            SessionError::Registration { uid, .. } => Some(uid),
            _ => None,
        }
    }
}

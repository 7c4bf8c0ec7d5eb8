//! Identity provider port.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ProviderIdentity, SessionEvent};

/// Callback invoked with every auth-state transition, in order.
pub type AuthStateListener = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// External identity provider (hosted auth service, SDK, or an in-memory fake).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify an email/password credential and make it the current identity.
    async fn sign_in_with_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError>;

    /// Create a new account and make it the current identity.
    async fn create_account_with_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError>;

    /// Revoke the current provider session.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Register a listener for auth-state transitions.
    ///
    /// The listener is called once with the current state right away, then on
    /// every change until the returned subscription is dropped.
    fn subscribe(&self, listener: AuthStateListener) -> Subscription;
}

/// Error reported by the identity provider, passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({code})")]
pub struct ProviderError {
    /// Provider-defined code, e.g. `auth/wrong-password` or `EMAIL_EXISTS`.
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn network(detail: impl fmt::Display) -> Self {
        Self::new("network-request-failed", detail.to_string())
    }
}

/// Handle for a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

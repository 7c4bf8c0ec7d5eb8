//! Backend REST port.

use async_trait::async_trait;

use crate::domain::{AuthToken, BackendSession, Profile, Role};

/// Registration payload for `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub provider_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Application backend - user lookup, registration and profile records.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Look up the application session for a provider identity.
    async fn lookup_user(&self, provider_id: &str) -> Result<BackendSession, BackendError>;

    /// Register role and profile shell for a new provider identity. Unauthenticated.
    async fn register(&self, registration: &Registration) -> Result<(), BackendError>;

    /// Fetch the profile of the token's owner.
    async fn fetch_profile(&self, token: &AuthToken) -> Result<Profile, BackendError>;

    /// Replace the profile of the token's owner.
    async fn update_profile(
        &self,
        token: &AuthToken,
        profile: &Profile,
    ) -> Result<Profile, BackendError>;
}

/// Backend errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Backend returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound)
    }
}

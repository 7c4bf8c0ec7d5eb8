//! Session store - the operations UI code calls.

use std::sync::Arc;

use tokio::sync::watch;

use campus_core::SessionError;
use campus_core::domain::{AuthUser, DegradeReason, Outcome, Profile, ProviderIdentity, Role};
use campus_core::ports::{BackendApi, IdentityProvider, ProviderError, Registration};

use crate::completion::ProfileCompletionCache;
use crate::resolver::IdentityResolver;
use crate::slot::{SessionSlot, SessionSnapshot};

pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    backend: Arc<dyn BackendApi>,
    cache: Arc<ProfileCompletionCache>,
    resolver: Arc<IdentityResolver>,
    slot: Arc<SessionSlot>,
}

impl SessionStore {
    pub(crate) fn new(
        provider: Arc<dyn IdentityProvider>,
        backend: Arc<dyn BackendApi>,
        cache: Arc<ProfileCompletionCache>,
        resolver: Arc<IdentityResolver>,
        slot: Arc<SessionSlot>,
    ) -> Self {
        Self {
            provider,
            backend,
            cache,
            resolver,
            slot,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.slot.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.slot.subscribe()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.slot.snapshot().user
    }

    pub fn loading(&self) -> bool {
        self.slot.snapshot().loading
    }

    /// Verify credentials with the provider.
    ///
    /// The user is published by the resolver once the provider reports the
    /// sign-in, not by this call.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        self.provider.sign_in_with_credential(email, password).await
    }

    /// Create a provider account and register it with the backend.
    ///
    /// If registration fails the provider account is left in place and the
    /// error carries its uid.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<ProviderIdentity, SessionError> {
        let identity = self.provider.create_account_with_credential(email, password).await?;

        let email = identity
            .email
            .clone()
            .unwrap_or_else(|| email.trim().to_string());
        let registration = Registration {
            provider_id: identity.uid.clone(),
            name: display_name(&email),
            email,
            role,
        };

        if let Err(source) = self.backend.register(&registration).await {
            tracing::error!(
                uid = %identity.uid,
                role = %role,
                error = %source,
                "Registration failed, provider account left without application record"
            );
            return Err(SessionError::Registration {
                uid: identity.uid,
                source,
            });
        }

        tracing::info!(uid = %identity.uid, role = %role, "Account registered");

        // The provider's signed-in event may have been resolved before the
        // backend record existed.
        self.resolver.resync();
        Ok(identity)
    }

    /// Revoke the provider session and publish "no user".
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.provider.sign_out().await?;
        self.resolver.sign_out();
        tracing::info!("Signed out");
        Ok(())
    }

    /// Re-read profile completeness through the cache and publish it.
    pub async fn check_profile_completion(&self) -> Outcome<bool> {
        let Some((generation, user)) = self.slot.current_user() else {
            return no_session();
        };
        self.recompute(generation, &user).await
    }

    /// Drop the cached verdict for the current user, then recompute it.
    pub async fn refresh_user_profile(&self) -> Outcome<bool> {
        let Some((generation, user)) = self.slot.current_user() else {
            return no_session();
        };
        self.cache.invalidate(user.user_id(), user.role()).await;
        self.recompute(generation, &user).await
    }

    /// Save the current user's profile, then refresh completeness.
    pub async fn update_profile(&self, profile: &Profile) -> Result<Outcome<bool>, SessionError> {
        let user = self.user().ok_or(SessionError::NoActiveSession)?;
        self.backend.update_profile(user.token(), profile).await?;
        tracing::info!(user_id = user.user_id(), "Profile updated");
        Ok(self.refresh_user_profile().await)
    }

    async fn recompute(&self, generation: u64, user: &AuthUser) -> Outcome<bool> {
        let outcome = self
            .cache
            .get_completion_status(user.user_id(), user.role(), user.token())
            .await;

        if !self.slot.set_profile_complete(generation, user.user_id(), outcome.get()) {
            tracing::debug!(user_id = user.user_id(), "Session changed during profile check");
        }
        outcome
    }
}

fn no_session() -> Outcome<bool> {
    Outcome::Degraded {
        value: false,
        reason: DegradeReason::NoSession,
    }
}

/// Initial profile name: the local part of the email address.
fn display_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

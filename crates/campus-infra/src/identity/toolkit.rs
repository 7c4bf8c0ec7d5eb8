//! Hosted identity provider speaking the Identity Toolkit REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use campus_core::domain::ProviderIdentity;
use campus_core::ports::{AuthStateListener, IdentityProvider, ProviderError, Subscription};

use super::state::AuthState;

/// Identity Toolkit configuration.
#[derive(Debug, Clone)]
pub struct IdentityToolkitConfig {
    /// Project web API key.
    pub api_key: String,
    /// API root.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl IdentityToolkitConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://identitytoolkit.googleapis.com/v1";

    /// Load configuration from environment variables.
    /// Returns `None` when `IDENTITY_API_KEY` is not set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("IDENTITY_API_KEY").ok().filter(|k| !k.is_empty())?;
        Some(Self {
            api_key,
            base_url: std::env::var("IDENTITY_BASE_URL")
                .unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("IDENTITY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Email/password identity provider backed by the Identity Toolkit service.
///
/// The provider session is process-local: signing out forgets the identity
/// without contacting the service.
pub struct IdentityToolkitProvider {
    client: Client,
    config: IdentityToolkitConfig,
    state: AuthState,
}

impl IdentityToolkitProvider {
    pub fn new(config: IdentityToolkitConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::network)?;

        tracing::info!(url = %config.base_url, "Identity Toolkit provider configured");

        Ok(Self {
            client,
            config,
            state: AuthState::new(),
        })
    }

    async fn call(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        let url = format!(
            "{}/accounts:{}",
            self.config.base_url.trim_end_matches('/'),
            method
        );

        let response = self
            .client
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(ProviderError::network)?;

        let status = response.status();
        let body = response.text().await.map_err(ProviderError::network)?;

        if !status.is_success() {
            return Err(provider_error_from_body(status.as_u16(), &body));
        }

        let account: AccountResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::new("internal-error", e.to_string()))?;
        Ok(ProviderIdentity::new(account.local_id, account.email))
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitProvider {
    async fn sign_in_with_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        let identity = self.call("signInWithPassword", email, password).await?;
        tracing::debug!(uid = %identity.uid, "Provider sign-in");
        self.state.set(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_account_with_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        let identity = self.call("signUp", email, password).await?;
        tracing::debug!(uid = %identity.uid, "Provider account created");
        self.state.set(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.state.set(None);
        Ok(())
    }

    fn subscribe(&self, listener: AuthStateListener) -> Subscription {
        self.state.subscribe(listener)
    }
}

/// Map an error body like `{"error":{"message":"WEAK_PASSWORD : Password should be ..."}}`.
fn provider_error_from_body(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let message = envelope.error.message;
            let code = message
                .split_once(" : ")
                .map(|(code, _)| code.to_string())
                .unwrap_or_else(|| message.clone());
            ProviderError::new(code, message)
        }
        Err(_) => ProviderError::new(format!("http-{}", status), body.to_string()),
    }
}

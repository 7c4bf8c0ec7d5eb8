//! In-memory identity provider.
//!
//! Fallback when no hosted identity service is configured, and the provider used in tests.
//! Accounts live only for the lifetime of the process.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use campus_core::domain::ProviderIdentity;
use campus_core::ports::{AuthStateListener, IdentityProvider, ProviderError, Subscription};

use super::state::AuthState;

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    uid: String,
    email: String,
    password: String,
}

/// Identity provider backed by a process-local account table.
pub struct InMemoryIdentityProvider {
    accounts: RwLock<HashMap<String, Account>>,
    state: AuthState,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            state: AuthState::new(),
        }
    }

    /// Seed an account without signing it in. Returns its uid.
    pub fn add_account(&self, email: &str, password: &str) -> Result<String, ProviderError> {
        let key = normalize_email(email)?;
        validate_password(password)?;

        let mut accounts = self.accounts.write();
        if accounts.contains_key(&key) {
            return Err(ProviderError::new(
                "auth/email-already-in-use",
                "The email address is already in use by another account.",
            ));
        }

        let uid = uuid::Uuid::new_v4().simple().to_string();
        accounts.insert(
            key.clone(),
            Account {
                uid: uid.clone(),
                email: key,
                password: password.to_string(),
            },
        );
        Ok(uid)
    }

    pub fn current_identity(&self) -> Option<ProviderIdentity> {
        self.state.current()
    }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_in_with_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        let key = normalize_email(email)?;

        let identity = {
            let accounts = self.accounts.read();
            let account = accounts.get(&key).ok_or_else(|| {
                ProviderError::new(
                    "auth/user-not-found",
                    "There is no user record corresponding to this identifier.",
                )
            })?;
            if account.password != password {
                return Err(ProviderError::new(
                    "auth/wrong-password",
                    "The password is invalid.",
                ));
            }
            ProviderIdentity::new(account.uid.clone(), Some(account.email.clone()))
        };

        tracing::debug!(uid = %identity.uid, "Provider sign-in");
        self.state.set(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_account_with_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        let uid = self.add_account(email, password)?;
        let identity = ProviderIdentity::new(uid, Some(normalize_email(email)?));

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

fn normalize_email(email: &str) -> Result<String, ProviderError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ProviderError::new(
            "auth/invalid-email",
            "The email address is badly formatted.",
        )),
    }
}

fn validate_password(password: &str) -> Result<(), ProviderError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ProviderError::new(
            "auth/weak-password",
            "Password should be at least 6 characters.",
        ));
    }
    Ok(())
}

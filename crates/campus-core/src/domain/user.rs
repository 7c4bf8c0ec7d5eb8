use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// Identity as reported by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Opaque, provider-unique id.
    pub uid: String,
    pub email: Option<String>,
}

impl ProviderIdentity {
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            email,
        }
    }
}

/// Backend-issued bearer credential. Distinct from any provider credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// The backend half of a session: role, numeric id and token always travel together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSession {
    pub role: Role,
    pub user_id: i64,
    pub token: AuthToken,
}

/// The resolved application user published by the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub identity: ProviderIdentity,
    pub session: BackendSession,
    pub profile_complete: bool,
    pub resolved_at: DateTime<Utc>,
}

impl AuthUser {
    pub fn new(
        identity: ProviderIdentity,
        session: BackendSession,
        profile_complete: bool,
    ) -> Self {
        Self {
            identity,
            session,
            profile_complete,
            resolved_at: Utc::now(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.identity.uid
    }

    pub fn email(&self) -> Option<&str> {
        self.identity.email.as_deref()
    }

    pub fn role(&self) -> Role {
        self.session.role
    }

    pub fn user_id(&self) -> i64 {
        self.session.user_id
    }

    pub fn token(&self) -> &AuthToken {
        &self.session.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AuthToken::new("secret-bearer");
        assert_eq!(format!("{:?}", token), "AuthToken(***)");
        assert_eq!(token.as_str(), "secret-bearer");
    }

    #[test]
    fn test_auth_user_accessors() {
        let user = AuthUser::new(
            ProviderIdentity::new("uid-1", Some("a@b.edu".to_string())),
            BackendSession {
                role: Role::Teacher,
                user_id: 42,
                token: AuthToken::new("t"),
            },
            false,
        );

        assert_eq!(user.uid(), "uid-1");
        assert_eq!(user.email(), Some("a@b.edu"));
        assert_eq!(user.role(), Role::Teacher);
        assert_eq!(user.user_id(), 42);
        assert!(!user.profile_complete);
    }
}

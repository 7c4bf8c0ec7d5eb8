//! Agent configuration loaded from environment variables.

use std::env;

use campus_core::domain::Role;

/// Credentials the agent signs in with.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    /// Register the account first with this role.
    pub sign_up_as: Option<Role>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("sign_up_as", &self.sign_up_as)
            .finish_non_exhaustive()
    }
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub credentials: Option<Credentials>,
    /// Rooms to join once the channel is up.
    pub rooms: Vec<String>,
    /// View the agent reports as active.
    pub view: String,
}

impl AgentConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let credentials = match (env::var("AGENT_EMAIL"), env::var("AGENT_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(Credentials {
                email,
                password,
                sign_up_as: env::var("AGENT_SIGN_UP_ROLE").ok().and_then(|r| r.parse().ok()),
            }),
            _ => None,
        };

        Self {
            credentials,
            rooms: parse_rooms(&env::var("AGENT_ROOMS").unwrap_or_default()),
            view: env::var("AGENT_VIEW").unwrap_or_else(|_| "/login".to_string()),
        }
    }
}

/// Parse a comma separated room list. Blank entries are skipped.
fn parse_rooms(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|room| !room.is_empty())
        .map(str::to_string)
        .collect()
}

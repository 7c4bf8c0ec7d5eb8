use super::{ProviderIdentity, Role};

/// Auth-state transition delivered by an identity provider subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(ProviderIdentity),
    SignedOut,
}

/// Views that count as login-style entry points.
pub const ENTRY_VIEWS: &[&str] = &["/", "/login", "/signup"];

/// Request to move the UI to a role's landing view once a session resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectIntent {
    pub role: Role,
    pub from: String,
    pub to: &'static str,
}

impl RedirectIntent {
    /// Build an intent if `active_view` is an entry point.
    pub fn from_view(active_view: &str, role: Role) -> Option<Self> {
        let path = active_view.split(['?', '#']).next().unwrap_or(active_view);
        let path = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };

        ENTRY_VIEWS.contains(&path).then(|| Self {
            role,
            from: active_view.to_string(),
            to: role.landing_path(),
        })
    }
}

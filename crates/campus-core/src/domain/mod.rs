//! Domain entities - the session data model.

mod event;
mod outcome;
mod profile;
mod role;
mod user;

pub use event::{ENTRY_VIEWS, RedirectIntent, SessionEvent};
pub use outcome::{DegradeReason, Outcome};
pub use profile::Profile;
pub use role::{Role, UnknownRole};
pub use user::{AuthToken, AuthUser, BackendSession, ProviderIdentity};

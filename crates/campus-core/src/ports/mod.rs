//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod backend;
mod identity;
mod rate_limit;
mod realtime;

pub use backend::{BackendApi, BackendError, Registration};
pub use identity::{AuthStateListener, IdentityProvider, ProviderError, Subscription};
pub use rate_limit::{RateLimitError, RateLimitResult, RateLimiter};
pub use realtime::{
    RealtimeConnection, RealtimeConnector, TransportError, TransportEvent, TransportListener,
};

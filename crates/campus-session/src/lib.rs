//! # Campus Session
//!
//! Reconciles the identity provider's auth state with the backend-issued
//! application session and keeps the realtime channel in step with it.
//!
//! Components, leaves first: [`ProfileCompletionCache`] (guarded by a
//! rate limiter port), [`IdentityResolver`], [`SessionStore`] and
//! [`RealtimeChannelManager`]. [`SessionCoordinator`] wires them together.

pub mod completion;
pub mod coordinator;
pub mod realtime;
pub mod resolver;
pub mod slot;
pub mod store;

#[cfg(test)]
mod testing;

pub use completion::{CompletionConfig, ProfileCompletionCache};
pub use coordinator::{CoordinatorConfig, SessionCoordinator};
pub use realtime::{RealtimeChannelManager, RealtimeConfig};
pub use resolver::IdentityResolver;
pub use slot::{ResolverPhase, SessionSnapshot};
pub use store::SessionStore;

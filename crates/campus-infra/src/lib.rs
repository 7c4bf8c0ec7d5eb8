//! # Campus Infrastructure
//!
//! Concrete implementations of the ports defined in `campus-core`.
//! This crate contains the rate limiter, identity providers, the backend
//! REST client and the realtime transport.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No network adapters, in-memory only
//! - `http` - Backend REST client and Identity Toolkit provider via reqwest
//! - `socketio` - Socket.IO client transport via tokio-tungstenite

pub mod backend;
pub mod identity;
pub mod rate_limit;
pub mod realtime;

// Re-exports - In-Memory
pub use identity::InMemoryIdentityProvider;
pub use rate_limit::{RateLimitConfig, SlidingWindowRateLimiter};

// Re-exports - Network
#[cfg(feature = "http")]
pub use backend::{BackendConfig, HttpBackend};
#[cfg(feature = "http")]
pub use identity::{IdentityToolkitConfig, IdentityToolkitProvider};
#[cfg(feature = "socketio")]
pub use realtime::{SocketIoConfig, SocketIoConnector};

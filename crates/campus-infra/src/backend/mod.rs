//! Backend API clients.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{BackendConfig, HttpBackend};

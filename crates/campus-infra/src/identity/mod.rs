//! Identity provider implementations.

mod memory;
mod state;

pub use memory::InMemoryIdentityProvider;

#[cfg(feature = "http")]
mod toolkit;
#[cfg(feature = "http")]
pub use toolkit::{IdentityToolkitConfig, IdentityToolkitProvider};

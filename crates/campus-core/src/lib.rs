//! # Campus Core
//!
//! The domain layer of the campus session coordinator.
//! This crate holds the session data model and the ports the coordinator talks through,
//! with zero infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::SessionError;

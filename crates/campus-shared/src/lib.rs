//! # Campus Shared
//!
//! Wire types shared with the backend: REST request/response bodies,
//! the RFC 7807 error envelope, and realtime event names.

pub mod dto;
pub mod events;
pub mod response;

pub use response::ErrorResponse;

//! Realtime transports.

#[cfg(feature = "socketio")]
mod packet;
#[cfg(feature = "socketio")]
mod socketio;

#[cfg(feature = "socketio")]
pub use socketio::{SocketIoConfig, SocketIoConnection, SocketIoConnector};

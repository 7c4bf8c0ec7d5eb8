//! Realtime channel port.

use std::sync::Arc;

use async_trait::async_trait;

/// Connection lifecycle reported by a transport. Used for status tracking only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected(String),
    ConnectError(String),
    Error(String),
}

/// Callback receiving lifecycle events of one connection.
pub type TransportListener = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Opens fresh realtime connections. Every call yields an independent connection.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    /// Connect and complete the handshake.
    async fn connect(
        &self,
        listener: TransportListener,
    ) -> Result<Arc<dyn RealtimeConnection>, TransportError>;
}

/// A live realtime connection.
#[async_trait]
pub trait RealtimeConnection: Send + Sync {
    /// Emit a client event carrying a room identifier.
    async fn emit(&self, event: &str, room: &str) -> Result<(), TransportError>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}

/// Transport errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Connection closed")]
    Closed,

    #[error("Send failed: {0}")]
    Send(String),
}

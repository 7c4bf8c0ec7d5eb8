//! Socket.IO client transport over WebSocket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use campus_core::ports::{
    RealtimeConnection, RealtimeConnector, TransportError, TransportEvent, TransportListener,
};

use super::packet::{self, Frame};

/// Socket.IO endpoint configuration.
#[derive(Debug, Clone)]
pub struct SocketIoConfig {
    /// Server origin (http, https, ws or wss), e.g. http://localhost:4000
    pub url: String,
    /// Engine.IO mount path.
    pub path: String,
}

impl Default for SocketIoConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:4000".to_string(),
            path: "/socket.io/".to_string(),
        }
    }
}

impl SocketIoConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("SOCKET_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            path: std::env::var("SOCKET_PATH").unwrap_or_else(|_| "/socket.io/".to_string()),
        }
    }

    /// WebSocket URL for an Engine.IO v4 websocket-only session.
    pub fn websocket_url(&self) -> Result<String, TransportError> {
        let (scheme, rest) = self
            .url
            .split_once("://")
            .ok_or_else(|| TransportError::Connect(format!("invalid SOCKET_URL: {}", self.url)))?;

        let scheme = match scheme {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(TransportError::Connect(format!(
                    "unsupported scheme: {}",
                    other
                )));
            }
        };

        let host = rest.trim_end_matches('/');
        let path = format!("/{}/", self.path.trim_matches('/'));
        Ok(format!(
            "{}://{}{}?EIO=4&transport=websocket",
            scheme, host, path
        ))
    }
}

/// Opens one fresh Socket.IO session per `connect` call.
pub struct SocketIoConnector {
    config: SocketIoConfig,
}

impl SocketIoConnector {
    pub fn new(config: SocketIoConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(SocketIoConfig::from_env())
    }
}

#[async_trait]
impl RealtimeConnector for SocketIoConnector {
    async fn connect(
        &self,
        listener: TransportListener,
    ) -> Result<Arc<dyn RealtimeConnection>, TransportError> {
        let url = self.config.websocket_url()?;

        let (stream, _) = connect_async(url.as_str()).await.map_err(|e| {
            listener(TransportEvent::ConnectError(e.to_string()));
            TransportError::Connect(e.to_string())
        })?;
        let (mut sink, mut source) = stream.split();

        let deadline = match next_frame(&mut source).await? {
            Frame::Open { sid, deadline } => {
                tracing::debug!(sid = %sid, "Engine.IO session opened");
                deadline
            }
            other => {
                return Err(TransportError::Handshake(format!(
                    "expected open packet, got {:?}",
                    other
                )));
            }
        };

        sink.send(Message::text(packet::CONNECT.to_string()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        let sid = loop {
            match next_frame(&mut source).await? {
                Frame::Connect { sid } => break sid,
                Frame::ConnectError(message) => {
                    listener(TransportEvent::ConnectError(message.clone()));
                    return Err(TransportError::Handshake(message));
                }
                Frame::Ping => {
                    sink.send(Message::text(packet::PONG.to_string()))
                        .await
                        .map_err(|e| TransportError::Send(e.to_string()))?;
                }
                _ => {}
            }
        };

        tracing::info!(url = %url, sid = ?sid, "Realtime channel connected");
        listener(TransportEvent::Connected);

        let (outbound, mut queue) = mpsc::unbounded_channel::<Message>();
        let closed = Arc::new(AtomicBool::new(false));

        // The sink half is dropped once our Close frame is out; the socket
        // itself stays open until the reader has seen the server's Close.
        tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                let closing = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() || closing {
                    break;
                }
            }
        });

        // Lifecycle events stop once the client starts closing.
        let listener: TransportListener = {
            let closed = closed.clone();
            Arc::new(move |event| {
                if !closed.load(Ordering::Acquire) {
                    listener(event);
                }
            })
        };

        let heartbeat = outbound.clone();
        let reader = tokio::spawn(async move {
            let reason = read_loop(&mut source, &heartbeat, &listener, deadline).await;
            tracing::debug!(reason = %reason, "Realtime channel reader stopped");
            listener(TransportEvent::Disconnected(reason));
        });

        Ok(Arc::new(SocketIoConnection {
            outbound,
            reader: Mutex::new(Some(reader)),
            closed,
        }))
    }
}

async fn next_frame<S>(source: &mut S) -> Result<Frame, TransportError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => return packet::decode(text.as_str()),
            Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::Handshake(e.to_string())),
        }
    }
}

/// Runs until the session ends; returns the reason.
async fn read_loop<S>(
    source: &mut S,
    outbound: &mpsc::UnboundedSender<Message>,
    listener: &TransportListener,
    deadline: Duration,
) -> String
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let next = match tokio::time::timeout(deadline, source.next()).await {
            Ok(next) => next,
            Err(_) => return "ping timeout".to_string(),
        };

        match next {
            Some(Ok(Message::Text(text))) => match packet::decode(text.as_str()) {
                Ok(Frame::Ping) => {
                    // Fails only once our Close is out; keep draining until the server's.
                    let _ = outbound.send(Message::text(packet::PONG.to_string()));
                }
                Ok(Frame::Close) | Ok(Frame::Disconnect) => {
                    return "server disconnect".to_string();
                }
                Ok(Frame::Event { name }) => {
                    tracing::trace!(event = %name, "Ignoring server event");
                }
                Ok(_) => {}
                Err(e) => listener(TransportEvent::Error(e.to_string())),
            },
            Some(Ok(Message::Close(_))) | None => return "transport close".to_string(),
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                listener(TransportEvent::Error(e.to_string()));
                return "transport error".to_string();
            }
        }
    }
}

/// How long `close` waits for the server to answer our Close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// A live Socket.IO session on the default namespace.
pub struct SocketIoConnection {
    outbound: mpsc::UnboundedSender<Message>,
    reader: Mutex<Option<JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl RealtimeConnection for SocketIoConnection {
    async fn emit(&self, event: &str, room: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(Message::text(packet::encode_event(event, room)))
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.outbound.send(Message::text(packet::DISCONNECT.to_string()));
        let _ = self.outbound.send(Message::Close(None));

        let reader = self.reader.lock().take();
        if let Some(mut reader) = reader {
            if tokio::time::timeout(CLOSE_GRACE, &mut reader).await.is_err() {
                tracing::debug!("Server did not answer the close handshake");
                reader.abort();
            }
        }
        tracing::info!("Realtime channel closed");
    }
}

//! Engine.IO v4 / Socket.IO v5 text packet codec (default namespace only).

use std::time::Duration;

use serde::Deserialize;

use campus_core::ports::TransportError;

/// Namespace connect request sent by the client.
pub(crate) const CONNECT: &str = "40";
/// Namespace disconnect.
pub(crate) const DISCONNECT: &str = "41";
/// Engine.IO heartbeat reply.
pub(crate) const PONG: &str = "3";

/// Engine.IO open handshake payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OpenInfo {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl OpenInfo {
    /// Longest silence tolerated before the server counts as gone.
    pub fn heartbeat_deadline(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Frame {
    Open { sid: String, deadline: Duration },
    Close,
    Ping,
    Pong,
    Connect { sid: Option<String> },
    ConnectError(String),
    Disconnect,
    Event { name: String },
    /// Anything this client does not act on (noop, acks, other namespaces).
    Other,
}

pub(crate) fn decode(text: &str) -> Result<Frame, TransportError> {
    let Some(kind) = text.chars().next() else {
        return Err(TransportError::Handshake("empty packet".to_string()));
    };
    let body = &text[kind.len_utf8()..];

    match kind {
        '0' => {
            let info: OpenInfo = serde_json::from_str(body)
                .map_err(|e| TransportError::Handshake(format!("bad open packet: {}", e)))?;
            Ok(Frame::Open {
                deadline: info.heartbeat_deadline(),
                sid: info.sid,
            })
        }
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '4' => decode_message(body),
        _ => Ok(Frame::Other),
    }
}

fn decode_message(body: &str) -> Result<Frame, TransportError> {
    let Some(kind) = body.chars().next() else {
        return Ok(Frame::Other);
    };
    let rest = &body[kind.len_utf8()..];
    if rest.starts_with('/') {
        return Ok(Frame::Other);
    }

    match kind {
        '0' => {
            let sid = serde_json::from_str::<serde_json::Value>(rest)
                .ok()
                .and_then(|v| v.get("sid").and_then(|s| s.as_str()).map(str::to_string));
            Ok(Frame::Connect { sid })
        }
        '1' => Ok(Frame::Disconnect),
        '2' => {
            let payload = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            let name = serde_json::from_str::<serde_json::Value>(payload)
                .ok()
                .and_then(|v| v.get(0).and_then(|n| n.as_str()).map(str::to_string))
                .ok_or_else(|| TransportError::Handshake(format!("bad event packet: {}", body)))?;
            Ok(Frame::Event { name })
        }
        '4' => {
            let message = serde_json::from_str::<serde_json::Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or_else(|| rest.to_string());
            Ok(Frame::ConnectError(message))
        }
        _ => Ok(Frame::Other),
    }
}

/// Encode a client event carrying a single string argument.
pub(crate) fn encode_event(event: &str, arg: &str) -> String {
    format!("42{}", serde_json::json!([event, arg]))
}

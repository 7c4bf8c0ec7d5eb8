//! Realtime event names understood by the backend socket server.

/// Client -> server: join a batch room. Payload is the room id.
pub const JOIN_BATCH: &str = "joinBatch";

/// Client -> server: leave a batch room. Payload is the room id.
pub const LEAVE_BATCH: &str = "leaveBatch";

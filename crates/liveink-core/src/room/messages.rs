//! JSON messages exchanged between a room client and the relay.

use super::{BroadcastEvent, ConnectionId, Peer, PresenceRecord};
use serde::{Deserialize, Serialize};

/// Messages sent to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join { room: String },
    Leave,
    /// Incremental CRDT updates (base64 encoded Loro bytes).
    Sync { data: String },
    /// Full presence of the sender.
    Presence { presence: PresenceRecord },
    Broadcast { event: BroadcastEvent },
}

/// Messages received from the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms a join with the room's current state.
    Joined {
        room: String,
        connection_id: ConnectionId,
        peers: Vec<Peer>,
        /// Storage snapshot, if the room has history.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_sync: Option<String>,
    },
    PeerJoined { connection_id: ConnectionId },
    PeerLeft { connection_id: ConnectionId },
    Sync { from: ConnectionId, data: String },
    Presence {
        from: ConnectionId,
        presence: PresenceRecord,
    },
    Broadcast {
        from: ConnectionId,
        event: BroadcastEvent,
    },
    Error { message: String },
}

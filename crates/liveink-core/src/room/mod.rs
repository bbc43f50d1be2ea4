//! Room backend: shared shape storage, presence and broadcast.
//!
//! [`PresenceChannel`] is everything the session needs from a room. The
//! bundled implementation is [`RoomClient`], a Loro-backed participant that
//! exchanges JSON messages with a [`RoomHub`].

mod client;
mod hub;
mod messages;

pub use client::RoomClient;
pub use hub::RoomHub;
pub use messages::{ClientMessage, ServerMessage};

use crate::shapes::{ObjectId, ShapeRecord};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier the relay assigns to each connection.
pub type ConnectionId = u32;

/// Errors raised by the room backend.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("CRDT error: {0}")]
    Crdt(#[from] loro::LoroError),
    #[error("failed to export CRDT updates: {0}")]
    Export(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("not in a room")]
    NotInRoom,
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
}

/// The replicated `objectId -> record` map.
pub trait SharedShapeMap {
    fn get(&self, id: ObjectId) -> Option<ShapeRecord>;

    /// Upsert a record; visible to `get` immediately.
    fn set(&mut self, id: ObjectId, record: &ShapeRecord) -> Result<(), RoomError>;

    /// Remove a raw key. Returns whether it was present.
    fn delete_key(&mut self, key: &str) -> Result<bool, RoomError>;

    /// Remove a shape. Returns whether it was present.
    fn delete(&mut self, id: ObjectId) -> Result<bool, RoomError> {
        self.delete_key(&id.to_string())
    }

    /// All decodable entries, sorted by key.
    fn entries(&self) -> Vec<(ObjectId, ShapeRecord)>;

    /// Every key in the map, including ones that do not decode as a shape.
    fn keys(&self) -> Vec<String>;

    /// Number of keys, decodable or not.
    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Cursor position in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

impl From<Point> for CursorPosition {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<CursorPosition> for Point {
    fn from(c: CursorPosition) -> Self {
        Point::new(c.x, c.y)
    }
}

/// A participant's ephemeral presence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub cursor: Option<CursorPosition>,
    pub message: Option<String>,
    pub cursor_color: Option<String>,
}

impl PresenceRecord {
    /// Merge a partial update.
    pub fn apply(&mut self, update: PresenceUpdate) {
        if let Some(cursor) = update.cursor {
            self.cursor = cursor;
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if let Some(color) = update.cursor_color {
            self.cursor_color = color;
        }
    }
}

/// Partial presence update. An outer `None` leaves the field unchanged;
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceUpdate {
    pub cursor: Option<Option<CursorPosition>>,
    pub message: Option<Option<String>>,
    pub cursor_color: Option<Option<String>>,
}

impl PresenceUpdate {
    pub fn cursor(mut self, cursor: Option<CursorPosition>) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn message(mut self, message: Option<String>) -> Self {
        self.message = Some(message);
        self
    }

    pub fn cursor_color(mut self, color: Option<String>) -> Self {
        self.cursor_color = Some(color);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.is_none() && self.message.is_none() && self.cursor_color.is_none()
    }
}

/// Another participant in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub connection_id: ConnectionId,
    pub presence: PresenceRecord,
}

/// Fire-and-forget events sent to everyone else in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastEvent {
    Reaction { x: f64, y: f64, value: String },
}

/// Events surfaced by a room to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Joined {
        room: String,
        connection_id: ConnectionId,
        peer_count: usize,
    },
    PeerJoined { connection_id: ConnectionId },
    PeerLeft { connection_id: ConnectionId },
    /// Another participant's presence changed.
    PresenceChanged { connection_id: ConnectionId },
    Broadcast {
        from: ConnectionId,
        event: BroadcastEvent,
    },
    /// The shared shape map changed, locally or remotely.
    StorageChanged,
    Error { message: String },
}

/// What the session needs from a room: presence, broadcast, shared storage
/// and undo/redo of storage mutations.
pub trait PresenceChannel {
    type Storage: SharedShapeMap;

    /// My connection id, once joined.
    fn connection_id(&self) -> Option<ConnectionId>;

    fn presence(&self) -> &PresenceRecord;

    fn update_presence(&mut self, update: PresenceUpdate);

    fn others(&self) -> Vec<Peer>;

    fn broadcast(&mut self, event: BroadcastEvent);

    /// Drain pending room events.
    fn poll_events(&mut self) -> Vec<RoomEvent>;

    fn storage(&self) -> &Self::Storage;

    fn storage_mut(&mut self) -> &mut Self::Storage;

    /// Undo the last local storage mutation.
    fn undo(&mut self) -> bool;

    fn redo(&mut self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_partial_update() {
        let mut presence = PresenceRecord {
            cursor: Some(CursorPosition { x: 1.0, y: 2.0 }),
            message: Some("hi".to_string()),
            cursor_color: None,
        };
        presence.apply(PresenceUpdate::default().message(None));
        assert_eq!(presence.cursor, Some(CursorPosition { x: 1.0, y: 2.0 }));
        assert_eq!(presence.message, None);

        presence.apply(PresenceUpdate::default().cursor(None).cursor_color(Some("#fff".into())));
        assert_eq!(presence.cursor, None);
        assert_eq!(presence.cursor_color.as_deref(), Some("#fff"));
    }

    #[test]
    fn test_presence_wire_names() {
        let presence = PresenceRecord {
            cursor: None,
            message: None,
            cursor_color: Some("#DC2626".to_string()),
        };
        let json = serde_json::to_value(&presence).unwrap();
        assert_eq!(json["cursorColor"], "#DC2626");
        assert!(json["cursor"].is_null());
    }

    #[test]
    fn test_broadcast_wire_format() {
        let event = BroadcastEvent::Reaction {
            x: 4.0,
            y: 5.0,
            value: "🔥".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"reaction""#));
        assert_eq!(serde_json::from_str::<BroadcastEvent>(&json).unwrap(), event);
    }
}

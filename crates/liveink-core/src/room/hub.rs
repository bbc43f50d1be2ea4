//! In-process relay that routes messages between clients of the same room.

use super::{
    ClientMessage, ConnectionId, Peer, PresenceRecord, RoomClient, RoomError, ServerMessage,
};
use crate::crdt::{CrdtDocument, VersionVector};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::collections::{BTreeMap, HashMap};

/// Relay-side state of one room.
#[derive(Default)]
struct RelayRoom {
    peers: BTreeMap<ConnectionId, PresenceRecord>,
    /// Merged storage, used to bring joiners up to date.
    doc: CrdtDocument,
}

impl RelayRoom {
    fn snapshot(&self) -> Result<Option<String>, RoomError> {
        if self.doc.version() == VersionVector::default() {
            return Ok(None);
        }
        Ok(Some(STANDARD.encode(self.doc.export_snapshot()?)))
    }
}

/// Routes client messages to the other members of a room. Nothing is echoed
/// back to the sender.
#[derive(Default)]
pub struct RoomHub {
    rooms: HashMap<String, RelayRoom>,
    memberships: HashMap<ConnectionId, String>,
    outboxes: BTreeMap<ConnectionId, Vec<String>>,
    next_connection: ConnectionId,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection and return its id.
    pub fn connect(&mut self) -> ConnectionId {
        let id = self.next_connection;
        self.next_connection += 1;
        self.outboxes.insert(id, Vec::new());
        id
    }

    /// Close a connection, leaving its room.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        self.leave(connection);
        self.outboxes.remove(&connection);
    }

    pub fn peer_count(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, |r| r.peers.len())
    }

    /// Take messages queued for a connection.
    pub fn take_outgoing(&mut self, connection: ConnectionId) -> Vec<String> {
        self.outboxes
            .get_mut(&connection)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Handle a JSON message from a connection.
    pub fn handle(&mut self, connection: ConnectionId, json: &str) -> Result<(), RoomError> {
        if !self.outboxes.contains_key(&connection) {
            return Err(RoomError::UnknownConnection(connection));
        }
        let msg: ClientMessage = match serde_json::from_str(json) {
            Ok(msg) => msg,
            Err(e) => {
                self.send(
                    connection,
                    &ServerMessage::Error {
                        message: format!("invalid message: {e}"),
                    },
                );
                return Err(e.into());
            }
        };

        match msg {
            ClientMessage::Join { room } => self.join(connection, room)?,
            ClientMessage::Leave => self.leave(connection),
            ClientMessage::Sync { data } => {
                let room = self.room_of(connection)?;
                let bytes = STANDARD.decode(&data)?;
                if let Some(state) = self.rooms.get_mut(&room) {
                    state.doc.import(&bytes)?;
                }
                self.broadcast(&room, connection, &ServerMessage::Sync {
                    from: connection,
                    data,
                });
            }
            ClientMessage::Presence { presence } => {
                let room = self.room_of(connection)?;
                if let Some(state) = self.rooms.get_mut(&room) {
                    state.peers.insert(connection, presence.clone());
                }
                self.broadcast(&room, connection, &ServerMessage::Presence {
                    from: connection,
                    presence,
                });
            }
            ClientMessage::Broadcast { event } => {
                let room = self.room_of(connection)?;
                self.broadcast(&room, connection, &ServerMessage::Broadcast {
                    from: connection,
                    event,
                });
            }
        }
        Ok(())
    }

    /// Move a client's outgoing messages into the hub, then deliver the
    /// messages waiting for it.
    pub fn exchange(
        &mut self,
        connection: ConnectionId,
        client: &mut RoomClient,
    ) -> Result<(), RoomError> {
        for json in client.take_outgoing() {
            self.handle(connection, &json)?;
        }
        for json in self.take_outgoing(connection) {
            client.handle_message(&json)?;
        }
        Ok(())
    }

    fn join(&mut self, connection: ConnectionId, room: String) -> Result<(), RoomError> {
        if self.memberships.get(&connection) == Some(&room) {
            return Ok(());
        }
        self.leave(connection);

        let state = self.rooms.entry(room.clone()).or_default();
        let peers = state
            .peers
            .iter()
            .map(|(&connection_id, presence)| Peer {
                connection_id,
                presence: presence.clone(),
            })
            .collect();
        let initial_sync = state.snapshot()?;
        state.peers.insert(connection, PresenceRecord::default());
        self.memberships.insert(connection, room.clone());
        log::info!("Connection {connection} joined room {room}");

        self.send(connection, &ServerMessage::Joined {
            room: room.clone(),
            connection_id: connection,
            peers,
            initial_sync,
        });
        self.broadcast(&room, connection, &ServerMessage::PeerJoined {
            connection_id: connection,
        });
        Ok(())
    }

    fn leave(&mut self, connection: ConnectionId) {
        let Some(room) = self.memberships.remove(&connection) else {
            return;
        };
        if let Some(state) = self.rooms.get_mut(&room) {
            state.peers.remove(&connection);
        }
        log::info!("Connection {connection} left room {room}");
        self.broadcast(&room, connection, &ServerMessage::PeerLeft {
            connection_id: connection,
        });
    }

    fn room_of(&self, connection: ConnectionId) -> Result<String, RoomError> {
        self.memberships
            .get(&connection)
            .cloned()
            .ok_or(RoomError::NotInRoom)
    }

    fn send(&mut self, connection: ConnectionId, msg: &ServerMessage) {
        let json = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Failed to encode relay message: {e}");
                return;
            }
        };
        if let Some(outbox) = self.outboxes.get_mut(&connection) {
            outbox.push(json);
        }
    }

    /// Send to every member of `room` except `from`.
    fn broadcast(&mut self, room: &str, from: ConnectionId, msg: &ServerMessage) {
        let targets: Vec<ConnectionId> = self
            .rooms
            .get(room)
            .map(|state| state.peers.keys().copied().filter(|&c| c != from).collect())
            .unwrap_or_default();
        for target in targets {
            self.send(target, msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::room::{BroadcastEvent, PresenceChannel, RoomEvent, SharedShapeMap};
    use crate::shapes::{Rectangle, Shape};
    use kurbo::Point;

    fn joined_client(hub: &mut RoomHub, room: &str) -> (ConnectionId, RoomClient) {
        let connection = hub.connect();
        let mut client = RoomClient::new(&SessionConfig::default());
        client.join_room(room);
        hub.exchange(connection, &mut client).unwrap();
        (connection, client)
    }

    #[test]
    fn test_join_announces_to_existing_peers() {
        let mut hub = RoomHub::new();
        let (a_id, mut a) = joined_client(&mut hub, "r");
        let (b_id, b) = joined_client(&mut hub, "r");
        hub.exchange(a_id, &mut a).unwrap();

        assert_eq!(hub.peer_count("r"), 2);
        assert_eq!(b.connection_id(), Some(b_id));
        assert!(
            a.poll_events()
                .contains(&RoomEvent::PeerJoined { connection_id: b_id })
        );
    }

    #[test]
    fn test_broadcast_skips_sender_and_other_rooms() {
        let mut hub = RoomHub::new();
        let (a_id, mut a) = joined_client(&mut hub, "r");
        let (b_id, mut b) = joined_client(&mut hub, "r");
        let (c_id, mut c) = joined_client(&mut hub, "elsewhere");
        a.poll_events();
        b.poll_events();
        c.poll_events();

        let event = BroadcastEvent::Reaction {
            x: 1.0,
            y: 2.0,
            value: "😍".to_string(),
        };
        a.broadcast(event.clone());
        hub.exchange(a_id, &mut a).unwrap();
        hub.exchange(b_id, &mut b).unwrap();
        hub.exchange(c_id, &mut c).unwrap();

        assert!(a.poll_events().iter().all(|e| !matches!(e, RoomEvent::Broadcast { .. })));
        assert!(b.poll_events().contains(&RoomEvent::Broadcast { from: a_id, event }));
        assert!(c.poll_events().is_empty());
    }

    #[test]
    fn test_late_joiner_receives_snapshot() {
        let mut hub = RoomHub::new();
        let (a_id, mut a) = joined_client(&mut hub, "r");
        let record = Shape::Rectangle(Rectangle::new(Point::new(1.0, 2.0), 3.0, 4.0))
            .to_record()
            .unwrap();
        a.storage_mut().set(record.object_id, &record).unwrap();
        hub.exchange(a_id, &mut a).unwrap();

        let (_, b) = joined_client(&mut hub, "r");
        assert_eq!(b.storage().get(record.object_id), Some(record));
    }

    #[test]
    fn test_disconnect_notifies_peers() {
        let mut hub = RoomHub::new();
        let (a_id, mut a) = joined_client(&mut hub, "r");
        let (b_id, _b) = joined_client(&mut hub, "r");
        hub.disconnect(b_id);
        hub.exchange(a_id, &mut a).unwrap();

        assert_eq!(hub.peer_count("r"), 1);
        assert!(a.poll_events().contains(&RoomEvent::PeerLeft { connection_id: b_id }));
        assert!(a.others().is_empty());
    }

    #[test]
    fn test_messages_before_join_are_rejected() {
        let mut hub = RoomHub::new();
        let connection = hub.connect();
        let msg = serde_json::to_string(&ClientMessage::Sync {
            data: String::new(),
        })
        .unwrap();
        assert!(matches!(hub.handle(connection, &msg), Err(RoomError::NotInRoom)));
        assert!(matches!(
            hub.handle(99, &msg),
            Err(RoomError::UnknownConnection(99))
        ));
    }
}

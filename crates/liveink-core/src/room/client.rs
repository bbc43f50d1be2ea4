//! A room participant backed by a local CRDT replica.

use super::{
    BroadcastEvent, ClientMessage, ConnectionId, Peer, PresenceChannel, PresenceRecord,
    PresenceUpdate, RoomError, RoomEvent, ServerMessage,
};
use crate::config::SessionConfig;
use crate::crdt::{CrdtDocument, VersionVector};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::collections::BTreeMap;

/// Client side of a room.
///
/// Storage writes land in the local replica immediately and are shipped as
/// incremental updates the next time outgoing messages are taken. Incoming
/// messages are applied with [`RoomClient::handle_message`].
pub struct RoomClient {
    crdt: CrdtDocument,
    room: Option<String>,
    connection_id: Option<ConnectionId>,
    presence: PresenceRecord,
    others: BTreeMap<ConnectionId, PresenceRecord>,
    events: Vec<RoomEvent>,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
    /// Version the relay is known to have.
    last_synced: VersionVector,
    /// Version at the last `StorageChanged` check.
    last_observed: VersionVector,
}

impl RoomClient {
    pub fn new(config: &SessionConfig) -> Self {
        let crdt = CrdtDocument::with_undo(config.undo_max_steps, config.undo_merge_interval_ms);
        let version = crdt.version();
        Self {
            crdt,
            room: None,
            connection_id: None,
            presence: PresenceRecord::default(),
            others: BTreeMap::new(),
            events: Vec::new(),
            outgoing: Vec::new(),
            last_synced: version.clone(),
            last_observed: version,
        }
    }

    pub fn crdt(&self) -> &CrdtDocument {
        &self.crdt
    }

    pub fn current_room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn is_in_room(&self) -> bool {
        self.room.is_some()
    }

    /// Request to join a room. Queues the join message.
    pub fn join_room(&mut self, room: &str) {
        self.queue(&ClientMessage::Join {
            room: room.to_string(),
        });
    }

    /// Leave the current room.
    pub fn leave_room(&mut self) {
        if self.room.take().is_some() {
            self.queue(&ClientMessage::Leave);
            self.connection_id = None;
            self.others.clear();
            log::info!("Left room");
        }
    }

    /// Take pending outgoing messages, including unsent storage updates.
    pub fn take_outgoing(&mut self) -> Vec<String> {
        if let Err(e) = self.flush_updates() {
            log::warn!("Failed to export storage updates: {e}");
        }
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty() || (self.is_in_room() && self.crdt.version() != self.last_synced)
    }

    fn queue(&mut self, msg: &ClientMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::warn!("Failed to encode message: {e}"),
        }
    }

    /// Queue local operations the relay has not seen yet.
    fn flush_updates(&mut self) -> Result<(), RoomError> {
        if !self.is_in_room() {
            return Ok(());
        }
        let version = self.crdt.version();
        if version == self.last_synced {
            return Ok(());
        }
        let bytes = self.crdt.export_updates(&self.last_synced)?;
        self.queue(&ClientMessage::Sync {
            data: STANDARD.encode(bytes),
        });
        self.last_synced = version;
        Ok(())
    }

    /// Import remote bytes. Local operations are flushed first so the synced
    /// version can advance past the remote ones without re-exporting them.
    fn import_remote(&mut self, bytes: &[u8]) -> Result<(), RoomError> {
        self.flush_updates()?;
        self.crdt.import(bytes)?;
        if self.is_in_room() {
            self.last_synced = self.crdt.version();
        }
        Ok(())
    }

    /// Handle an incoming relay message.
    pub fn handle_message(&mut self, json: &str) -> Result<(), RoomError> {
        let msg: ServerMessage = serde_json::from_str(json)?;
        match msg {
            ServerMessage::Joined {
                room,
                connection_id,
                peers,
                initial_sync,
            } => {
                log::info!("Joined room {room} as connection {connection_id}");
                self.room = Some(room.clone());
                self.connection_id = Some(connection_id);
                self.others = peers
                    .into_iter()
                    .map(|peer| (peer.connection_id, peer.presence))
                    .collect();
                if let Some(data) = initial_sync {
                    let bytes = STANDARD.decode(data)?;
                    self.import_remote(&bytes)?;
                }
                // Announce presence set before the join completed.
                if self.presence != PresenceRecord::default() {
                    let presence = self.presence.clone();
                    self.queue(&ClientMessage::Presence { presence });
                }
                self.events.push(RoomEvent::Joined {
                    room,
                    connection_id,
                    peer_count: self.others.len() + 1,
                });
            }
            ServerMessage::PeerJoined { connection_id } => {
                log::info!("Peer {connection_id} joined");
                self.others.entry(connection_id).or_default();
                self.events.push(RoomEvent::PeerJoined { connection_id });
                // Newcomers only see presence that is sent after they arrive.
                if self.presence != PresenceRecord::default() {
                    let presence = self.presence.clone();
                    self.queue(&ClientMessage::Presence { presence });
                }
            }
            ServerMessage::PeerLeft { connection_id } => {
                log::info!("Peer {connection_id} left");
                self.others.remove(&connection_id);
                self.events.push(RoomEvent::PeerLeft { connection_id });
            }
            ServerMessage::Sync { from, data } => {
                let bytes = STANDARD.decode(data)?;
                self.import_remote(&bytes)?;
                log::debug!("Imported {} bytes of updates from {from}", bytes.len());
            }
            ServerMessage::Presence { from, presence } => {
                self.others.insert(from, presence);
                self.events.push(RoomEvent::PresenceChanged {
                    connection_id: from,
                });
            }
            ServerMessage::Broadcast { from, event } => {
                self.events.push(RoomEvent::Broadcast { from, event });
            }
            ServerMessage::Error { message } => {
                log::warn!("Relay error: {message}");
                self.events.push(RoomEvent::Error { message });
            }
        }
        Ok(())
    }
}

impl PresenceChannel for RoomClient {
    type Storage = CrdtDocument;

    fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    fn presence(&self) -> &PresenceRecord {
        &self.presence
    }

    fn update_presence(&mut self, update: PresenceUpdate) {
        if update.is_empty() {
            return;
        }
        self.presence.apply(update);
        if self.is_in_room() {
            let presence = self.presence.clone();
            self.queue(&ClientMessage::Presence { presence });
        }
    }

    fn others(&self) -> Vec<Peer> {
        self.others
            .iter()
            .map(|(&connection_id, presence)| Peer {
                connection_id,
                presence: presence.clone(),
            })
            .collect()
    }

    fn broadcast(&mut self, event: BroadcastEvent) {
        // Broadcasts are not buffered across joins.
        if self.is_in_room() {
            self.queue(&ClientMessage::Broadcast { event });
        }
    }

    fn poll_events(&mut self) -> Vec<RoomEvent> {
        let version = self.crdt.version();
        if version != self.last_observed {
            self.last_observed = version;
            self.events.push(RoomEvent::StorageChanged);
        }
        std::mem::take(&mut self.events)
    }

    fn storage(&self) -> &CrdtDocument {
        &self.crdt
    }

    fn storage_mut(&mut self) -> &mut CrdtDocument {
        &mut self.crdt
    }

    fn undo(&mut self) -> bool {
        self.crdt.can_undo() && self.crdt.undo()
    }

    fn redo(&mut self) -> bool {
        self.crdt.can_redo() && self.crdt.redo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::{CursorPosition, SharedShapeMap};
    use crate::shapes::{Rectangle, Shape};
    use kurbo::Point;

    fn joined(client: &mut RoomClient, connection_id: ConnectionId) {
        let msg = ServerMessage::Joined {
            room: "r".to_string(),
            connection_id,
            peers: Vec::new(),
            initial_sync: None,
        };
        client
            .handle_message(&serde_json::to_string(&msg).unwrap())
            .unwrap();
    }

    fn parse(json: &str) -> ClientMessage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_join_queues_message() {
        let mut client = RoomClient::new(&SessionConfig::default());
        client.join_room("r");
        let out = client.take_outgoing();
        assert_eq!(out.len(), 1);
        assert_eq!(
            parse(&out[0]),
            ClientMessage::Join {
                room: "r".to_string()
            }
        );
    }

    #[test]
    fn test_presence_before_join_is_sent_on_join() {
        let mut client = RoomClient::new(&SessionConfig::default());
        client.update_presence(
            PresenceUpdate::default().cursor(Some(CursorPosition { x: 1.0, y: 1.0 })),
        );
        assert!(client.take_outgoing().is_empty());

        joined(&mut client, 1);
        let out = client.take_outgoing();
        assert!(matches!(parse(&out[0]), ClientMessage::Presence { .. }));
        assert_eq!(
            client.poll_events(),
            vec![RoomEvent::Joined {
                room: "r".to_string(),
                connection_id: 1,
                peer_count: 1
            }]
        );
    }

    #[test]
    fn test_local_write_flushes_once_and_reports_change() {
        let mut client = RoomClient::new(&SessionConfig::default());
        joined(&mut client, 1);
        client.poll_events();

        let record = Shape::Rectangle(Rectangle::new(Point::ZERO, 10.0, 10.0))
            .to_record()
            .unwrap();
        client.storage_mut().set(record.object_id, &record).unwrap();
        assert!(client.has_outgoing());

        let out = client.take_outgoing();
        assert_eq!(out.len(), 1);
        assert!(matches!(parse(&out[0]), ClientMessage::Sync { .. }));
        assert!(client.take_outgoing().is_empty());
        assert_eq!(client.poll_events(), vec![RoomEvent::StorageChanged]);
        assert!(client.poll_events().is_empty());
    }

    #[test]
    fn test_remote_updates_are_not_echoed() {
        let config = SessionConfig::default();
        let mut a = RoomClient::new(&config);
        let mut b = RoomClient::new(&config);
        joined(&mut a, 1);
        joined(&mut b, 2);

        let record = Shape::Rectangle(Rectangle::new(Point::ZERO, 10.0, 10.0))
            .to_record()
            .unwrap();
        a.storage_mut().set(record.object_id, &record).unwrap();
        let ClientMessage::Sync { data } = parse(&a.take_outgoing()[0]) else {
            panic!("expected sync");
        };

        let relayed = ServerMessage::Sync { from: 1, data };
        b.handle_message(&serde_json::to_string(&relayed).unwrap())
            .unwrap();
        assert_eq!(b.storage().get(record.object_id), Some(record));
        assert!(b.take_outgoing().is_empty());
        assert!(b.poll_events().contains(&RoomEvent::StorageChanged));
    }

    #[test]
    fn test_broadcast_outside_room_is_dropped() {
        let mut client = RoomClient::new(&SessionConfig::default());
        client.broadcast(BroadcastEvent::Reaction {
            x: 0.0,
            y: 0.0,
            value: "👍".to_string(),
        });
        assert!(client.take_outgoing().is_empty());
    }

    #[test]
    fn test_peer_tracking() {
        let mut client = RoomClient::new(&SessionConfig::default());
        joined(&mut client, 1);
        let presence = PresenceRecord {
            cursor: Some(CursorPosition { x: 3.0, y: 4.0 }),
            ..PresenceRecord::default()
        };
        for msg in [
            ServerMessage::PeerJoined { connection_id: 7 },
            ServerMessage::Presence {
                from: 7,
                presence: presence.clone(),
            },
        ] {
            client
                .handle_message(&serde_json::to_string(&msg).unwrap())
                .unwrap();
        }
        assert_eq!(
            client.others(),
            vec![Peer {
                connection_id: 7,
                presence
            }]
        );

        let left = ServerMessage::PeerLeft { connection_id: 7 };
        client
            .handle_message(&serde_json::to_string(&left).unwrap())
            .unwrap();
        assert!(client.others().is_empty());
    }

    #[test]
    fn test_malformed_message_is_an_error() {
        let mut client = RoomClient::new(&SessionConfig::default());
        assert!(matches!(
            client.handle_message("{not json"),
            Err(RoomError::Json(_))
        ));
    }
}

//! Ephemeral collaboration: cursor chat, reactions and the live overlay.
//!
//! Nothing here touches shared storage. Cursor and chat text travel as
//! presence, reactions as broadcast events, and both expire on their own.

mod timer;

pub use timer::Interval;

use crate::config::SessionConfig;
use crate::input::{Action, Key, Modifiers, ShortcutRegistry};
use crate::room::{
    BroadcastEvent, ConnectionId, CursorPosition, PresenceChannel, PresenceUpdate,
};
use kurbo::Point;
use serde::Serialize;

/// Colors for peers that did not publish their own.
pub const CURSOR_COLORS: &[&str] = &["#DC2626", "#D97706", "#059669", "#7C3AED", "#DB2777"];

/// Emoji offered by the reaction selector.
pub const REACTIONS: &[&str] = &["👍", "🔥", "😍", "👀", "😱", "🙁"];

/// Palette color for a connection.
pub fn cursor_color(connection_id: ConnectionId) -> &'static str {
    CURSOR_COLORS[connection_id as usize % CURSOR_COLORS.len()]
}

/// What my own cursor is doing. Exactly one mode is active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CursorState {
    #[default]
    Hidden,
    Chat {
        message: String,
        previous_message: Option<String>,
    },
    ReactionSelector,
    Reaction {
        value: String,
        is_pressed: bool,
    },
}

/// A reaction on screen, local or received.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub point: Point,
    pub value: String,
    /// Local time the reaction was recorded.
    pub timestamp: u64,
}

/// Cursor chat and reaction state machine.
#[derive(Debug, Clone)]
pub struct LiveEngine {
    state: CursorState,
    reactions: Vec<Reaction>,
    reaction_ttl_ms: u64,
    chat_max_len: usize,
    prune_timer: Interval,
    reaction_timer: Interval,
}

impl LiveEngine {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            state: CursorState::Hidden,
            reactions: Vec::new(),
            reaction_ttl_ms: config.reaction_ttl_ms,
            chat_max_len: config.chat_max_len,
            prune_timer: Interval::new(config.prune_interval_ms),
            reaction_timer: Interval::new(config.reaction_interval_ms),
        }
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Every reaction still held, expired or not.
    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    /// Reactions visible at `now`.
    pub fn reactions_at(&self, now: u64) -> impl Iterator<Item = &Reaction> {
        let ttl = self.reaction_ttl_ms;
        self.reactions
            .iter()
            .filter(move |r| now.saturating_sub(r.timestamp) <= ttl)
    }

    /// Start the prune and reaction timers.
    pub fn start(&mut self, now: u64) {
        self.prune_timer.start(now);
        self.reaction_timer.start(now);
    }

    pub fn stop(&mut self) {
        self.prune_timer.cancel();
        self.reaction_timer.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.prune_timer.is_active() || self.reaction_timer.is_active()
    }

    pub fn start_chat(&mut self) {
        self.state = CursorState::Chat {
            message: String::new(),
            previous_message: None,
        };
    }

    pub fn open_reactions(&mut self) {
        self.state = CursorState::ReactionSelector;
    }

    /// An emoji was picked from the selector.
    pub fn select_reaction(&mut self, value: &str) {
        self.state = CursorState::Reaction {
            value: value.to_string(),
            is_pressed: false,
        };
    }

    /// Close chat or reactions and withdraw the chat message.
    pub fn hide<R: PresenceChannel + ?Sized>(&mut self, room: &mut R) {
        room.update_presence(PresenceUpdate::default().message(None));
        self.state = CursorState::Hidden;
    }

    /// Handle a released key. Returns whether the key was consumed.
    ///
    /// While chatting every key is text input except `Enter` (commit) and
    /// `Escape` (close).
    pub fn key_up<R: PresenceChannel + ?Sized>(
        &mut self,
        room: &mut R,
        key: Key,
        modifiers: Modifiers,
    ) -> bool {
        if matches!(self.state, CursorState::Chat { .. }) {
            if key == Key::Escape {
                self.hide(room);
            } else {
                self.chat_input(room, key);
            }
            return true;
        }
        match ShortcutRegistry::lookup(key, modifiers) {
            Some(Action::OpenChat) => self.start_chat(),
            Some(Action::OpenReactions) => self.open_reactions(),
            Some(Action::HideCursor) => self.hide(room),
            _ => return false,
        }
        true
    }

    fn chat_input<R: PresenceChannel + ?Sized>(&mut self, room: &mut R, key: Key) {
        let CursorState::Chat {
            message,
            previous_message,
        } = &mut self.state
        else {
            return;
        };
        match key {
            Key::Enter => {
                let committed = std::mem::take(message);
                *previous_message = (!committed.is_empty()).then_some(committed);
                return;
            }
            Key::Backspace => {
                if message.pop().is_none() {
                    return;
                }
            }
            Key::Char(c) => {
                if message.chars().count() >= self.chat_max_len {
                    return;
                }
                message.push(c);
            }
            Key::Escape | Key::Delete => return,
        }
        *previous_message = None;
        room.update_presence(PresenceUpdate::default().message(Some(message.clone())));
    }

    pub fn pointer_move<R: PresenceChannel + ?Sized>(&mut self, room: &mut R, point: Point) {
        // The selector stays anchored where it was opened.
        if room.presence().cursor.is_some() && self.state == CursorState::ReactionSelector {
            return;
        }
        room.update_presence(PresenceUpdate::default().cursor(Some(point.into())));
    }

    pub fn pointer_leave<R: PresenceChannel + ?Sized>(&mut self, room: &mut R) {
        self.state = CursorState::Hidden;
        room.update_presence(PresenceUpdate::default().cursor(None).message(None));
    }

    pub fn pointer_down<R: PresenceChannel + ?Sized>(&mut self, room: &mut R, point: Point) {
        if let CursorState::Reaction { is_pressed, .. } = &mut self.state {
            *is_pressed = true;
        }
        room.update_presence(PresenceUpdate::default().cursor(Some(point.into())));
    }

    pub fn pointer_up(&mut self) {
        if let CursorState::Reaction { is_pressed, .. } = &mut self.state {
            *is_pressed = false;
        }
    }

    /// Record a reaction received from a peer, stamped with local time.
    pub fn on_broadcast(&mut self, event: BroadcastEvent, now: u64) {
        match event {
            BroadcastEvent::Reaction { x, y, value } => {
                self.reactions.push(Reaction {
                    point: Point::new(x, y),
                    value,
                    timestamp: now,
                });
            }
        }
    }

    /// Advance both timers to `now`. Each fires at most once per call.
    pub fn tick<R: PresenceChannel + ?Sized>(&mut self, room: &mut R, now: u64) {
        if self.reaction_timer.due(now) {
            self.emit_reaction(room, now);
        }
        if self.prune_timer.due(now) {
            self.prune(now);
        }
    }

    fn emit_reaction<R: PresenceChannel + ?Sized>(&mut self, room: &mut R, now: u64) {
        let CursorState::Reaction {
            value,
            is_pressed: true,
        } = &self.state
        else {
            return;
        };
        let Some(cursor) = room.presence().cursor else {
            return;
        };
        self.reactions.push(Reaction {
            point: cursor.into(),
            value: value.clone(),
            timestamp: now,
        });
        room.broadcast(BroadcastEvent::Reaction {
            x: cursor.x,
            y: cursor.y,
            value: value.clone(),
        });
    }

    fn prune(&mut self, now: u64) {
        let ttl = self.reaction_ttl_ms;
        let before = self.reactions.len();
        self.reactions
            .retain(|r| now.saturating_sub(r.timestamp) <= ttl);
        let pruned = before - self.reactions.len();
        if pruned > 0 {
            log::debug!("Pruned {pruned} reactions");
        }
    }

    /// Build the overlay frame for `now`.
    pub fn overlay<R: PresenceChannel + ?Sized>(&self, room: &R, now: u64) -> Overlay {
        let cursors = room
            .others()
            .into_iter()
            .filter_map(|peer| {
                let position = peer.presence.cursor?;
                Some(RemoteCursor {
                    connection_id: peer.connection_id,
                    position: position.into(),
                    color: peer
                        .presence
                        .cursor_color
                        .unwrap_or_else(|| cursor_color(peer.connection_id).to_string()),
                    message: peer.presence.message,
                })
            })
            .collect();

        let my_cursor: Option<CursorPosition> = room.presence().cursor;
        let chat = match (&self.state, my_cursor) {
            (
                CursorState::Chat {
                    message,
                    previous_message,
                },
                Some(cursor),
            ) => Some(ChatBubble {
                position: cursor.into(),
                message: message.clone(),
                previous_message: previous_message.clone(),
            }),
            _ => None,
        };
        let armed_reaction = match (&self.state, my_cursor) {
            (CursorState::Reaction { value, .. }, Some(_)) => Some(value.clone()),
            _ => None,
        };

        Overlay {
            cursors,
            chat,
            reaction_selector: my_cursor.is_some()
                && self.state == CursorState::ReactionSelector,
            armed_reaction,
            reactions: self
                .reactions_at(now)
                .map(|r| LiveReaction {
                    position: r.point,
                    value: r.value.clone(),
                    age_ms: now.saturating_sub(r.timestamp),
                })
                .collect(),
        }
    }
}

/// Everything drawn above the canvas for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub cursors: Vec<RemoteCursor>,
    pub chat: Option<ChatBubble>,
    pub reaction_selector: bool,
    pub armed_reaction: Option<String>,
    pub reactions: Vec<LiveReaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteCursor {
    pub connection_id: ConnectionId,
    pub position: Point,
    pub color: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatBubble {
    pub position: Point,
    pub message: String,
    pub previous_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveReaction {
    pub position: Point,
    pub value: String,
    pub age_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::{ClientMessage, PresenceRecord, RoomClient, ServerMessage};

    fn engine() -> LiveEngine {
        LiveEngine::new(&SessionConfig::default())
    }

    fn joined_client() -> RoomClient {
        let mut client = RoomClient::new(&SessionConfig::default());
        let msg = ServerMessage::Joined {
            room: "r".to_string(),
            connection_id: 1,
            peers: Vec::new(),
            initial_sync: None,
        };
        client
            .handle_message(&serde_json::to_string(&msg).unwrap())
            .unwrap();
        client.take_outgoing();
        client
    }

    fn broadcasts(client: &mut RoomClient) -> usize {
        client
            .take_outgoing()
            .iter()
            .filter(|json| {
                matches!(
                    serde_json::from_str::<ClientMessage>(json).unwrap(),
                    ClientMessage::Broadcast { .. }
                )
            })
            .count()
    }

    fn type_text(live: &mut LiveEngine, room: &mut RoomClient, text: &str) {
        for c in text.chars() {
            live.key_up(room, Key::Char(c), Modifiers::NONE);
        }
    }

    #[test]
    fn test_slash_opens_chat_and_typing_streams_presence() {
        let mut live = engine();
        let mut room = joined_client();
        assert!(live.key_up(&mut room, Key::Char('/'), Modifiers::NONE));
        assert_eq!(
            live.state(),
            &CursorState::Chat {
                message: String::new(),
                previous_message: None
            }
        );

        type_text(&mut live, &mut room, "hi");
        assert_eq!(room.presence().message.as_deref(), Some("hi"));
        // One presence message per keystroke.
        assert_eq!(room.take_outgoing().len(), 2);
    }

    #[test]
    fn test_enter_commits_message() {
        let mut live = engine();
        let mut room = joined_client();
        live.start_chat();
        type_text(&mut live, &mut room, "hello");
        live.key_up(&mut room, Key::Enter, Modifiers::NONE);
        assert_eq!(
            live.state(),
            &CursorState::Chat {
                message: String::new(),
                previous_message: Some("hello".to_string())
            }
        );
        assert_eq!(room.presence().message.as_deref(), Some("hello"));

        // Typing again replaces the committed line.
        type_text(&mut live, &mut room, "x");
        assert_eq!(
            live.state(),
            &CursorState::Chat {
                message: "x".to_string(),
                previous_message: None
            }
        );
    }

    #[test]
    fn test_shortcut_keys_are_text_while_chatting() {
        let mut live = engine();
        let mut room = joined_client();
        live.start_chat();
        type_text(&mut live, &mut room, "e/");
        assert!(live.key_up(&mut room, Key::Delete, Modifiers::NONE));
        assert_eq!(room.presence().message.as_deref(), Some("e/"));
        live.key_up(&mut room, Key::Backspace, Modifiers::NONE);
        assert_eq!(room.presence().message.as_deref(), Some("e"));
    }

    #[test]
    fn test_chat_is_capped() {
        let mut live = engine();
        let mut room = joined_client();
        live.start_chat();
        type_text(&mut live, &mut room, &"a".repeat(60));
        let CursorState::Chat { message, .. } = live.state() else {
            panic!("not chatting");
        };
        assert_eq!(message.chars().count(), 50);
    }

    #[test]
    fn test_escape_hides_and_clears_message() {
        let mut live = engine();
        let mut room = joined_client();
        live.start_chat();
        type_text(&mut live, &mut room, "bye");
        assert!(live.key_up(&mut room, Key::Escape, Modifiers::NONE));
        assert_eq!(live.state(), &CursorState::Hidden);
        assert_eq!(room.presence().message, None);
    }

    #[test]
    fn test_e_opens_selector_and_pick_arms_reaction() {
        let mut live = engine();
        let mut room = joined_client();
        assert!(live.key_up(&mut room, Key::Char('e'), Modifiers::NONE));
        assert_eq!(live.state(), &CursorState::ReactionSelector);
        live.select_reaction("🔥");
        assert_eq!(
            live.state(),
            &CursorState::Reaction {
                value: "🔥".to_string(),
                is_pressed: false
            }
        );
        assert!(!live.key_up(&mut room, Key::Char('q'), Modifiers::NONE));
        assert!(!live.key_up(&mut room, Key::Char('e'), Modifiers::CTRL));
    }

    #[test]
    fn test_selector_pins_cursor() {
        let mut live = engine();
        let mut room = joined_client();
        live.pointer_move(&mut room, Point::new(5.0, 5.0));
        live.open_reactions();
        live.pointer_move(&mut room, Point::new(50.0, 50.0));
        assert_eq!(room.presence().cursor, Some(CursorPosition { x: 5.0, y: 5.0 }));
    }

    #[test]
    fn test_pointer_leave_clears_presence() {
        let mut live = engine();
        let mut room = joined_client();
        live.pointer_move(&mut room, Point::new(5.0, 5.0));
        live.start_chat();
        type_text(&mut live, &mut room, "yo");
        live.pointer_leave(&mut room);
        assert_eq!(live.state(), &CursorState::Hidden);
        assert_eq!(room.presence(), &PresenceRecord::default());
    }

    #[test]
    fn test_pressed_reaction_emits_every_interval() {
        let mut live = engine();
        let mut room = joined_client();
        live.start(0);
        live.select_reaction("👍");
        live.pointer_down(&mut room, Point::new(10.0, 20.0));
        room.take_outgoing();

        for now in [100, 200, 350] {
            live.tick(&mut room, now);
        }
        assert_eq!(live.reactions().len(), 3);
        assert_eq!(broadcasts(&mut room), 3);
        assert_eq!(live.reactions()[0].point, Point::new(10.0, 20.0));
        assert_eq!(live.reactions()[0].timestamp, 100);

        live.pointer_up();
        live.tick(&mut room, 1000);
        assert_eq!(live.reactions().len(), 3);
        assert_eq!(broadcasts(&mut room), 0);
    }

    #[test]
    fn test_late_tick_emits_a_single_reaction() {
        let mut live = engine();
        let mut room = joined_client();
        live.start(0);
        live.select_reaction("🔥");
        live.pointer_down(&mut room, Point::new(10.0, 20.0));
        room.take_outgoing();

        live.tick(&mut room, 10_000);
        assert_eq!(broadcasts(&mut room), 1);
        assert_eq!(live.reactions().len(), 1);
        assert_eq!(live.reactions()[0].timestamp, 10_000);
        assert_eq!(live.reactions_at(10_000).count(), 1);
    }

    #[test]
    fn test_no_reaction_without_cursor() {
        let mut live = engine();
        let mut room = joined_client();
        live.start(0);
        live.select_reaction("👍");
        live.pointer_down(&mut room, Point::new(1.0, 1.0));
        live.pointer_leave(&mut room);
        // Leaving resets the mode; re-arm without a cursor.
        live.select_reaction("👍");
        if let CursorState::Reaction { is_pressed, .. } = &mut live.state {
            *is_pressed = true;
        }
        live.tick(&mut room, 500);
        assert!(live.reactions().is_empty());
    }

    #[test]
    fn test_reaction_expires_after_ttl() {
        let mut live = engine();
        let mut room = joined_client();
        live.start(0);
        live.on_broadcast(
            BroadcastEvent::Reaction {
                x: 1.0,
                y: 2.0,
                value: "😍".to_string(),
            },
            1000,
        );
        assert_eq!(live.reactions_at(1000 + 3999).count(), 1);
        assert_eq!(live.reactions_at(1000 + 4001).count(), 0);

        live.tick(&mut room, 5000);
        assert_eq!(live.reactions().len(), 1);
        live.tick(&mut room, 6000);
        assert!(live.reactions().is_empty());
    }

    #[test]
    fn test_stop_cancels_timers() {
        let mut live = engine();
        let mut room = joined_client();
        live.start(0);
        assert!(live.is_running());
        live.select_reaction("👍");
        live.pointer_down(&mut room, Point::new(1.0, 1.0));
        live.stop();
        live.tick(&mut room, 1000);
        assert!(!live.is_running());
        assert!(live.reactions().is_empty());
    }

    #[test]
    fn test_overlay_uses_palette_fallback() {
        let mut live = engine();
        let mut room = joined_client();
        let peer = |from, color: Option<&str>| ServerMessage::Presence {
            from,
            presence: PresenceRecord {
                cursor: Some(CursorPosition { x: 3.0, y: 4.0 }),
                message: Some("hey".to_string()),
                cursor_color: color.map(str::to_string),
            },
        };
        for msg in [peer(7, None), peer(8, Some("#000000"))] {
            room.handle_message(&serde_json::to_string(&msg).unwrap())
                .unwrap();
        }
        live.pointer_move(&mut room, Point::new(9.0, 9.0));
        live.start_chat();

        let overlay = live.overlay(&room, 0);
        assert_eq!(overlay.cursors.len(), 2);
        assert_eq!(overlay.cursors[0].color, CURSOR_COLORS[7 % CURSOR_COLORS.len()]);
        assert_eq!(overlay.cursors[1].color, "#000000");
        assert_eq!(overlay.cursors[0].message.as_deref(), Some("hey"));
        let chat = overlay.chat.unwrap();
        assert_eq!(chat.position, Point::new(9.0, 9.0));
        assert!(!overlay.reaction_selector);
    }
}

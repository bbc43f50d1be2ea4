//! A whiteboard session: one participant's scene, room and UI state.
//!
//! The session owns every piece of per-user state and routes events between
//! them. The host feeds it pointer and keyboard input plus the current time;
//! everything else happens in [`Session::pump`].

use crate::config::SessionConfig;
use crate::drawing::{DrawingMachine, Tool};
use crate::input::{Action, ContextMenuItem, Key, Modifiers, ShortcutRegistry};
use crate::live::{CursorState, LiveEngine, Overlay};
use crate::panel::AttributePanel;
use crate::room::{BroadcastEvent, PresenceChannel, RoomClient, RoomEvent};
use crate::scene::{Scene, SceneAdapter, SceneEvent, SceneEventKind};
use crate::shapes::{AttributeKey, Image, ImageFormat, ObjectId, Shape, ShapeStyle};
use crate::sync::{
    delete_all_shapes, delete_shape_from_storage, render_canvas, sync_shape_in_storage,
};
use kurbo::{Affine, Point};

pub struct Session {
    config: SessionConfig,
    scene: Scene,
    room: RoomClient,
    drawing: DrawingMachine,
    live: LiveEngine,
    panel: AttributePanel,
    /// Object the user last worked on. Survives replays.
    active_ref: Option<ObjectId>,
    clipboard: Vec<Shape>,
    /// Broadcasts received since the last tick, stamped when it runs.
    inbox: Vec<BroadcastEvent>,
    torn_down: bool,
}

impl Session {
    /// Create a session, subscribe to scene events, request the room and
    /// start the timers.
    pub fn new(config: SessionConfig, now_ms: u64) -> Self {
        let mut scene = Scene::new(config.canvas_width, config.canvas_height);
        for &kind in SceneEventKind::all() {
            scene.on(kind);
        }
        let mut room = RoomClient::new(&config);
        room.join_room(&config.room_id);
        let drawing = DrawingMachine::new(
            config.default_color,
            ShapeStyle::stroked(config.brush_color, config.brush_width),
        );
        let mut live = LiveEngine::new(&config);
        live.start(now_ms);

        Self {
            scene,
            room,
            drawing,
            live,
            panel: AttributePanel::new(),
            active_ref: None,
            clipboard: Vec::new(),
            inbox: Vec::new(),
            torn_down: false,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn room(&self) -> &RoomClient {
        &self.room
    }

    /// The room client, for exchanging messages with the relay.
    pub fn room_mut(&mut self) -> &mut RoomClient {
        &mut self.room
    }

    pub fn drawing(&self) -> &DrawingMachine {
        &self.drawing
    }

    pub fn live(&self) -> &LiveEngine {
        &self.live
    }

    pub fn panel(&self) -> &AttributePanel {
        &self.panel
    }

    pub fn active_ref(&self) -> Option<ObjectId> {
        self.active_ref
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn overlay(&self, now_ms: u64) -> Overlay {
        self.live.overlay(&self.room, now_ms)
    }

    // --- Pointer ---

    pub fn pointer_down(&mut self, point: Point) {
        self.live.pointer_down(&mut self.room, point);
        self.scene.pointer_down(point);
        self.pump();
    }

    pub fn pointer_move(&mut self, point: Point) {
        self.live.pointer_move(&mut self.room, point);
        self.scene.pointer_move(point);
        self.pump();
    }

    pub fn pointer_up(&mut self, point: Point) {
        self.live.pointer_up();
        self.scene.pointer_up(point);
        self.pump();
    }

    pub fn pointer_leave(&mut self) {
        self.live.pointer_leave(&mut self.room);
    }

    /// Drag of a scale handle on the active object. The next pointer-up
    /// commits it.
    pub fn scale_active(&mut self, sx: f64, sy: f64) -> bool {
        let scaled = self.scene.scale_active(sx, sy);
        self.pump();
        scaled
    }

    /// Select an object as a click with the select tool would.
    pub fn select(&mut self, id: Option<ObjectId>) {
        self.scene.set_active_object(id);
        self.pump();
    }

    // --- Keyboard ---

    /// Key pressed. Returns whether it triggered a canvas shortcut.
    pub fn key_down(&mut self, key: Key, modifiers: Modifiers) -> bool {
        // The chat input swallows keys.
        if self.torn_down || matches!(self.live.state(), CursorState::Chat { .. }) {
            return false;
        }
        let handled = match ShortcutRegistry::lookup(key, modifiers) {
            Some(Action::DeleteSelection) => {
                self.delete_selected();
                true
            }
            Some(Action::Copy) => self.copy(),
            Some(Action::Cut) => self.cut(),
            Some(Action::Paste) => !self.paste().is_empty(),
            Some(Action::Undo) => self.room.undo(),
            Some(Action::Redo) => self.room.redo(),
            _ => false,
        };
        self.pump();
        handled
    }

    /// Key released. Drives cursor chat and the reaction selector.
    pub fn key_up(&mut self, key: Key, modifiers: Modifiers) -> bool {
        self.live.key_up(&mut self.room, key, modifiers)
    }

    pub fn context_menu(&mut self, item: ContextMenuItem) {
        if self.torn_down {
            return;
        }
        match item {
            ContextMenuItem::Chat => self.live.start_chat(),
            ContextMenuItem::Undo => {
                self.room.undo();
            }
            ContextMenuItem::Redo => {
                self.room.redo();
            }
            ContextMenuItem::Reactions => self.live.open_reactions(),
        }
        self.pump();
    }

    pub fn select_reaction(&mut self, value: &str) {
        self.live.select_reaction(value);
    }

    // --- Toolbar and panel ---

    pub fn select_tool(&mut self, tool: Tool) {
        self.drawing.cancel(&mut self.scene);
        self.drawing.select_tool(tool, &mut self.scene);
        self.pump();
    }

    /// A panel field changed. Returns whether storage was written.
    pub fn input_change(&mut self, key: AttributeKey, value: &str) -> bool {
        let written = self.panel.input_change(
            &mut self.scene,
            self.room.storage_mut(),
            &mut self.active_ref,
            key,
            value,
        );
        self.pump();
        written
    }

    /// Remove the active object from the scene and from storage.
    pub fn delete_selected(&mut self) -> bool {
        let Some(id) = self.scene.active_object() else {
            return false;
        };
        self.scene.remove(id);
        let removed = delete_shape_from_storage(self.room.storage_mut(), id);
        self.pump();
        removed
    }

    /// Delete every shape everywhere, then clear the scene regardless of the
    /// outcome. Returns whether storage ended up empty.
    pub fn reset(&mut self) -> bool {
        let emptied = delete_all_shapes(self.room.storage_mut());
        if !emptied {
            log::warn!("Storage was not fully cleared");
        }
        self.drawing.cancel(&mut self.scene);
        self.scene.clear();
        self.active_ref = None;
        self.pump();
        emptied
    }

    /// Place an image at the canvas origin, scaled to fit, and sync it.
    pub fn insert_image(
        &mut self,
        data: &[u8],
        source_width: u32,
        source_height: u32,
    ) -> Option<ObjectId> {
        let Some(format) = ImageFormat::from_magic_bytes(data) else {
            log::warn!("Unsupported image data ({} bytes)", data.len());
            return None;
        };
        let fit = self.config.image_fit_size;
        let image = Image::new(Point::ZERO, data, source_width, source_height, format)
            .fit_within(fit, fit);
        let id = self.scene.add(Shape::Image(image));
        sync_shape_in_storage(&self.scene, self.room.storage_mut(), id);
        self.pump();
        Some(id)
    }

    pub fn copy(&mut self) -> bool {
        let Some(shape) = self.scene.active_object().and_then(|id| self.scene.get(id)) else {
            return false;
        };
        self.clipboard = vec![shape.clone()];
        true
    }

    pub fn cut(&mut self) -> bool {
        self.copy() && self.delete_selected()
    }

    /// Paste the clipboard as new objects. Each paste lands one offset
    /// further than the previous one.
    pub fn paste(&mut self) -> Vec<ObjectId> {
        if self.torn_down {
            return Vec::new();
        }
        let offset = self.config.paste_offset;
        let mut pasted = Vec::new();
        for shape in &mut self.clipboard {
            shape.transform(Affine::translate((offset, offset)));
            let mut copy = shape.clone();
            copy.regenerate_id();
            let id = self.scene.add(copy);
            sync_shape_in_storage(&self.scene, self.room.storage_mut(), id);
            pasted.push(id);
        }
        if let Some(&last) = pasted.last() {
            self.scene.set_active_object(Some(last));
        }
        self.pump();
        pasted
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.scene.set_dimensions(width, height);
        self.pump();
    }

    /// Advance timers to `now_ms` and process pending events.
    ///
    /// Broadcasts that arrived since the previous tick are timestamped here.
    pub fn tick(&mut self, now_ms: u64) {
        if self.torn_down {
            return;
        }
        self.live.tick(&mut self.room, now_ms);
        self.pump();
        for event in self.inbox.drain(..) {
            self.live.on_broadcast(event, now_ms);
        }
    }

    /// Unsubscribe scene events, dispose the scene, stop the timers and
    /// leave the room.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.scene.off_all();
        self.scene.dispose();
        self.live.stop();
        self.room.leave_room();
        self.torn_down = true;
    }

    // --- Event dispatch ---

    /// Drain scene and room events until both queues are empty.
    pub fn pump(&mut self) {
        loop {
            let scene_events = self.scene.poll_events();
            let room_events = self.room.poll_events();
            if scene_events.is_empty() && room_events.is_empty() {
                break;
            }
            for event in scene_events {
                self.handle_scene_event(event);
            }
            for event in room_events {
                self.handle_room_event(event);
            }
        }
    }

    fn handle_scene_event(&mut self, event: SceneEvent) {
        match event {
            SceneEvent::MouseDown { point, target } => {
                self.drawing.pointer_down(&mut self.scene, point, target);
            }
            SceneEvent::MouseMove { point } => {
                self.drawing.pointer_move(&mut self.scene, point);
            }
            SceneEvent::MouseUp { point } => {
                self.drawing.pointer_up(
                    &mut self.scene,
                    self.room.storage_mut(),
                    &mut self.active_ref,
                    point,
                );
            }
            SceneEvent::ObjectModified { target } | SceneEvent::PathCreated { target } => {
                sync_shape_in_storage(&self.scene, self.room.storage_mut(), target);
            }
            SceneEvent::ObjectScaling { target } => {
                self.panel.on_scaling(&self.scene, target);
            }
            SceneEvent::SelectionCreated { target } => {
                self.active_ref = Some(target);
                self.panel.on_selection_created(&self.scene, target);
            }
            SceneEvent::SelectionCleared => {
                self.active_ref = None;
                self.panel.on_selection_cleared();
            }
            SceneEvent::Resize { width, height } => {
                log::debug!("Canvas resized to {width}x{height}");
            }
        }
    }

    fn handle_room_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::StorageChanged => {
                render_canvas(
                    &mut self.scene,
                    self.room.storage(),
                    self.active_ref,
                    self.drawing.in_progress(),
                );
            }
            RoomEvent::Broadcast { event, .. } => self.inbox.push(event),
            RoomEvent::Joined { peer_count, .. } => {
                log::debug!("{peer_count} participants in room");
            }
            RoomEvent::Error { message } => {
                log::warn!("Room error: {message}");
            }
            RoomEvent::PeerJoined { .. }
            | RoomEvent::PeerLeft { .. }
            | RoomEvent::PresenceChanged { .. } => {}
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

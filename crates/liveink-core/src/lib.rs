//! LiveInk Core Library
//!
//! Client-side reconciliation for the LiveInk collaborative whiteboard: the
//! scene, shared shape storage, presence, cursor chat and reactions.

pub mod config;
pub mod crdt;
pub mod drawing;
pub mod input;
pub mod live;
pub mod panel;
pub mod room;
pub mod scene;
pub mod session;
pub mod shapes;
pub mod sync;

pub use config::SessionConfig;
pub use crdt::CrdtDocument;
pub use drawing::{DrawingMachine, DrawingState, Tool};
pub use input::{ContextMenuItem, Key, Modifiers, ShortcutRegistry};
pub use live::{CursorState, LiveEngine, Overlay};
pub use panel::{AttributePanel, ElementAttributes};
pub use room::{PresenceChannel, RoomClient, RoomEvent, RoomHub, SharedShapeMap};
pub use scene::{Scene, SceneAdapter, SceneEvent, SceneEventKind};
pub use session::Session;
pub use shapes::{AttributeKey, ObjectId, Shape, ShapeKind, ShapeRecord};

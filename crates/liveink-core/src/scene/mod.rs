//! Scene adapter: the boundary to the 2D scene graph.
//!
//! The session only talks to the scene through [`SceneAdapter`]. Events are
//! queued for the kinds the caller subscribed to with [`SceneAdapter::on`] and
//! drained with [`SceneAdapter::poll_events`].

mod canvas;

pub use canvas::Scene;

use crate::shapes::{AttributeKey, ObjectId, Shape, ShapeKind, ShapeProps, ShapeRecord, ShapeStyle};
use kurbo::{Affine, Point};
use thiserror::Error;

/// Errors raised at the scene boundary.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("no object with id {0}")]
    UnknownObject(ObjectId),
    #[error("unknown shape type: {0}")]
    UnknownShapeType(String),
    #[error("shape kind {0:?} is not created from a pointer")]
    NotCreatable(ShapeKind),
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),
    #[error("invalid value {value:?} for {key}")]
    InvalidAttribute { key: AttributeKey, value: String },
    #[error("{kind:?} does not support {key}")]
    UnsupportedAttribute { key: AttributeKey, kind: ShapeKind },
    #[error("malformed shape record: {0}")]
    MalformedRecord(String),
}

/// Event kinds that can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneEventKind {
    MouseDown,
    MouseMove,
    MouseUp,
    ObjectModified,
    ObjectScaling,
    SelectionCreated,
    SelectionCleared,
    PathCreated,
    Resize,
}

impl SceneEventKind {
    pub fn all() -> &'static [SceneEventKind] {
        &[
            SceneEventKind::MouseDown,
            SceneEventKind::MouseMove,
            SceneEventKind::MouseUp,
            SceneEventKind::ObjectModified,
            SceneEventKind::ObjectScaling,
            SceneEventKind::SelectionCreated,
            SceneEventKind::SelectionCleared,
            SceneEventKind::PathCreated,
            SceneEventKind::Resize,
        ]
    }
}

/// Events emitted by the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// Pointer pressed; `target` is the topmost object under the pointer.
    MouseDown { point: Point, target: Option<ObjectId> },
    MouseMove { point: Point },
    MouseUp { point: Point },
    /// A direct manipulation (move or scale) finished.
    ObjectModified { target: ObjectId },
    /// The object is being scaled; emitted continuously.
    ObjectScaling { target: ObjectId },
    SelectionCreated { target: ObjectId },
    SelectionCleared,
    /// A freehand stroke was committed to the scene.
    PathCreated { target: ObjectId },
    Resize { width: f64, height: f64 },
}

impl SceneEvent {
    pub fn kind(&self) -> SceneEventKind {
        match self {
            SceneEvent::MouseDown { .. } => SceneEventKind::MouseDown,
            SceneEvent::MouseMove { .. } => SceneEventKind::MouseMove,
            SceneEvent::MouseUp { .. } => SceneEventKind::MouseUp,
            SceneEvent::ObjectModified { .. } => SceneEventKind::ObjectModified,
            SceneEvent::ObjectScaling { .. } => SceneEventKind::ObjectScaling,
            SceneEvent::SelectionCreated { .. } => SceneEventKind::SelectionCreated,
            SceneEvent::SelectionCleared => SceneEventKind::SelectionCleared,
            SceneEvent::PathCreated { .. } => SceneEventKind::PathCreated,
            SceneEvent::Resize { .. } => SceneEventKind::Resize,
        }
    }
}

/// Operations the reconciliation core needs from a scene graph.
pub trait SceneAdapter {
    /// Create a shape of `kind` at the pointer and add it to the scene.
    fn create(&mut self, kind: ShapeKind, props: &ShapeProps) -> Result<ObjectId, SceneError>;

    /// Add an already built shape (paste, image insert).
    fn add(&mut self, shape: Shape) -> ObjectId;

    fn get(&self, id: ObjectId) -> Option<&Shape>;

    /// Ids of all objects, back to front.
    fn object_ids(&self) -> Vec<ObjectId>;

    /// Subscribe to an event kind.
    fn on(&mut self, kind: SceneEventKind);

    /// Drop every subscription and any queued events.
    fn off_all(&mut self);

    /// Drain queued events in emission order.
    fn poll_events(&mut self) -> Vec<SceneEvent>;

    fn to_attribute_record(&self, id: ObjectId) -> Result<ShapeRecord, SceneError>;

    /// Apply an attribute edit. Returns whether the object changed.
    fn apply_attribute(
        &mut self,
        id: ObjectId,
        key: AttributeKey,
        value: &str,
    ) -> Result<bool, SceneError>;

    fn read_attribute(&self, id: ObjectId, key: AttributeKey) -> Option<String>;

    /// Insert or replace an object from a stored record without emitting events.
    fn upsert_from_record(&mut self, record: &ShapeRecord) -> Result<ObjectId, SceneError>;

    /// Reshape an object being drawn.
    fn reshape(&mut self, id: ObjectId, origin: Point, pointer: Point) -> Result<(), SceneError>;

    fn transform(&mut self, id: ObjectId, affine: Affine) -> Result<(), SceneError>;

    fn remove(&mut self, id: ObjectId) -> Option<Shape>;

    /// Topmost object under the point.
    fn find_target(&self, point: Point) -> Option<ObjectId>;

    fn active_object(&self) -> Option<ObjectId>;

    /// Change the selection, emitting selection events when it changes.
    fn set_active_object(&mut self, id: Option<ObjectId>);

    /// Whether pointer input selects and drags objects.
    fn set_selection_enabled(&mut self, enabled: bool);

    /// Arm or disarm freehand drawing with the given brush.
    fn set_drawing_mode(&mut self, brush: Option<ShapeStyle>);

    fn is_drawing_mode(&self) -> bool;

    fn set_dimensions(&mut self, width: f64, height: f64);

    /// Remove every object.
    fn clear(&mut self);

    /// Release the scene; later calls are no-ops.
    fn dispose(&mut self);
}

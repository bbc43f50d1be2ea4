//! Toolbar tools and the pointer/drawing state machine.

use crate::room::SharedShapeMap;
use crate::scene::SceneAdapter;
use crate::shapes::{ObjectId, SerializableColor, ShapeKind, ShapeProps, ShapeStyle};
use crate::sync::sync_shape_in_storage;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Toolbar tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Select,
    Rectangle,
    Circle,
    Triangle,
    Line,
    Text,
    /// Freehand brush.
    Freeform,
    Image,
}

impl Tool {
    /// The shape a pointer-down creates with this tool.
    pub fn shape_kind(&self) -> Option<ShapeKind> {
        match self {
            Tool::Rectangle => Some(ShapeKind::Rectangle),
            Tool::Circle => Some(ShapeKind::Circle),
            Tool::Triangle => Some(ShapeKind::Triangle),
            Tool::Line => Some(ShapeKind::Line),
            Tool::Text => Some(ShapeKind::Text),
            Tool::Select | Tool::Freeform | Tool::Image => None,
        }
    }

    /// Toolbar value of the tool.
    pub fn value(&self) -> &'static str {
        match self {
            Tool::Select => "select",
            Tool::Rectangle => "rectangle",
            Tool::Circle => "circle",
            Tool::Triangle => "triangle",
            Tool::Line => "line",
            Tool::Text => "text",
            Tool::Freeform => "freeform",
            Tool::Image => "image",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.value() == value)
    }

    pub fn all() -> &'static [Tool] {
        &[
            Tool::Select,
            Tool::Rectangle,
            Tool::Circle,
            Tool::Triangle,
            Tool::Line,
            Tool::Text,
            Tool::Freeform,
            Tool::Image,
        ]
    }
}

/// State of the pointer gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawingState {
    /// A tool is armed and no gesture is in progress.
    Idle,
    /// A shape is being drawn.
    Drawing {
        kind: ShapeKind,
        id: ObjectId,
        origin: Point,
    },
    /// The select tool is active; the scene handles the pointer.
    Selecting,
}

/// Turns pointer gestures into shapes and storage writes.
#[derive(Debug, Clone)]
pub struct DrawingMachine {
    tool: Tool,
    state: DrawingState,
    /// Color for new shapes.
    color: SerializableColor,
    brush: ShapeStyle,
}

impl DrawingMachine {
    pub fn new(color: SerializableColor, brush: ShapeStyle) -> Self {
        Self {
            tool: Tool::Select,
            state: DrawingState::Selecting,
            color,
            brush,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn state(&self) -> DrawingState {
        self.state
    }

    /// The shape currently being drawn. It is not in storage yet.
    pub fn in_progress(&self) -> Option<ObjectId> {
        match self.state {
            DrawingState::Drawing { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Switch tools, configuring the scene's selection and brush.
    pub fn select_tool<S: SceneAdapter + ?Sized>(&mut self, tool: Tool, scene: &mut S) {
        self.tool = tool;
        match tool {
            Tool::Freeform => {
                scene.set_drawing_mode(Some(self.brush.clone()));
                scene.set_selection_enabled(false);
                self.state = DrawingState::Idle;
            }
            Tool::Select | Tool::Image => {
                scene.set_drawing_mode(None);
                scene.set_selection_enabled(true);
                self.state = if tool == Tool::Select {
                    DrawingState::Selecting
                } else {
                    DrawingState::Idle
                };
            }
            _ => {
                scene.set_drawing_mode(None);
                scene.set_selection_enabled(false);
                self.state = DrawingState::Idle;
            }
        }
        log::debug!("Tool changed to {}", tool.value());
    }

    /// Pointer pressed. `target` is the topmost object under the pointer.
    pub fn pointer_down<S: SceneAdapter + ?Sized>(
        &mut self,
        scene: &mut S,
        point: Point,
        target: Option<ObjectId>,
    ) {
        let Some(kind) = self.tool.shape_kind() else {
            return;
        };
        // Pressing on a shape of the tool's own kind selects it instead.
        if let Some(target) = target {
            if scene.get(target).is_some_and(|shape| shape.kind() == kind) {
                scene.set_active_object(Some(target));
                return;
            }
        }
        let props = ShapeProps {
            origin: point,
            color: self.color,
        };
        match scene.create(kind, &props) {
            Ok(id) => {
                self.state = DrawingState::Drawing {
                    kind,
                    id,
                    origin: point,
                };
            }
            Err(e) => log::warn!("Could not create {kind:?}: {e}"),
        }
    }

    /// Pointer moved: reshape the shape being drawn. Never writes storage.
    pub fn pointer_move<S: SceneAdapter + ?Sized>(&mut self, scene: &mut S, point: Point) {
        if let DrawingState::Drawing { id, origin, .. } = self.state {
            if let Err(e) = scene.reshape(id, origin, point) {
                log::debug!("Drawing target vanished: {e}");
                self.state = DrawingState::Idle;
            }
        }
    }

    /// Pointer released: finalize and sync the drawn shape.
    ///
    /// Returns the synced shape. Single-shot tools revert to the select tool.
    pub fn pointer_up<S, M>(
        &mut self,
        scene: &mut S,
        storage: &mut M,
        active_ref: &mut Option<ObjectId>,
        point: Point,
    ) -> Option<ObjectId>
    where
        S: SceneAdapter + ?Sized,
        M: SharedShapeMap + ?Sized,
    {
        let DrawingState::Drawing { id, origin, .. } = self.state else {
            return None;
        };
        // A click without a drag keeps the default size.
        if point != origin {
            if let Err(e) = scene.reshape(id, origin, point) {
                log::debug!("Drawing target vanished: {e}");
            }
        }
        self.state = DrawingState::Idle;
        sync_shape_in_storage(scene, storage, id);
        *active_ref = Some(id);
        self.select_tool(Tool::Select, scene);
        Some(id)
    }

    /// Abandon the shape being drawn, removing it from the scene.
    pub fn cancel<S: SceneAdapter + ?Sized>(&mut self, scene: &mut S) {
        if let Some(id) = self.in_progress() {
            scene.remove(id);
            self.state = DrawingState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::CrdtDocument;
    use crate::scene::Scene;
    use crate::shapes::{Circle, Rectangle, Shape};
    use kurbo::Rect;

    fn machine() -> DrawingMachine {
        DrawingMachine::new(
            SerializableColor::parse("#aabbcc").unwrap(),
            ShapeStyle::stroked(SerializableColor::black(), 5.0),
        )
    }

    #[test]
    fn test_tool_values() {
        for tool in Tool::all() {
            assert_eq!(Tool::from_value(tool.value()), Some(*tool));
        }
        assert_eq!(Tool::Image.shape_kind(), None);
        assert_eq!(Tool::Text.shape_kind(), Some(ShapeKind::Text));
    }

    #[test]
    fn test_drag_draws_and_syncs_on_release() {
        let mut scene = Scene::new(800.0, 600.0);
        let mut storage = CrdtDocument::new();
        let mut active_ref = None;
        let mut drawing = machine();
        drawing.select_tool(Tool::Rectangle, &mut scene);

        drawing.pointer_down(&mut scene, Point::new(10.0, 10.0), None);
        let id = drawing.in_progress().unwrap();
        drawing.pointer_move(&mut scene, Point::new(60.0, 40.0));
        assert!(storage.is_empty());

        let release = Point::new(110.0, 60.0);
        let synced = drawing.pointer_up(&mut scene, &mut storage, &mut active_ref, release);
        assert_eq!(synced, Some(id));
        assert_eq!(active_ref, Some(id));
        assert_eq!(scene.get(id).unwrap().bounds(), Rect::new(10.0, 10.0, 110.0, 60.0));
        assert_eq!(storage.get(id), scene.to_attribute_record(id).ok());
        assert_eq!(drawing.tool(), Tool::Select);
        assert_eq!(drawing.state(), DrawingState::Selecting);
    }

    #[test]
    fn test_click_keeps_default_size() {
        let mut scene = Scene::new(800.0, 600.0);
        let mut storage = CrdtDocument::new();
        let mut active_ref = None;
        let mut drawing = machine();
        drawing.select_tool(Tool::Triangle, &mut scene);

        drawing.pointer_down(&mut scene, Point::new(5.0, 5.0), None);
        let id = drawing
            .pointer_up(&mut scene, &mut storage, &mut active_ref, Point::new(5.0, 5.0))
            .unwrap();
        assert_eq!(scene.get(id).unwrap().bounds(), Rect::new(5.0, 5.0, 105.0, 105.0));
    }

    #[test]
    fn test_press_on_same_kind_selects() {
        let mut scene = Scene::new(800.0, 600.0);
        let existing = scene.add(Shape::Rectangle(Rectangle::new(Point::ZERO, 100.0, 100.0)));
        let mut drawing = machine();
        drawing.select_tool(Tool::Rectangle, &mut scene);

        drawing.pointer_down(&mut scene, Point::new(50.0, 50.0), Some(existing));
        assert_eq!(drawing.in_progress(), None);
        assert_eq!(scene.active_object(), Some(existing));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_press_on_other_kind_draws_over_it() {
        let mut scene = Scene::new(800.0, 600.0);
        let circle = scene.add(Shape::Circle(Circle::new(Point::ZERO, 50.0)));
        let mut drawing = machine();
        drawing.select_tool(Tool::Line, &mut scene);

        drawing.pointer_down(&mut scene, Point::new(50.0, 50.0), Some(circle));
        assert!(drawing.in_progress().is_some());
        assert_eq!(scene.len(), 2);

        drawing.cancel(&mut scene);
        assert_eq!(scene.len(), 1);
        assert_eq!(drawing.state(), DrawingState::Idle);
    }

    #[test]
    fn test_freeform_arms_brush() {
        let mut scene = Scene::new(800.0, 600.0);
        let mut drawing = machine();
        drawing.select_tool(Tool::Freeform, &mut scene);
        assert!(scene.is_drawing_mode());
        drawing.pointer_down(&mut scene, Point::new(1.0, 1.0), None);
        assert_eq!(drawing.in_progress(), None);

        drawing.select_tool(Tool::Image, &mut scene);
        assert!(!scene.is_drawing_mode());
        assert_eq!(drawing.state(), DrawingState::Idle);
    }
}

//! In-memory scene graph.

use super::{SceneAdapter, SceneError, SceneEvent, SceneEventKind};
use crate::shapes::{
    AttributeKey, Freehand, ObjectId, Shape, ShapeKind, ShapeProps, ShapeRecord, ShapeStyle,
    scale_about,
};
use kurbo::{Affine, Point, Size};
use std::collections::{HashMap, HashSet};

/// Hit-test tolerance in canvas units.
const HIT_TOLERANCE: f64 = 4.0;

/// A direct manipulation in progress.
#[derive(Debug, Clone, Copy)]
enum Manipulation {
    Move { id: ObjectId, last: Point, moved: bool },
    Scale { id: ObjectId },
}

/// A scene holding shapes in z-order, with selection, direct manipulation
/// and a freehand brush.
#[derive(Debug)]
pub struct Scene {
    objects: HashMap<ObjectId, Shape>,
    /// Back to front.
    z_order: Vec<ObjectId>,
    active: Option<ObjectId>,
    subscriptions: HashSet<SceneEventKind>,
    queue: Vec<SceneEvent>,
    /// Armed freehand brush.
    brush: Option<ShapeStyle>,
    /// Stroke being drawn with the brush.
    stroke: Option<Freehand>,
    manipulation: Option<Manipulation>,
    selection_enabled: bool,
    size: Size,
    disposed: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Scene {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            objects: HashMap::new(),
            z_order: Vec::new(),
            active: None,
            subscriptions: HashSet::new(),
            queue: Vec::new(),
            brush: None,
            stroke: None,
            manipulation: None,
            selection_enabled: true,
            size: Size::new(width, height),
            disposed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The freehand stroke currently being drawn.
    pub fn pending_stroke(&self) -> Option<&Freehand> {
        self.stroke.as_ref()
    }

    /// Pointer pressed at `point`.
    pub fn pointer_down(&mut self, point: Point) {
        if self.disposed {
            return;
        }
        let target = if self.brush.is_some() {
            None
        } else {
            self.find_target(point)
        };
        self.emit(SceneEvent::MouseDown { point, target });

        if let Some(brush) = &self.brush {
            let mut stroke = Freehand::new();
            stroke.style = brush.clone();
            stroke.add_point(point);
            self.stroke = Some(stroke);
            return;
        }
        if !self.selection_enabled {
            return;
        }
        match target {
            Some(id) => {
                self.set_active_object(Some(id));
                self.manipulation = Some(Manipulation::Move {
                    id,
                    last: point,
                    moved: false,
                });
            }
            None => self.set_active_object(None),
        }
    }

    /// Pointer moved to `point`.
    pub fn pointer_move(&mut self, point: Point) {
        if self.disposed {
            return;
        }
        self.emit(SceneEvent::MouseMove { point });

        if let Some(stroke) = &mut self.stroke {
            stroke.add_point(point);
            return;
        }
        if let Some(Manipulation::Move { id, last, moved }) = &mut self.manipulation {
            if let Some(shape) = self.objects.get_mut(id) {
                shape.transform(Affine::translate(point - *last));
                *last = point;
                *moved = true;
            }
        }
    }

    /// Pointer released at `point`.
    pub fn pointer_up(&mut self, point: Point) {
        if self.disposed {
            return;
        }
        self.emit(SceneEvent::MouseUp { point });

        if let Some(mut stroke) = self.stroke.take() {
            stroke.add_point(point);
            // A click without movement leaves no stroke.
            if stroke.points.len() >= 2 {
                let id = self.add(Shape::Freehand(stroke));
                self.emit(SceneEvent::PathCreated { target: id });
            }
            return;
        }
        match self.manipulation.take() {
            Some(Manipulation::Move { id, moved: true, .. }) | Some(Manipulation::Scale { id })
                if self.objects.contains_key(&id) =>
            {
                self.emit(SceneEvent::ObjectModified { target: id });
            }
            _ => {}
        }
    }

    /// Scale the active object about its top-left corner, as a drag on a
    /// scale handle would. The next pointer-up commits the change.
    pub fn scale_active(&mut self, sx: f64, sy: f64) -> bool {
        if self.disposed {
            return false;
        }
        let Some(id) = self.active else {
            return false;
        };
        let Some(shape) = self.objects.get_mut(&id) else {
            return false;
        };
        let anchor = shape.bounds().origin();
        shape.transform(scale_about(anchor, sx, sy));
        self.manipulation = Some(Manipulation::Scale { id });
        self.emit(SceneEvent::ObjectScaling { target: id });
        true
    }

    fn emit(&mut self, event: SceneEvent) {
        if !self.disposed && self.subscriptions.contains(&event.kind()) {
            self.queue.push(event);
        }
    }

    fn insert(&mut self, shape: Shape) -> ObjectId {
        let id = shape.id();
        if self.objects.insert(id, shape).is_none() {
            self.z_order.push(id);
        }
        id
    }
}

impl SceneAdapter for Scene {
    fn create(&mut self, kind: ShapeKind, props: &ShapeProps) -> Result<ObjectId, SceneError> {
        let shape = Shape::create(kind, props).ok_or(SceneError::NotCreatable(kind))?;
        Ok(self.add(shape))
    }

    fn add(&mut self, shape: Shape) -> ObjectId {
        if self.disposed {
            return shape.id();
        }
        self.insert(shape)
    }

    fn get(&self, id: ObjectId) -> Option<&Shape> {
        self.objects.get(&id)
    }

    fn object_ids(&self) -> Vec<ObjectId> {
        self.z_order.clone()
    }

    fn on(&mut self, kind: SceneEventKind) {
        if !self.disposed {
            self.subscriptions.insert(kind);
        }
    }

    fn off_all(&mut self) {
        self.subscriptions.clear();
        self.queue.clear();
    }

    fn poll_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.queue)
    }

    fn to_attribute_record(&self, id: ObjectId) -> Result<ShapeRecord, SceneError> {
        self.objects
            .get(&id)
            .ok_or(SceneError::UnknownObject(id))?
            .to_record()
    }

    fn apply_attribute(
        &mut self,
        id: ObjectId,
        key: AttributeKey,
        value: &str,
    ) -> Result<bool, SceneError> {
        self.objects
            .get_mut(&id)
            .ok_or(SceneError::UnknownObject(id))?
            .apply_attribute(key, value)
    }

    fn read_attribute(&self, id: ObjectId, key: AttributeKey) -> Option<String> {
        self.objects.get(&id)?.attribute(key)
    }

    fn upsert_from_record(&mut self, record: &ShapeRecord) -> Result<ObjectId, SceneError> {
        let shape = Shape::from_record(record)?;
        if self.disposed {
            return Ok(shape.id());
        }
        Ok(self.insert(shape))
    }

    fn reshape(&mut self, id: ObjectId, origin: Point, pointer: Point) -> Result<(), SceneError> {
        self.objects
            .get_mut(&id)
            .ok_or(SceneError::UnknownObject(id))?
            .reshape(origin, pointer);
        Ok(())
    }

    fn transform(&mut self, id: ObjectId, affine: Affine) -> Result<(), SceneError> {
        self.objects
            .get_mut(&id)
            .ok_or(SceneError::UnknownObject(id))?
            .transform(affine);
        Ok(())
    }

    fn remove(&mut self, id: ObjectId) -> Option<Shape> {
        let shape = self.objects.remove(&id)?;
        self.z_order.retain(|&other| other != id);
        if self.active == Some(id) {
            self.set_active_object(None);
        }
        Some(shape)
    }

    fn find_target(&self, point: Point) -> Option<ObjectId> {
        // Front to back for selection priority.
        self.z_order.iter().rev().copied().find(|id| {
            self.objects
                .get(id)
                .is_some_and(|shape| shape.hit_test(point, HIT_TOLERANCE))
        })
    }

    fn active_object(&self) -> Option<ObjectId> {
        self.active
    }

    fn set_active_object(&mut self, id: Option<ObjectId>) {
        let id = id.filter(|id| self.objects.contains_key(id));
        if id == self.active {
            return;
        }
        self.active = id;
        match id {
            Some(target) => self.emit(SceneEvent::SelectionCreated { target }),
            None => self.emit(SceneEvent::SelectionCleared),
        }
    }

    fn set_selection_enabled(&mut self, enabled: bool) {
        self.selection_enabled = enabled;
    }

    fn set_drawing_mode(&mut self, brush: Option<ShapeStyle>) {
        if brush.is_none() {
            self.stroke = None;
        }
        self.brush = brush;
    }

    fn is_drawing_mode(&self) -> bool {
        self.brush.is_some()
    }

    fn set_dimensions(&mut self, width: f64, height: f64) {
        if self.disposed {
            return;
        }
        self.size = Size::new(width, height);
        self.emit(SceneEvent::Resize { width, height });
    }

    fn clear(&mut self) {
        self.objects.clear();
        self.z_order.clear();
        self.stroke = None;
        self.manipulation = None;
        self.set_active_object(None);
    }

    fn dispose(&mut self) {
        self.off_all();
        self.clear();
        self.brush = None;
        self.disposed = true;
    }
}

//! Circle shape.

use super::{ObjectId, ShapeStyle, ShapeTrait};
use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A circle anchored at the top-left corner of its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Circle {
    #[serde(rename = "objectId")]
    pub(crate) id: ObjectId,
    pub left: f64,
    pub top: f64,
    pub radius: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(flatten)]
    pub style: ShapeStyle,
}

impl Circle {
    pub fn new(position: Point, radius: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            left: position.x,
            top: position.y,
            radius,
            angle: 0.0,
            style: ShapeStyle::default(),
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.radius, self.top + self.radius)
    }
}

impl ShapeTrait for Circle {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn bounds(&self) -> Rect {
        let diameter = self.radius * 2.0;
        Rect::new(self.left, self.top, self.left + diameter, self.top + diameter)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.center()).hypot() <= self.radius + tolerance
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn transform(&mut self, affine: Affine) {
        let origin = affine * Point::new(self.left, self.top);
        let scale = affine.as_coeffs();
        self.left = origin.x;
        self.top = origin.y;
        // A circle stays a circle: the larger axis wins.
        self.radius *= scale[0].abs().max(scale[3].abs());
    }

    fn reshape(&mut self, _origin: Point, pointer: Point) {
        self.radius = (pointer.x - self.left).abs() / 2.0;
    }

    fn set_size(&mut self, width: Option<f64>, height: Option<f64>) -> bool {
        if let Some(w) = width {
            self.radius = w / 2.0;
        }
        if let Some(h) = height {
            self.radius = h / 2.0;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_radius() {
        let circle = Circle::new(Point::new(10.0, 20.0), 50.0);
        assert_eq!(circle.bounds(), Rect::new(10.0, 20.0, 110.0, 120.0));
        assert_eq!(circle.center(), Point::new(60.0, 70.0));
    }

    #[test]
    fn test_hit_test_uses_radius() {
        let circle = Circle::new(Point::new(0.0, 0.0), 50.0);
        assert!(circle.hit_test(Point::new(50.0, 50.0), 0.0));
        // Corner of the bounding box is outside the circle.
        assert!(!circle.hit_test(Point::new(2.0, 2.0), 1.0));
    }

    #[test]
    fn test_reshape_tracks_horizontal_drag() {
        let mut circle = Circle::new(Point::new(100.0, 100.0), 100.0);
        circle.reshape(Point::new(100.0, 100.0), Point::new(160.0, 300.0));
        assert!((circle.radius - 30.0).abs() < f64::EPSILON);
    }
}

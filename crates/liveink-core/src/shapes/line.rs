//! Straight line segment.

use super::{ObjectId, ShapeStyle, ShapeTrait, point_to_segment_dist};
use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A line between two end points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    #[serde(rename = "objectId")]
    pub(crate) id: ObjectId,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(flatten)]
    pub style: ShapeStyle,
}

impl Line {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            id: Uuid::new_v4(),
            x1: start.x,
            y1: start.y,
            x2: end.x,
            y2: end.y,
            style: ShapeStyle::default(),
        }
    }

    pub fn start(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn end(&self) -> Point {
        Point::new(self.x2, self.y2)
    }

    pub fn length(&self) -> f64 {
        (self.end() - self.start()).hypot()
    }
}

impl ShapeTrait for Line {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn bounds(&self) -> Rect {
        Rect::from_points(self.start(), self.end())
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        point_to_segment_dist(point, self.start(), self.end())
            <= tolerance + self.style.stroke_width / 2.0
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn transform(&mut self, affine: Affine) {
        let start = affine * self.start();
        let end = affine * self.end();
        self.x1 = start.x;
        self.y1 = start.y;
        self.x2 = end.x;
        self.y2 = end.y;
    }

    fn reshape(&mut self, _origin: Point, pointer: Point) {
        self.x2 = pointer.x;
        self.y2 = pointer.y;
    }

    fn set_size(&mut self, width: Option<f64>, height: Option<f64>) -> bool {
        // Keep the start point and the direction of each axis.
        let direction = |delta: f64| if delta < 0.0 { -1.0 } else { 1.0 };
        if let Some(w) = width {
            self.x2 = self.x1 + direction(self.x2 - self.x1) * w;
        }
        if let Some(h) = height {
            self.y2 = self.y1 + direction(self.y2 - self.y1) * h;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_length() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(3.0, 4.0));
        assert!((line.length() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_test_includes_stroke() {
        let mut line = Line::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        line.style.stroke_width = 4.0;
        assert!(line.hit_test(Point::new(50.0, 3.0), 1.0));
        assert!(!line.hit_test(Point::new(50.0, 10.0), 1.0));
    }

    #[test]
    fn test_set_size_keeps_direction() {
        let mut line = Line::new(Point::new(100.0, 100.0), Point::new(50.0, 150.0));
        line.set_size(Some(20.0), Some(10.0));
        assert_eq!(line.end(), Point::new(80.0, 110.0));
    }
}

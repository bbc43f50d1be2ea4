//! Isosceles triangle shape, apex up.

use super::{ObjectId, ShapeStyle, ShapeTrait, point_to_polyline_dist};
use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A triangle inscribed in its bounding box with the apex at the top center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triangle {
    #[serde(rename = "objectId")]
    pub(crate) id: ObjectId,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(flatten)]
    pub style: ShapeStyle,
}

impl Triangle {
    pub fn new(position: Point, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            left: position.x,
            top: position.y,
            width,
            height,
            angle: 0.0,
            style: ShapeStyle::default(),
        }
    }

    /// The three vertices: apex, bottom-right, bottom-left.
    pub fn vertices(&self) -> [Point; 3] {
        [
            Point::new(self.left + self.width / 2.0, self.top),
            Point::new(self.left + self.width, self.top + self.height),
            Point::new(self.left, self.top + self.height),
        ]
    }

    fn contains(&self, point: Point) -> bool {
        let [a, b, c] = self.vertices();
        let sign = |p1: Point, p2: Point, p3: Point| {
            (p1.x - p3.x) * (p2.y - p3.y) - (p2.x - p3.x) * (p1.y - p3.y)
        };
        let d1 = sign(point, a, b);
        let d2 = sign(point, b, c);
        let d3 = sign(point, c, a);
        let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
        let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
        !(has_neg && has_pos)
    }
}

impl ShapeTrait for Triangle {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn bounds(&self) -> Rect {
        Rect::new(self.left, self.top, self.left + self.width, self.top + self.height)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        if self.contains(point) {
            return true;
        }
        // Near an edge counts as a hit.
        let [a, b, c] = self.vertices();
        point_to_polyline_dist(point, &[a, b, c, a]) <= tolerance
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
        self.width *= scale[0].abs();
        self.height *= scale[3].abs();
    }

    fn reshape(&mut self, origin: Point, pointer: Point) {
        self.left = origin.x.min(pointer.x);
        self.top = origin.y.min(pointer.y);
        self.width = (pointer.x - origin.x).abs();
        self.height = (pointer.y - origin.y).abs();
    }

    fn set_size(&mut self, width: Option<f64>, height: Option<f64>) -> bool {
        if let Some(w) = width {
            self.width = w;
        }
        if let Some(h) = height {
            self.height = h;
        }
        true
    }
}

//! Shape definitions for the shared canvas.
//!
//! Every shape serializes to a flat, fabric-style attribute record (see
//! [`ShapeRecord`]) so that it can be stored in the shared shape map and
//! re-instantiated on any peer from its `type` tag.

mod circle;
mod freehand;
mod image;
mod line;
mod rectangle;
mod record;
mod text;
mod triangle;

pub use circle::Circle;
pub use freehand::Freehand;
pub use image::{Image, ImageFormat};
pub use line::Line;
pub use record::{AttributeKey, ShapeRecord};
pub use rectangle::Rectangle;
pub use text::{FontFamily, FontWeight, Text};
pub use triangle::Triangle;

use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for shapes, stable across the shape's lifetime.
pub type ObjectId = Uuid;

/// Serializable color representation (RGBA8), stored as a CSS hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    /// Parse a hex color (`#rgb`, `#rrggbb` or `#rrggbbaa`).
    pub fn parse(color: &str) -> Option<Self> {
        let hex = color.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        match hex.len() {
            3 => Some(Self::new(
                channel(0..1)? * 17,
                channel(1..2)? * 17,
                channel(2..3)? * 17,
                255,
            )),
            6 => Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?, 255)),
            8 => Some(Self::new(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => None,
        }
    }

    /// Format as lowercase hex; the alpha channel is only written when not opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl fmt::Display for SerializableColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<SerializableColor> for String {
    fn from(color: SerializableColor) -> Self {
        color.to_hex()
    }
}

impl TryFrom<String> for SerializableColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid color: {value}"))
    }
}

/// Style properties shared by all shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeStyle {
    /// Fill color (None = no fill).
    #[serde(default)]
    pub fill: Option<SerializableColor>,
    /// Stroke color (None = no stroke).
    #[serde(default)]
    pub stroke: Option<SerializableColor>,
    /// Stroke width.
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_stroke_width() -> f64 {
    1.0
}

fn default_opacity() -> f64 {
    1.0
}

impl ShapeStyle {
    /// A filled style without stroke.
    pub fn filled(color: SerializableColor) -> Self {
        Self {
            fill: Some(color),
            ..Self::default()
        }
    }

    /// A stroked style without fill.
    pub fn stroked(color: SerializableColor, width: f64) -> Self {
        Self {
            fill: None,
            stroke: Some(color),
            stroke_width: width,
            opacity: 1.0,
        }
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            stroke_width: default_stroke_width(),
            opacity: default_opacity(),
        }
    }
}

/// The kind of a shape, doubling as its serialized `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    #[serde(rename = "rect")]
    Rectangle,
    #[serde(rename = "circle")]
    Circle,
    #[serde(rename = "triangle")]
    Triangle,
    #[serde(rename = "line")]
    Line,
    #[serde(rename = "i-text")]
    Text,
    #[serde(rename = "path")]
    Path,
    #[serde(rename = "image")]
    Image,
}

impl ShapeKind {
    /// The `type` tag used in shape records.
    pub fn tag(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rect",
            ShapeKind::Circle => "circle",
            ShapeKind::Triangle => "triangle",
            ShapeKind::Line => "line",
            ShapeKind::Text => "i-text",
            ShapeKind::Path => "path",
            ShapeKind::Image => "image",
        }
    }

    /// Look up a kind by its `type` tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "rect" => Some(ShapeKind::Rectangle),
            "circle" => Some(ShapeKind::Circle),
            "triangle" => Some(ShapeKind::Triangle),
            "line" => Some(ShapeKind::Line),
            "i-text" => Some(ShapeKind::Text),
            "path" => Some(ShapeKind::Path),
            "image" => Some(ShapeKind::Image),
            _ => None,
        }
    }
}

/// Properties for creating a shape from a pointer position.
#[derive(Debug, Clone)]
pub struct ShapeProps {
    /// Where the pointer went down.
    pub origin: Point,
    /// Base color; applied as fill or stroke depending on the kind.
    pub color: SerializableColor,
}

/// Common trait for all shapes.
pub trait ShapeTrait {
    /// Get the unique identifier.
    fn id(&self) -> ObjectId;

    /// Get the bounding box in canvas coordinates.
    fn bounds(&self) -> Rect;

    /// Check if a point hits this shape.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.bounds().inflate(tolerance, tolerance).contains(point)
    }

    /// Get the style.
    fn style(&self) -> &ShapeStyle;

    /// Get mutable style.
    fn style_mut(&mut self) -> &mut ShapeStyle;

    /// Apply a translate/scale transform.
    fn transform(&mut self, affine: Affine);

    /// Reshape while being drawn, from the pointer-down origin to the current pointer.
    fn reshape(&mut self, origin: Point, pointer: Point);

    /// Set the displayed size. Returns false if the shape has no settable size.
    fn set_size(&mut self, width: Option<f64>, height: Option<f64>) -> bool;
}

/// Enum wrapper for all shape types; serializes with its `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Shape {
    #[serde(rename = "rect")]
    Rectangle(Rectangle),
    #[serde(rename = "circle")]
    Circle(Circle),
    #[serde(rename = "triangle")]
    Triangle(Triangle),
    #[serde(rename = "line")]
    Line(Line),
    #[serde(rename = "i-text")]
    Text(Text),
    #[serde(rename = "path")]
    Freehand(Freehand),
    #[serde(rename = "image")]
    Image(Image),
}

macro_rules! dispatch {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            Shape::Rectangle($s) => $body,
            Shape::Circle($s) => $body,
            Shape::Triangle($s) => $body,
            Shape::Line($s) => $body,
            Shape::Text($s) => $body,
            Shape::Freehand($s) => $body,
            Shape::Image($s) => $body,
        }
    };
}

impl Shape {
    /// Create a shape of the given kind at the pointer, with its default size.
    ///
    /// Paths and images are not created from a pointer position and yield `None`.
    pub fn create(kind: ShapeKind, props: &ShapeProps) -> Option<Self> {
        let origin = props.origin;
        let shape = match kind {
            ShapeKind::Rectangle => {
                let mut rect = Rectangle::new(origin, 100.0, 100.0);
                rect.style = ShapeStyle::filled(props.color);
                Shape::Rectangle(rect)
            }
            ShapeKind::Triangle => {
                let mut triangle = Triangle::new(origin, 100.0, 100.0);
                triangle.style = ShapeStyle::filled(props.color);
                Shape::Triangle(triangle)
            }
            ShapeKind::Circle => {
                let mut circle = Circle::new(origin, 100.0);
                circle.style = ShapeStyle::filled(props.color);
                Shape::Circle(circle)
            }
            ShapeKind::Line => {
                let mut line = Line::new(origin, Point::new(origin.x + 100.0, origin.y + 100.0));
                line.style = ShapeStyle::stroked(props.color, 2.0);
                Shape::Line(line)
            }
            ShapeKind::Text => {
                let mut text = Text::new(origin, Text::PLACEHOLDER.to_string());
                text.style = ShapeStyle::filled(props.color);
                Shape::Text(text)
            }
            ShapeKind::Path | ShapeKind::Image => return None,
        };
        Some(shape)
    }

    pub fn id(&self) -> ObjectId {
        dispatch!(self, s => s.id())
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Rectangle(_) => ShapeKind::Rectangle,
            Shape::Circle(_) => ShapeKind::Circle,
            Shape::Triangle(_) => ShapeKind::Triangle,
            Shape::Line(_) => ShapeKind::Line,
            Shape::Text(_) => ShapeKind::Text,
            Shape::Freehand(_) => ShapeKind::Path,
            Shape::Image(_) => ShapeKind::Image,
        }
    }

    pub fn bounds(&self) -> Rect {
        dispatch!(self, s => s.bounds())
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        dispatch!(self, s => s.hit_test(point, tolerance))
    }

    pub fn style(&self) -> &ShapeStyle {
        dispatch!(self, s => s.style())
    }

    pub fn style_mut(&mut self) -> &mut ShapeStyle {
        dispatch!(self, s => s.style_mut())
    }

    pub fn transform(&mut self, affine: Affine) {
        dispatch!(self, s => s.transform(affine))
    }

    pub fn reshape(&mut self, origin: Point, pointer: Point) {
        dispatch!(self, s => s.reshape(origin, pointer))
    }

    pub fn set_size(&mut self, width: Option<f64>, height: Option<f64>) -> bool {
        dispatch!(self, s => s.set_size(width, height))
    }

    /// Get the text if this shape is a text.
    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Shape::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Get the mutable text if this shape is a text.
    pub fn as_text_mut(&mut self) -> Option<&mut Text> {
        match self {
            Shape::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Regenerate the shape's ID with a new unique identifier.
    /// Used when pasting so the copy never collides with its source.
    pub fn regenerate_id(&mut self) {
        let new_id = Uuid::new_v4();
        dispatch!(self, s => s.id = new_id)
    }
}

/// Distance from a point to a line segment (a to b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    (point - (a + seg * t)).hypot()
}

/// Minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| point_to_segment_dist(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}

/// Scale about a fixed anchor point.
pub fn scale_about(anchor: Point, sx: f64, sy: f64) -> Affine {
    Affine::translate(anchor.to_vec2())
        * Affine::scale_non_uniform(sx, sy)
        * Affine::translate(-anchor.to_vec2())
}

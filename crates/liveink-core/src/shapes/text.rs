//! Editable text shape.

use super::{ObjectId, ShapeStyle, ShapeTrait};
use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Font family options offered by the attribute panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontFamily {
    #[default]
    Helvetica,
    #[serde(rename = "Times New Roman")]
    TimesNewRoman,
    #[serde(rename = "Comic Sans MS")]
    ComicSans,
    #[serde(rename = "Brush Script MT")]
    BrushScript,
}

impl FontFamily {
    /// Font family name as stored in records.
    pub fn name(&self) -> &'static str {
        match self {
            FontFamily::Helvetica => "Helvetica",
            FontFamily::TimesNewRoman => "Times New Roman",
            FontFamily::ComicSans => "Comic Sans MS",
            FontFamily::BrushScript => "Brush Script MT",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|f| f.name() == name)
    }

    pub fn all() -> &'static [FontFamily] {
        &[
            FontFamily::Helvetica,
            FontFamily::TimesNewRoman,
            FontFamily::ComicSans,
            FontFamily::BrushScript,
        ]
    }
}

/// Font weight options, stored as CSS numeric weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontWeight {
    #[default]
    #[serde(rename = "400")]
    Normal,
    #[serde(rename = "600")]
    Semibold,
    #[serde(rename = "800")]
    Bold,
}

impl FontWeight {
    pub fn value(&self) -> &'static str {
        match self {
            FontWeight::Normal => "400",
            FontWeight::Semibold => "600",
            FontWeight::Bold => "800",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FontWeight::Normal => "Normal",
            FontWeight::Semibold => "Semibold",
            FontWeight::Bold => "Bold",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        Self::all().iter().copied().find(|w| w.value() == value)
    }

    pub fn all() -> &'static [FontWeight] {
        &[FontWeight::Normal, FontWeight::Semibold, FontWeight::Bold]
    }
}

/// A single text object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Text {
    #[serde(rename = "objectId")]
    pub(crate) id: ObjectId,
    /// Top-left corner of the text box.
    pub left: f64,
    pub top: f64,
    /// The text content.
    pub text: String,
    /// Font size in pixels.
    pub font_size: f64,
    #[serde(default)]
    pub font_family: FontFamily,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default)]
    pub angle: f64,
    #[serde(flatten)]
    pub style: ShapeStyle,
}

impl Text {
    pub const DEFAULT_FONT_SIZE: f64 = 36.0;

    /// Content of a freshly placed text object.
    pub const PLACEHOLDER: &'static str = "Tap to Type";

    pub fn new(position: Point, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            left: position.x,
            top: position.y,
            text,
            font_size: Self::DEFAULT_FONT_SIZE,
            font_family: FontFamily::default(),
            font_weight: FontWeight::default(),
            angle: 0.0,
            style: ShapeStyle::default(),
        }
    }

    /// Approximate width from the widest line.
    fn approximate_width(&self) -> f64 {
        let widest = self
            .text
            .lines()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        let char_width_factor = match self.font_weight {
            FontWeight::Normal => 0.52,
            FontWeight::Semibold => 0.55,
            FontWeight::Bold => 0.58,
        };
        widest as f64 * self.font_size * char_width_factor
    }

    fn approximate_height(&self) -> f64 {
        let lines = self.text.lines().count().max(1);
        lines as f64 * self.font_size * 1.16
    }
}

impl ShapeTrait for Text {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn bounds(&self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.left + self.approximate_width(),
            self.top + self.approximate_height(),
        )
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn transform(&mut self, affine: Affine) {
        let origin = affine * Point::new(self.left, self.top);
        self.left = origin.x;
        self.top = origin.y;
        self.font_size *= affine.as_coeffs()[3].abs();
    }

    fn reshape(&mut self, _origin: Point, _pointer: Point) {}

    fn set_size(&mut self, _width: Option<f64>, _height: Option<f64>) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_lookup() {
        assert_eq!(FontFamily::from_name("Comic Sans MS"), Some(FontFamily::ComicSans));
        assert_eq!(FontFamily::from_name("Papyrus"), None);
        assert_eq!(FontWeight::from_value("600"), Some(FontWeight::Semibold));
        assert_eq!(FontWeight::from_value("bold"), None);
    }

    #[test]
    fn test_bounds_grow_with_content() {
        let short = Text::new(Point::ZERO, "ab".to_string());
        let long = Text::new(Point::ZERO, "abcdef".to_string());
        assert!(long.bounds().width() > short.bounds().width());

        let two_lines = Text::new(Point::ZERO, "ab\ncd".to_string());
        assert!(two_lines.bounds().height() > short.bounds().height());
    }

    #[test]
    fn test_scale_changes_font_size() {
        let mut text = Text::new(Point::new(10.0, 10.0), Text::PLACEHOLDER.to_string());
        text.transform(super::super::scale_about(Point::new(10.0, 10.0), 1.0, 2.0));
        assert!((text.font_size - 72.0).abs() < f64::EPSILON);
    }
}

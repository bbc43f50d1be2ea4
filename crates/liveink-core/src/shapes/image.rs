//! Raster image shape.

use super::{ObjectId, ShapeStyle, ShapeTrait};
use base64::{Engine, engine::general_purpose::STANDARD};
use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Image format for stored image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }

    /// Detect format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(ImageFormat::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::Webp);
        }
        None
    }
}

/// An image placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(rename = "objectId")]
    pub(crate) id: ObjectId,
    pub left: f64,
    pub top: f64,
    /// Display width.
    pub width: f64,
    /// Display height.
    pub height: f64,
    /// Original size in pixels.
    pub source_width: u32,
    pub source_height: u32,
    pub format: ImageFormat,
    /// Base64 image payload.
    pub src: String,
    #[serde(flatten)]
    pub style: ShapeStyle,
}

impl Image {
    /// Create an image from raw bytes at its source size.
    pub fn new(
        position: Point,
        data: &[u8],
        source_width: u32,
        source_height: u32,
        format: ImageFormat,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            left: position.x,
            top: position.y,
            width: source_width as f64,
            height: source_height as f64,
            source_width,
            source_height,
            format,
            src: STANDARD.encode(data),
            style: ShapeStyle::default(),
        }
    }

    /// Scale to fit within the given box, preserving aspect ratio.
    pub fn fit_within(mut self, max_width: f64, max_height: f64) -> Self {
        if self.source_width == 0 || self.source_height == 0 {
            self.width = max_width;
            self.height = max_height;
            return self;
        }
        let aspect = self.source_width as f64 / self.source_height as f64;
        if aspect > max_width / max_height {
            self.width = max_width;
            self.height = max_width / aspect;
        } else {
            self.height = max_height;
            self.width = max_height * aspect;
        }
        self
    }

    /// Decoded image bytes, if the payload is valid base64.
    pub fn data(&self) -> Option<Vec<u8>> {
        STANDARD.decode(&self.src).ok()
    }
}

impl ShapeTrait for Image {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn bounds(&self) -> Rect {
        Rect::new(self.left, self.top, self.left + self.width, self.top + self.height)
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

    fn reshape(&mut self, _origin: Point, _pointer: Point) {}

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

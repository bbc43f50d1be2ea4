//! Flat attribute records for shared storage.

use super::{FontFamily, FontWeight, ObjectId, SerializableColor, Shape, ShapeKind};
use crate::scene::SceneError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A serialized shape: the attribute mapping plus its `objectId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    #[serde(rename = "objectId")]
    pub object_id: ObjectId,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ShapeRecord {
    /// The shape kind named by the `type` tag, if recognized.
    pub fn kind(&self) -> Option<ShapeKind> {
        self.attributes
            .get("type")
            .and_then(Value::as_str)
            .and_then(ShapeKind::from_tag)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// The record as a single JSON object including `objectId`.
    pub fn to_json(&self) -> Value {
        let mut map = self.attributes.clone();
        map.insert("objectId".to_string(), Value::String(self.object_id.to_string()));
        Value::Object(map)
    }

    pub fn from_json(value: Value) -> Result<Self, SceneError> {
        serde_json::from_value(value).map_err(|e| SceneError::MalformedRecord(e.to_string()))
    }
}

/// Attributes editable from the attribute panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    Width,
    Height,
    FontSize,
    FontFamily,
    FontWeight,
    Fill,
    Stroke,
}

impl AttributeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKey::Width => "width",
            AttributeKey::Height => "height",
            AttributeKey::FontSize => "fontSize",
            AttributeKey::FontFamily => "fontFamily",
            AttributeKey::FontWeight => "fontWeight",
            AttributeKey::Fill => "fill",
            AttributeKey::Stroke => "stroke",
        }
    }

    pub fn all() -> &'static [AttributeKey] {
        &[
            AttributeKey::Width,
            AttributeKey::Height,
            AttributeKey::FontSize,
            AttributeKey::FontFamily,
            AttributeKey::FontWeight,
            AttributeKey::Fill,
            AttributeKey::Stroke,
        ]
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeKey {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| SceneError::UnknownAttribute(s.to_string()))
    }
}

impl Shape {
    /// Serialize to a flat attribute record.
    pub fn to_record(&self) -> Result<ShapeRecord, SceneError> {
        let value =
            serde_json::to_value(self).map_err(|e| SceneError::MalformedRecord(e.to_string()))?;
        ShapeRecord::from_json(value)
    }

    /// Instantiate a shape from its record, dispatching on the `type` tag.
    pub fn from_record(record: &ShapeRecord) -> Result<Self, SceneError> {
        let tag = record
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SceneError::MalformedRecord("missing type tag".to_string()))?;
        if ShapeKind::from_tag(tag).is_none() {
            return Err(SceneError::UnknownShapeType(tag.to_string()));
        }
        serde_json::from_value(record.to_json())
            .map_err(|e| SceneError::MalformedRecord(e.to_string()))
    }

    /// Read an attribute as panel text. `None` when the shape does not carry it.
    pub fn attribute(&self, key: AttributeKey) -> Option<String> {
        match key {
            AttributeKey::Width => Some(format!("{}", self.bounds().width().round())),
            AttributeKey::Height => Some(format!("{}", self.bounds().height().round())),
            AttributeKey::Fill => self.style().fill.map(|c| c.to_hex()),
            AttributeKey::Stroke => self.style().stroke.map(|c| c.to_hex()),
            AttributeKey::FontSize => self.as_text().map(|t| format!("{}", t.font_size)),
            AttributeKey::FontFamily => self.as_text().map(|t| t.font_family.name().to_string()),
            AttributeKey::FontWeight => self.as_text().map(|t| t.font_weight.value().to_string()),
        }
    }

    /// Apply a panel edit. Returns whether the shape changed.
    ///
    /// Width and height are always applied; other keys are skipped when the
    /// value is already current.
    pub fn apply_attribute(&mut self, key: AttributeKey, value: &str) -> Result<bool, SceneError> {
        let invalid = || SceneError::InvalidAttribute {
            key,
            value: value.to_string(),
        };
        let unsupported = SceneError::UnsupportedAttribute {
            key,
            kind: self.kind(),
        };
        match key {
            AttributeKey::Width | AttributeKey::Height => {
                let size = parse_dimension(value).ok_or_else(invalid)?;
                let applied = if key == AttributeKey::Width {
                    self.set_size(Some(size), None)
                } else {
                    self.set_size(None, Some(size))
                };
                if applied { Ok(true) } else { Err(unsupported) }
            }
            AttributeKey::Fill | AttributeKey::Stroke => {
                let color = SerializableColor::parse(value).ok_or_else(invalid)?;
                let style = self.style_mut();
                let slot = if key == AttributeKey::Fill {
                    &mut style.fill
                } else {
                    &mut style.stroke
                };
                if *slot == Some(color) {
                    return Ok(false);
                }
                *slot = Some(color);
                Ok(true)
            }
            AttributeKey::FontSize => {
                let size = parse_dimension(value).ok_or_else(invalid)?;
                let text = self.as_text_mut().ok_or(unsupported)?;
                if text.font_size == size {
                    return Ok(false);
                }
                text.font_size = size;
                Ok(true)
            }
            AttributeKey::FontFamily => {
                let family = FontFamily::from_name(value).ok_or_else(invalid)?;
                let text = self.as_text_mut().ok_or(unsupported)?;
                if text.font_family == family {
                    return Ok(false);
                }
                text.font_family = family;
                Ok(true)
            }
            AttributeKey::FontWeight => {
                let weight = FontWeight::from_value(value).ok_or_else(invalid)?;
                let text = self.as_text_mut().ok_or(unsupported)?;
                if text.font_weight == weight {
                    return Ok(false);
                }
                text.font_weight = weight;
                Ok(true)
            }
        }
    }
}

fn parse_dimension(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

//! Session configuration.

use crate::shapes::SerializableColor;
use serde::{Deserialize, Serialize};

/// Tunables for a whiteboard session. Every field has a default, so a
/// partial JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Room to join.
    pub room_id: String,
    /// Initial canvas size.
    pub canvas_width: f64,
    pub canvas_height: f64,
    /// Reactions older than this are pruned.
    pub reaction_ttl_ms: u64,
    /// Period of the reaction prune timer.
    pub prune_interval_ms: u64,
    /// Period of the reaction emission timer.
    pub reaction_interval_ms: u64,
    /// Maximum cursor-chat message length in characters.
    pub chat_max_len: usize,
    /// Offset applied to pasted copies.
    pub paste_offset: f64,
    /// Inserted images are scaled to fit a square of this size.
    pub image_fit_size: f64,
    /// Color for newly drawn shapes.
    pub default_color: SerializableColor,
    pub brush_color: SerializableColor,
    pub brush_width: f64,
    pub undo_max_steps: usize,
    /// Local edits closer together than this are undone as one step.
    pub undo_merge_interval_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room_id: "liveink".to_string(),
            canvas_width: 1280.0,
            canvas_height: 800.0,
            reaction_ttl_ms: 4000,
            prune_interval_ms: 1000,
            reaction_interval_ms: 100,
            chat_max_len: 50,
            paste_offset: 20.0,
            image_fit_size: 200.0,
            default_color: SerializableColor::new(0xaa, 0xbb, 0xcc, 255),
            brush_color: SerializableColor::black(),
            brush_width: 5.0,
            undo_max_steps: 100,
            undo_merge_interval_ms: 300,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

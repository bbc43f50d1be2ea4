//! The attribute panel: form state for the selected shape.

use crate::room::SharedShapeMap;
use crate::scene::SceneAdapter;
use crate::shapes::{AttributeKey, ObjectId};
use crate::sync::modify_shape;
use serde::{Deserialize, Serialize};

/// Attributes of the selected shape as the panel shows them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementAttributes {
    pub width: String,
    pub height: String,
    pub font_size: String,
    pub font_family: String,
    pub font_weight: String,
    pub fill: String,
    pub stroke: String,
}

impl ElementAttributes {
    /// Read every attribute of a scene object. Attributes the object lacks are empty.
    pub fn from_scene<S: SceneAdapter + ?Sized>(scene: &S, id: ObjectId) -> Self {
        let mut attributes = Self::default();
        for &key in AttributeKey::all() {
            attributes.set(key, &scene.read_attribute(id, key).unwrap_or_default());
        }
        attributes
    }

    pub fn get(&self, key: AttributeKey) -> &str {
        match key {
            AttributeKey::Width => &self.width,
            AttributeKey::Height => &self.height,
            AttributeKey::FontSize => &self.font_size,
            AttributeKey::FontFamily => &self.font_family,
            AttributeKey::FontWeight => &self.font_weight,
            AttributeKey::Fill => &self.fill,
            AttributeKey::Stroke => &self.stroke,
        }
    }

    pub fn set(&mut self, key: AttributeKey, value: &str) {
        let slot = match key {
            AttributeKey::Width => &mut self.width,
            AttributeKey::Height => &mut self.height,
            AttributeKey::FontSize => &mut self.font_size,
            AttributeKey::FontFamily => &mut self.font_family,
            AttributeKey::FontWeight => &mut self.font_weight,
            AttributeKey::Fill => &mut self.fill,
            AttributeKey::Stroke => &mut self.stroke,
        };
        value.clone_into(slot);
    }
}

/// Reflects the selection into [`ElementAttributes`] and pushes edits back.
#[derive(Debug, Clone, Default)]
pub struct AttributePanel {
    attributes: ElementAttributes,
    editing: bool,
}

impl AttributePanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attributes(&self) -> &ElementAttributes {
        &self.attributes
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn on_selection_created<S: SceneAdapter + ?Sized>(&mut self, scene: &S, id: ObjectId) {
        self.attributes = ElementAttributes::from_scene(scene, id);
        self.editing = true;
    }

    pub fn on_selection_cleared(&mut self) {
        self.editing = false;
    }

    /// Live scaling only refreshes the dimensions. Storage is written once
    /// the gesture ends.
    pub fn on_scaling<S: SceneAdapter + ?Sized>(&mut self, scene: &S, id: ObjectId) {
        for key in [AttributeKey::Width, AttributeKey::Height] {
            if let Some(value) = scene.read_attribute(id, key) {
                self.attributes.set(key, &value);
            }
        }
    }

    /// A field changed: update the form, then apply and sync the edit.
    ///
    /// Returns whether storage was written.
    pub fn input_change<S, M>(
        &mut self,
        scene: &mut S,
        storage: &mut M,
        active_ref: &mut Option<ObjectId>,
        key: AttributeKey,
        value: &str,
    ) -> bool
    where
        S: SceneAdapter + ?Sized,
        M: SharedShapeMap + ?Sized,
    {
        self.editing = true;
        self.attributes.set(key, value);
        modify_shape(scene, storage, active_ref, key, value)
    }
}

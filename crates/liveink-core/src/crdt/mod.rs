//! CRDT storage for the shared shape map, backed by Loro.
//!
//! ```text
//! LoroDoc
//! └── "canvasObjects": LoroMap<objectId, record>
//! ```
//!
//! Each record is stored as a plain Loro map value converted from the
//! shape's JSON record, so a whole record is replaced on every write and
//! concurrent writes to the same key resolve last-writer-wins.

mod convert;

pub use convert::{json_to_loro, loro_to_json};
pub use loro::{ExportMode, VersionVector};

use crate::room::{RoomError, SharedShapeMap};
use crate::shapes::{ObjectId, ShapeRecord};
use loro::{LoroDoc, LoroMap, LoroValue, UndoManager, ValueOrContainer};

/// Key of the shape map in the document.
pub const CANVAS_OBJECTS_KEY: &str = "canvasObjects";

/// A Loro document holding the room's shapes, with a local undo manager.
pub struct CrdtDocument {
    doc: LoroDoc,
    undo_manager: UndoManager,
}

impl CrdtDocument {
    /// Create an empty document with the default undo settings.
    pub fn new() -> Self {
        Self::with_undo(100, 300)
    }

    /// Create an empty document; edits within `merge_interval_ms` are undone together.
    pub fn with_undo(max_steps: usize, merge_interval_ms: i64) -> Self {
        let doc = LoroDoc::new();
        let mut undo_manager = UndoManager::new(&doc);
        undo_manager.set_max_undo_steps(max_steps);
        undo_manager.set_merge_interval(merge_interval_ms);
        Self { doc, undo_manager }
    }

    pub fn from_snapshot(bytes: &[u8]) -> Result<Self, RoomError> {
        let crdt = Self::new();
        crdt.doc.import(bytes)?;
        Ok(crdt)
    }

    pub fn loro_doc(&self) -> &LoroDoc {
        &self.doc
    }

    fn objects_map(&self) -> LoroMap {
        self.doc.get_map(CANVAS_OBJECTS_KEY)
    }

    fn decode_entry(key: &str, value: &LoroValue) -> Option<(ObjectId, ShapeRecord)> {
        let id = match key.parse::<ObjectId>() {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Skipping shape with invalid key {key:?}: {e}");
                return None;
            }
        };
        match ShapeRecord::from_json(loro_to_json(value)) {
            Ok(record) => Some((id, record)),
            Err(e) => {
                log::warn!("Skipping undecodable shape {id}: {e}");
                None
            }
        }
    }

    /// Export the whole document.
    pub fn export_snapshot(&self) -> Result<Vec<u8>, RoomError> {
        self.doc
            .export(ExportMode::Snapshot)
            .map_err(|e| RoomError::Export(e.to_string()))
    }

    /// Export operations not covered by `since`.
    pub fn export_updates(&self, since: &VersionVector) -> Result<Vec<u8>, RoomError> {
        self.doc
            .export(ExportMode::updates(since))
            .map_err(|e| RoomError::Export(e.to_string()))
    }

    pub fn import(&mut self, bytes: &[u8]) -> Result<(), RoomError> {
        self.doc.import(bytes)?;
        Ok(())
    }

    /// Current version vector of the op log.
    pub fn version(&self) -> VersionVector {
        self.doc.oplog_vv()
    }

    // --- Undo/Redo API ---

    /// Undo the last change made by this peer.
    pub fn undo(&mut self) -> bool {
        match self.undo_manager.undo() {
            Ok(done) => done,
            Err(e) => {
                log::warn!("Undo failed: {e}");
                false
            }
        }
    }

    /// Redo the last undone change.
    pub fn redo(&mut self) -> bool {
        match self.undo_manager.redo() {
            Ok(done) => done,
            Err(e) => {
                log::warn!("Redo failed: {e}");
                false
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.undo_manager.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo_manager.can_redo()
    }
}

impl Default for CrdtDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedShapeMap for CrdtDocument {
    fn get(&self, id: ObjectId) -> Option<ShapeRecord> {
        let key = id.to_string();
        match self.objects_map().get(&key)? {
            ValueOrContainer::Value(value) => Self::decode_entry(&key, &value).map(|(_, r)| r),
            ValueOrContainer::Container(_) => None,
        }
    }

    fn set(&mut self, id: ObjectId, record: &ShapeRecord) -> Result<(), RoomError> {
        let value = json_to_loro(&record.to_json());
        self.objects_map().insert(&id.to_string(), value)?;
        self.doc.commit();
        Ok(())
    }

    fn delete_key(&mut self, key: &str) -> Result<bool, RoomError> {
        let objects = self.objects_map();
        if objects.get(key).is_none() {
            return Ok(false);
        }
        objects.delete(key)?;
        self.doc.commit();
        Ok(true)
    }

    fn entries(&self) -> Vec<(ObjectId, ShapeRecord)> {
        let LoroValue::Map(map) = self.objects_map().get_deep_value() else {
            return Vec::new();
        };
        let mut entries: Vec<_> = map
            .iter()
            .filter_map(|(key, value)| Self::decode_entry(key, value))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    fn keys(&self) -> Vec<String> {
        let LoroValue::Map(map) = self.objects_map().get_deep_value() else {
            return Vec::new();
        };
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn size(&self) -> usize {
        self.objects_map().len()
    }
}

//! The mutation funnel between the scene and shared storage.
//!
//! Every storage write goes through [`sync_shape_in_storage`],
//! [`delete_shape_from_storage`] or [`delete_all_shapes`]. Replay
//! ([`render_canvas`]) borrows storage immutably and writes the scene through
//! its non-emitting path, so applying remote state can never feed back into
//! storage.

use crate::room::SharedShapeMap;
use crate::scene::SceneAdapter;
use crate::shapes::{AttributeKey, ObjectId};
use std::collections::HashSet;

/// Serialize a scene object and upsert it under its id.
///
/// Returns whether a write was issued: missing objects and records identical
/// to the stored one are skipped.
pub fn sync_shape_in_storage<S, M>(scene: &S, storage: &mut M, id: ObjectId) -> bool
where
    S: SceneAdapter + ?Sized,
    M: SharedShapeMap + ?Sized,
{
    let record = match scene.to_attribute_record(id) {
        Ok(record) => record,
        Err(e) => {
            log::debug!("Not syncing {id}: {e}");
            return false;
        }
    };
    if storage.get(id).as_ref() == Some(&record) {
        return false;
    }
    match storage.set(id, &record) {
        Ok(()) => {
            log::debug!("Synced shape {id}");
            true
        }
        Err(e) => {
            log::warn!("Failed to store shape {id}: {e}");
            false
        }
    }
}

/// Remove a key from storage. Absent keys are a no-op.
pub fn delete_shape_from_storage<M>(storage: &mut M, id: ObjectId) -> bool
where
    M: SharedShapeMap + ?Sized,
{
    match storage.delete(id) {
        Ok(removed) => removed,
        Err(e) => {
            log::warn!("Failed to delete shape {id}: {e}");
            false
        }
    }
}

/// Delete every key. Returns whether storage is empty afterward.
///
/// Not atomic: the first failing delete stops the sweep and keys already
/// removed stay removed.
pub fn delete_all_shapes<M>(storage: &mut M) -> bool
where
    M: SharedShapeMap + ?Sized,
{
    if storage.is_empty() {
        return true;
    }
    for key in storage.keys() {
        if let Err(e) = storage.delete_key(&key) {
            log::warn!("Stopped clearing storage at {key}: {e}");
            return false;
        }
    }
    storage.is_empty()
}

/// Outcome of a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Replay {
    /// Scene objects created or replaced.
    pub applied: usize,
    /// Scene objects removed because their key is gone.
    pub removed: usize,
    /// Records that could not be instantiated.
    pub skipped: usize,
}

/// Replay the shared map onto the scene.
///
/// Objects are instantiated from their `type` tag in key order. Scene objects
/// without a key are removed, except `in_progress` (a shape still being drawn).
/// Afterwards the selection is moved to `active` if it still exists, or cleared.
pub fn render_canvas<S, M>(
    scene: &mut S,
    storage: &M,
    active: Option<ObjectId>,
    in_progress: Option<ObjectId>,
) -> Replay
where
    S: SceneAdapter + ?Sized,
    M: SharedShapeMap + ?Sized,
{
    let mut replay = Replay::default();
    let mut live = HashSet::new();

    for (id, record) in storage.entries() {
        live.insert(id);
        if scene.to_attribute_record(id).ok().as_ref() == Some(&record) {
            continue;
        }
        match scene.upsert_from_record(&record) {
            Ok(_) => replay.applied += 1,
            Err(e) => {
                log::warn!("Skipping shape {id} during replay: {e}");
                replay.skipped += 1;
            }
        }
    }

    for id in scene.object_ids() {
        if !live.contains(&id) && Some(id) != in_progress {
            scene.remove(id);
            replay.removed += 1;
        }
    }

    let restored = active.filter(|id| scene.get(*id).is_some());
    scene.set_active_object(restored);

    if replay != Replay::default() {
        log::debug!(
            "Replayed storage: {} applied, {} removed, {} skipped",
            replay.applied,
            replay.removed,
            replay.skipped
        );
    }
    replay
}

/// Apply a panel edit to the active object and sync it immediately.
///
/// Records the object in `active_ref`. Returns whether storage was written.
pub fn modify_shape<S, M>(
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
    let Some(id) = scene.active_object() else {
        return false;
    };
    if let Err(e) = scene.apply_attribute(id, key, value) {
        log::debug!("Ignoring {key}={value:?} on {id}: {e}");
        return false;
    }
    *active_ref = Some(id);
    sync_shape_in_storage(scene, storage, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::{CANVAS_OBJECTS_KEY, CrdtDocument};
    use crate::room::RoomError;
    use crate::scene::{Scene, SceneEventKind};
    use crate::shapes::{Rectangle, Shape, ShapeRecord};
    use kurbo::Point;
    use std::collections::BTreeMap;

    /// Map that counts writes and can be told to fail deletes.
    #[derive(Default)]
    struct CountingMap {
        records: BTreeMap<ObjectId, ShapeRecord>,
        writes: usize,
        fail_delete_after: Option<usize>,
        deletes: usize,
    }

    impl SharedShapeMap for CountingMap {
        fn get(&self, id: ObjectId) -> Option<ShapeRecord> {
            self.records.get(&id).cloned()
        }

        fn set(&mut self, id: ObjectId, record: &ShapeRecord) -> Result<(), RoomError> {
            self.writes += 1;
            self.records.insert(id, record.clone());
            Ok(())
        }

        fn delete_key(&mut self, key: &str) -> Result<bool, RoomError> {
            if self.fail_delete_after == Some(self.deletes) {
                return Err(RoomError::NotInRoom);
            }
            self.deletes += 1;
            self.writes += 1;
            let Ok(id) = key.parse::<ObjectId>() else {
                return Ok(false);
            };
            Ok(self.records.remove(&id).is_some())
        }

        fn entries(&self) -> Vec<(ObjectId, ShapeRecord)> {
            self.records.iter().map(|(k, v)| (*k, v.clone())).collect()
        }

        fn keys(&self) -> Vec<String> {
            self.records.keys().map(ObjectId::to_string).collect()
        }

        fn size(&self) -> usize {
            self.records.len()
        }
    }

    fn scene_with_rect(x: f64) -> (Scene, ObjectId) {
        let mut scene = Scene::new(800.0, 600.0);
        let id = scene.add(Shape::Rectangle(Rectangle::new(Point::new(x, 0.0), 100.0, 100.0)));
        (scene, id)
    }

    #[test]
    fn test_sync_writes_once_for_identical_records() {
        let (scene, id) = scene_with_rect(0.0);
        let mut storage = CountingMap::default();
        assert!(sync_shape_in_storage(&scene, &mut storage, id));
        assert!(!sync_shape_in_storage(&scene, &mut storage, id));
        assert_eq!(storage.writes, 1);
        assert_eq!(storage.size(), 1);
    }

    #[test]
    fn test_sync_keeps_last_record() {
        let (mut scene, id) = scene_with_rect(0.0);
        let mut storage = CrdtDocument::new();
        sync_shape_in_storage(&scene, &mut storage, id);
        scene
            .transform(id, kurbo::Affine::translate((30.0, 0.0)))
            .unwrap();
        sync_shape_in_storage(&scene, &mut storage, id);

        assert_eq!(storage.size(), 1);
        assert_eq!(storage.get(id), scene.to_attribute_record(id).ok());
    }

    #[test]
    fn test_sync_missing_object_is_noop() {
        let scene = Scene::new(800.0, 600.0);
        let mut storage = CountingMap::default();
        assert!(!sync_shape_in_storage(&scene, &mut storage, uuid::Uuid::new_v4()));
        assert_eq!(storage.writes, 0);
    }

    #[test]
    fn test_delete_absent_key_is_noop() {
        let mut storage = CountingMap::default();
        assert!(!delete_shape_from_storage(&mut storage, uuid::Uuid::new_v4()));
    }

    #[test]
    fn test_delete_all_on_empty_has_no_side_effects() {
        let mut storage = CountingMap::default();
        assert!(delete_all_shapes(&mut storage));
        assert_eq!(storage.writes, 0);
    }

    #[test]
    fn test_delete_all_removes_everything() {
        let mut storage = CrdtDocument::new();
        for x in [0.0, 200.0, 400.0] {
            let (scene, id) = scene_with_rect(x);
            sync_shape_in_storage(&scene, &mut storage, id);
        }
        assert!(delete_all_shapes(&mut storage));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_delete_all_removes_undecodable_keys() {
        let mut storage = CrdtDocument::new();
        for x in [0.0, 200.0] {
            let (scene, id) = scene_with_rect(x);
            sync_shape_in_storage(&scene, &mut storage, id);
        }
        storage
            .loro_doc()
            .get_map(CANVAS_OBJECTS_KEY)
            .insert("legacy-id", loro::LoroValue::from("junk"))
            .unwrap();
        storage.loro_doc().commit();
        assert_eq!(storage.size(), 3);

        assert!(delete_all_shapes(&mut storage));
        assert!(storage.is_empty());
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn test_delete_all_stops_at_first_failure() {
        let mut storage = CountingMap {
            fail_delete_after: Some(1),
            ..CountingMap::default()
        };
        for x in [0.0, 200.0, 400.0] {
            let (scene, id) = scene_with_rect(x);
            sync_shape_in_storage(&scene, &mut storage, id);
        }
        assert!(!delete_all_shapes(&mut storage));
        assert_eq!(storage.size(), 2);
    }

    #[test]
    fn test_replay_issues_no_writes_or_events() {
        let (source, id) = scene_with_rect(10.0);
        let mut storage = CountingMap::default();
        sync_shape_in_storage(&source, &mut storage, id);
        let writes = storage.writes;

        let mut scene = Scene::new(800.0, 600.0);
        for kind in SceneEventKind::all() {
            scene.on(*kind);
        }
        let replay = render_canvas(&mut scene, &storage, None, None);
        assert_eq!(replay.applied, 1);
        assert_eq!(storage.writes, writes);
        assert!(scene.poll_events().is_empty());
        assert_eq!(scene.to_attribute_record(id).ok(), storage.get(id));

        // Replaying the same state again changes nothing.
        assert_eq!(render_canvas(&mut scene, &storage, None, None), Replay::default());
    }

    #[test]
    fn test_replay_removes_stale_but_keeps_in_progress() {
        let (mut scene, stale) = scene_with_rect(0.0);
        let drawing = scene.add(Shape::Rectangle(Rectangle::new(Point::ZERO, 5.0, 5.0)));
        let storage = CountingMap::default();

        let replay = render_canvas(&mut scene, &storage, None, Some(drawing));
        assert_eq!(replay.removed, 1);
        assert!(scene.get(stale).is_none());
        assert!(scene.get(drawing).is_some());
    }

    #[test]
    fn test_replay_restores_selection() {
        let (source, id) = scene_with_rect(0.0);
        let mut storage = CountingMap::default();
        sync_shape_in_storage(&source, &mut storage, id);

        let mut scene = Scene::new(800.0, 600.0);
        render_canvas(&mut scene, &storage, Some(id), None);
        assert_eq!(scene.active_object(), Some(id));

        render_canvas(&mut scene, &storage, Some(uuid::Uuid::new_v4()), None);
        assert_eq!(scene.active_object(), None);
    }

    #[test]
    fn test_replay_skips_unknown_types() {
        let mut storage = CountingMap::default();
        let id = uuid::Uuid::new_v4();
        let record = ShapeRecord::from_json(serde_json::json!({
            "objectId": id.to_string(),
            "type": "hexagon",
        }))
        .unwrap();
        storage.records.insert(id, record);

        let mut scene = Scene::new(800.0, 600.0);
        let replay = render_canvas(&mut scene, &storage, None, None);
        assert_eq!(replay.skipped, 1);
        assert!(scene.is_empty());
    }

    #[test]
    fn test_modify_shape_applies_and_syncs() {
        let (mut scene, id) = scene_with_rect(0.0);
        let mut storage = CountingMap::default();
        let mut active_ref = None;

        assert!(!modify_shape(&mut scene, &mut storage, &mut active_ref, AttributeKey::Fill, "#ff0000"));
        scene.set_active_object(Some(id));
        assert!(modify_shape(&mut scene, &mut storage, &mut active_ref, AttributeKey::Fill, "#ff0000"));
        assert_eq!(active_ref, Some(id));
        assert_eq!(
            storage.get(id).unwrap().get("fill"),
            Some(&serde_json::Value::from("#ff0000"))
        );

        assert!(!modify_shape(&mut scene, &mut storage, &mut active_ref, AttributeKey::Fill, "nope"));
        assert_eq!(storage.writes, 1);
    }
}

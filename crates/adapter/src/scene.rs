//! Per-session scene buffer.
//!
//! Holds the scene objects and avatars an orchestrator pushed into a session,
//! the frame counter and a short history of applied updates.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::RwLock;

use mmi_domain::{Avatar, SceneObject, SceneUpdate};

/// Number of applied updates kept for `scene_update(frame_id)`.
pub const HISTORY_LEN: usize = 20;

#[derive(Default)]
struct SceneState {
    objects: BTreeMap<String, SceneObject>,
    avatars: BTreeMap<String, Avatar>,
    frame_id: u64,
    last_update: SceneUpdate,
    history: VecDeque<(u64, SceneUpdate)>,
}

#[derive(Default)]
pub struct SceneBuffer {
    state: RwLock<SceneState>,
}

impl SceneBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `update` and return per-item diagnostics.
    ///
    /// Items that cannot be applied are skipped and reported; the rest of the
    /// update still goes through.
    pub fn apply(&self, update: SceneUpdate) -> Vec<String> {
        let mut diagnostics = Vec::new();
        let mut state = self.state.write();

        for avatar in &update.added_avatars {
            if state.avatars.contains_key(&avatar.id) {
                diagnostics.push(format!(
                    "Cannot add avatar {}, avatar is already registered",
                    avatar.id
                ));
                continue;
            }
            state.avatars.insert(avatar.id.clone(), avatar.clone());
        }

        for object in &update.added_scene_objects {
            if state.objects.contains_key(&object.id) {
                diagnostics.push(format!(
                    "Cannot add scene object {}, object is already registered",
                    object.id
                ));
                continue;
            }
            state.objects.insert(object.id.clone(), object.clone());
        }

        for change in &update.changed_avatars {
            let Some(avatar) = state.avatars.get_mut(&change.id) else {
                diagnostics.push(format!(
                    "Cannot update avatar {}, avatar is not available",
                    change.id
                ));
                continue;
            };
            if let Some(posture) = &change.posture_values {
                avatar.posture_values = posture.clone();
            }
            if let Some(description) = &change.description {
                avatar.description = description.clone();
            }
        }

        for change in &update.changed_scene_objects {
            let Some(object) = state.objects.get_mut(&change.id) else {
                diagnostics.push(format!(
                    "Cannot update scene object {}, object is not available",
                    change.id
                ));
                continue;
            };
            if let Some(name) = &change.name {
                object.name = name.clone();
            }
            if let Some(transform) = &change.transform {
                object.transform = transform.clone();
            }
            if let Some(properties) = &change.properties {
                object.properties = properties.clone();
            }
        }

        for id in &update.removed_avatars {
            if state.avatars.remove(id).is_none() {
                diagnostics.push(format!(
                    "Cannot remove avatar {id}, avatar is not available"
                ));
            }
        }

        for id in &update.removed_scene_objects {
            if state.objects.remove(id).is_none() {
                diagnostics.push(format!(
                    "Cannot remove scene object {id}, object is not available"
                ));
            }
        }

        state.frame_id += 1;
        let frame_id = state.frame_id;
        state.history.push_back((frame_id, update.clone()));
        while state.history.len() > HISTORY_LEN {
            state.history.pop_front();
        }
        state.last_update = update;

        diagnostics
    }

    /// The update applied by the most recent `apply`.
    pub fn scene_changes(&self) -> SceneUpdate {
        self.state.read().last_update.clone()
    }

    /// The whole scene expressed as one update of added items.
    pub fn full_scene(&self) -> SceneUpdate {
        let state = self.state.read();
        SceneUpdate {
            added_scene_objects: state.objects.values().cloned().collect(),
            added_avatars: state.avatars.values().cloned().collect(),
            ..Default::default()
        }
    }

    pub fn scene_objects(&self) -> Vec<SceneObject> {
        self.state.read().objects.values().cloned().collect()
    }

    pub fn avatars(&self) -> Vec<Avatar> {
        self.state.read().avatars.values().cloned().collect()
    }

    pub fn scene_object(&self, id: &str) -> Option<SceneObject> {
        self.state.read().objects.get(id).cloned()
    }

    /// Update applied at `frame_id`, if still in the history window.
    pub fn scene_update(&self, frame_id: u64) -> Option<SceneUpdate> {
        self.state
            .read()
            .history
            .iter()
            .find(|(frame, _)| *frame == frame_id)
            .map(|(_, update)| update.clone())
    }

    pub fn frame_id(&self) -> u64 {
        self.state.read().frame_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmi_domain::{SceneObjectUpdate, Transform, Vec3};

    fn object(id: &str) -> SceneObject {
        SceneObject {
            id: id.into(),
            name: id.into(),
            transform: Transform::at(id, Vec3::ZERO),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_adds_and_reports_duplicates() {
        let scene = SceneBuffer::new();
        let diagnostics = scene.apply(SceneUpdate {
            added_scene_objects: vec![object("box"), object("box")],
            ..Default::default()
        });

        assert_eq!(scene.scene_objects().len(), 1);
        assert_eq!(
            diagnostics,
            vec!["Cannot add scene object box, object is already registered".to_string()]
        );
        assert_eq!(scene.frame_id(), 1);
    }

    #[test]
    fn test_change_of_unknown_object_is_reported() {
        let scene = SceneBuffer::new();
        let diagnostics = scene.apply(SceneUpdate {
            changed_scene_objects: vec![SceneObjectUpdate {
                id: "ghost".into(),
                ..Default::default()
            }],
            ..Default::default()
        });
        assert_eq!(
            diagnostics,
            vec!["Cannot update scene object ghost, object is not available".to_string()]
        );
    }

    #[test]
    fn test_change_then_remove() {
        let scene = SceneBuffer::new();
        scene.apply(SceneUpdate {
            added_scene_objects: vec![object("box")],
            ..Default::default()
        });
        scene.apply(SceneUpdate {
            changed_scene_objects: vec![SceneObjectUpdate {
                id: "box".into(),
                transform: Some(Transform::at("box", Vec3::new(1.0, 2.0, 3.0))),
                ..Default::default()
            }],
            ..Default::default()
        });
        let moved = scene.scene_object("box").unwrap();
        assert_eq!(moved.transform.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(moved.name, "box");

        let diagnostics = scene.apply(SceneUpdate {
            removed_scene_objects: vec!["box".into()],
            ..Default::default()
        });
        assert!(diagnostics.is_empty());
        assert!(scene.scene_objects().is_empty());
        assert_eq!(scene.scene_changes().removed_scene_objects, vec!["box"]);
    }

    #[test]
    fn test_history_is_bounded() {
        let scene = SceneBuffer::new();
        for _ in 0..(HISTORY_LEN + 5) {
            scene.apply(SceneUpdate::default());
        }
        assert!(scene.scene_update(1).is_none());
        assert!(scene.scene_update(scene.frame_id()).is_some());
        assert!(scene.scene_update(6).is_some());
    }

    #[test]
    fn test_full_scene_contains_everything() {
        let scene = SceneBuffer::new();
        scene.apply(SceneUpdate {
            added_scene_objects: vec![object("a"), object("b")],
            added_avatars: vec![Avatar {
                id: "avatar".into(),
                ..Default::default()
            }],
            ..Default::default()
        });
        let full = scene.full_scene();
        assert_eq!(full.added_scene_objects.len(), 2);
        assert_eq!(full.added_avatars.len(), 1);
        assert!(full.removed_scene_objects.is_empty());
    }
}

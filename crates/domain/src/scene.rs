//! Scene graph vocabulary exchanged through PushScene / GetScene.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::avatar::{Avatar, AvatarUpdate};
use crate::math::Transform;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: String,
    pub name: String,
    pub transform: Transform,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// Partial update of a scene object; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneObjectUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, String>>,
}

/// Delta between two scene frames.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneUpdate {
    #[serde(default)]
    pub added_scene_objects: Vec<SceneObject>,
    #[serde(default)]
    pub changed_scene_objects: Vec<SceneObjectUpdate>,
    #[serde(default)]
    pub removed_scene_objects: Vec<String>,
    #[serde(default)]
    pub added_avatars: Vec<Avatar>,
    #[serde(default)]
    pub changed_avatars: Vec<AvatarUpdate>,
    #[serde(default)]
    pub removed_avatars: Vec<String>,
}

impl SceneUpdate {
    pub fn is_empty(&self) -> bool {
        self.added_scene_objects.is_empty()
            && self.changed_scene_objects.is_empty()
            && self.removed_scene_objects.is_empty()
            && self.added_avatars.is_empty()
            && self.changed_avatars.is_empty()
            && self.removed_avatars.is_empty()
    }
}

/// Change a unit asks the orchestrator to apply to the scene.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneManipulation {
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

//! Avatar descriptions and posture values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Flat posture vector of one avatar.
///
/// The first three values are the root position; the remaining values are
/// joint rotations in the avatar's intermediate skeleton order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AvatarPostureValues {
    pub avatar_id: String,
    pub posture_data: Vec<f64>,
}

impl AvatarPostureValues {
    pub fn new(avatar_id: impl Into<String>, posture_data: Vec<f64>) -> Self {
        Self {
            avatar_id: avatar_id.into(),
            posture_data,
        }
    }

    pub fn root_position(&self) -> Vec3 {
        let value = |i: usize| self.posture_data.get(i).copied().unwrap_or(0.0);
        Vec3::new(value(0), value(1), value(2))
    }

    /// Copy of these values with the root moved to `position`.
    pub fn with_root_position(&self, position: Vec3) -> Self {
        let mut data = self.posture_data.clone();
        if data.len() < 3 {
            data.resize(3, 0.0);
        }
        data[0] = position.x;
        data[1] = position.y;
        data[2] = position.z;
        Self {
            avatar_id: self.avatar_id.clone(),
            posture_data: data,
        }
    }
}

/// Static description of an avatar (anthropometry and zero posture).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AvatarDescription {
    pub avatar_id: String,
    pub name: String,
    pub zero_posture: AvatarPostureValues,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// Avatar as it exists inside a scene.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Avatar {
    pub id: String,
    pub name: String,
    pub description: AvatarDescription,
    pub posture_values: AvatarPostureValues,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// Partial update of a scene avatar.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AvatarUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posture_values: Option<AvatarPostureValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<AvatarDescription>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_position_of_short_vector() {
        let posture = AvatarPostureValues::new("a", vec![1.0]);
        assert_eq!(posture.root_position(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_with_root_position_keeps_joints() {
        let posture = AvatarPostureValues::new("a", vec![0.0, 0.0, 0.0, 0.5, 0.25]);
        let moved = posture.with_root_position(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(moved.posture_data, vec![1.0, 2.0, 3.0, 0.5, 0.25]);
        assert_eq!(moved.avatar_id, "a");
    }
}

//! Minimal geometry vocabulary for scene objects and postures.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scale(self, factor: f64) -> Vec3 {
        Vec3::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f64 {
        self.sub(other).length()
    }

    /// Step from `self` toward `target` by at most `max_distance`.
    pub fn move_toward(self, target: Vec3, max_distance: f64) -> Vec3 {
        let delta = target.sub(self);
        let length = delta.length();
        if length <= max_distance || length == 0.0 {
            target
        } else {
            self.add(delta.scale(max_distance / length))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub id: String,
    pub position: Vec3,
    pub rotation: Quaternion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Transform {
    pub fn at(id: impl Into<String>, position: Vec3) -> Self {
        Self {
            id: id.into(),
            position,
            rotation: Quaternion::IDENTITY,
            parent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_toward_clamps_to_target() {
        let from = Vec3::ZERO;
        let to = Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(from.move_toward(to, 5.0), to);
    }

    #[test]
    fn test_move_toward_partial_step() {
        let from = Vec3::ZERO;
        let to = Vec3::new(0.0, 0.0, 10.0);
        let next = from.move_toward(to, 2.5);
        assert!((next.z - 2.5).abs() < 1e-9);
        assert!((next.distance(to) - 7.5).abs() < 1e-9);
    }
}

//! Unit (MMU) descriptions, instructions and simulation exchange types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::avatar::AvatarPostureValues;
use crate::math::Transform;
use crate::scene::SceneManipulation;

/// Event type a unit emits when its current instruction is finished.
pub const END_EVENT: &str = "end";

/// Event type a unit emits when an instruction starts.
pub const START_EVENT: &str = "start";

/// Declared parameter of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// Static description of a loadable unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MmuDescription {
    pub id: String,
    pub name: String,
    pub motion_type: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub version: String,
    /// Implementation key the adapter resolves in its unit registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly_name: Option<String>,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub parameters: Vec<UnitParameter>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl MmuDescription {
    /// Registry key for this description.
    pub fn factory_key(&self) -> &str {
        self.assembly_name.as_deref().unwrap_or(&self.name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &UnitParameter> {
        self.parameters.iter().filter(|p| p.required)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Transform>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// Motion request assigned to a unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Instruction {
    pub id: String,
    pub name: String,
    pub motion_type: String,
    #[serde(default)]
    pub avatar_id: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_condition: Option<String>,
}

impl Instruction {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimulationEvent {
    pub name: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Instruction id the event refers to.
    pub reference: String,
}

impl SimulationEvent {
    pub fn end(name: impl Into<String>, instruction_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            event_type: END_EVENT.to_string(),
            reference: instruction_id.into(),
        }
    }

    pub fn start(name: impl Into<String>, instruction_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            event_type: START_EVENT.to_string(),
            reference: instruction_id.into(),
        }
    }

    pub fn is_end(&self) -> bool {
        self.event_type == END_EVENT
    }
}

/// Posture and scene context handed to a unit each frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationState {
    pub initial: AvatarPostureValues,
    pub current: AvatarPostureValues,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub scene_manipulations: Vec<SceneManipulation>,
    #[serde(default)]
    pub events: Vec<SimulationEvent>,
}

impl SimulationState {
    pub fn at(posture: AvatarPostureValues) -> Self {
        Self {
            initial: posture.clone(),
            current: posture,
            ..Default::default()
        }
    }
}

/// Output of one DoStep.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationResult {
    pub posture: AvatarPostureValues,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub events: Vec<SimulationEvent>,
    #[serde(default)]
    pub scene_manipulations: Vec<SceneManipulation>,
    #[serde(default)]
    pub log_data: Vec<String>,
}

impl SimulationResult {
    pub fn finished(&self, instruction_id: &str) -> bool {
        self.events
            .iter()
            .any(|e| e.is_end() && e.reference == instruction_id)
    }
}

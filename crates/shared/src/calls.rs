//! RPC calls accepted by an adapter.
//!
//! One variant per method of [`crate::AdapterService`]. Session ids stay raw
//! strings here: validating them is the adapter's job, so that a malformed id
//! comes back as a structured failure instead of a decode error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use mmi_domain::{AvatarDescription, Checkpoint, Instruction, SceneUpdate, SimulationState};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum AdapterCall {
    CreateSession {
        session_id: String,
    },
    CloseSession {
        session_id: String,
    },
    GetLoadableMmus {
        session_id: String,
    },
    GetMmus {
        session_id: String,
    },
    LoadMmus {
        unit_ids: Vec<String>,
        session_id: String,
    },
    Initialize {
        avatar_description: AvatarDescription,
        #[serde(default)]
        properties: HashMap<String, String>,
        unit_id: String,
        session_id: String,
    },
    AssignInstruction {
        instruction: Instruction,
        simulation_state: SimulationState,
        unit_id: String,
        session_id: String,
    },
    DoStep {
        time: f64,
        simulation_state: SimulationState,
        unit_id: String,
        session_id: String,
    },
    Abort {
        instruction_id: String,
        unit_id: String,
        session_id: String,
    },
    CheckPrerequisites {
        instruction: Instruction,
        unit_id: String,
        session_id: String,
    },
    GetBoundaryConstraints {
        instruction: Instruction,
        unit_id: String,
        session_id: String,
    },
    CreateCheckpoint {
        unit_id: String,
        session_id: String,
    },
    RestoreCheckpoint {
        unit_id: String,
        session_id: String,
        checkpoint: Checkpoint,
    },
    ExecuteFunction {
        name: String,
        #[serde(default)]
        parameters: HashMap<String, String>,
        unit_id: String,
        session_id: String,
    },
    Dispose {
        unit_id: String,
        session_id: String,
    },
    GetDescription {
        unit_id: String,
        session_id: String,
    },
    PushScene {
        scene_update: SceneUpdate,
        session_id: String,
    },
    GetScene {
        session_id: String,
    },
    GetSceneChanges {
        session_id: String,
    },
    GetStatus,
    GetAdapterDescription,
}

impl AdapterCall {
    /// Method name, used in log fields.
    pub fn method(&self) -> &'static str {
        match self {
            Self::CreateSession { .. } => "CreateSession",
            Self::CloseSession { .. } => "CloseSession",
            Self::GetLoadableMmus { .. } => "GetLoadableMmus",
            Self::GetMmus { .. } => "GetMmus",
            Self::LoadMmus { .. } => "LoadMmus",
            Self::Initialize { .. } => "Initialize",
            Self::AssignInstruction { .. } => "AssignInstruction",
            Self::DoStep { .. } => "DoStep",
            Self::Abort { .. } => "Abort",
            Self::CheckPrerequisites { .. } => "CheckPrerequisites",
            Self::GetBoundaryConstraints { .. } => "GetBoundaryConstraints",
            Self::CreateCheckpoint { .. } => "CreateCheckpoint",
            Self::RestoreCheckpoint { .. } => "RestoreCheckpoint",
            Self::ExecuteFunction { .. } => "ExecuteFunction",
            Self::Dispose { .. } => "Dispose",
            Self::GetDescription { .. } => "GetDescription",
            Self::PushScene { .. } => "PushScene",
            Self::GetScene { .. } => "GetScene",
            Self::GetSceneChanges { .. } => "GetSceneChanges",
            Self::GetStatus => "GetStatus",
            Self::GetAdapterDescription => "GetAdapterDescription",
        }
    }

    /// Session addressed by the call, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::CreateSession { session_id }
            | Self::CloseSession { session_id }
            | Self::GetLoadableMmus { session_id }
            | Self::GetMmus { session_id }
            | Self::LoadMmus { session_id, .. }
            | Self::Initialize { session_id, .. }
            | Self::AssignInstruction { session_id, .. }
            | Self::DoStep { session_id, .. }
            | Self::Abort { session_id, .. }
            | Self::CheckPrerequisites { session_id, .. }
            | Self::GetBoundaryConstraints { session_id, .. }
            | Self::CreateCheckpoint { session_id, .. }
            | Self::RestoreCheckpoint { session_id, .. }
            | Self::ExecuteFunction { session_id, .. }
            | Self::Dispose { session_id, .. }
            | Self::GetDescription { session_id, .. }
            | Self::PushScene { session_id, .. }
            | Self::GetScene { session_id }
            | Self::GetSceneChanges { session_id } => Some(session_id),
            Self::GetStatus | Self::GetAdapterDescription => None,
        }
    }
}

//! The adapter RPC contract.
//!
//! Implemented by the in-process dispatcher and by the remote WebSocket client,
//! so orchestrators can address local and remote adapters through one trait.
//!
//! Bool-typed methods report expected failures (unknown session, unknown unit,
//! unit refusal) as `Ok(BoolResponse { successful: false, .. })`. Typed methods
//! report them as `Err(AdapterError)`. Remote clients additionally surface
//! transport problems as `Err(AdapterError::TransportFailure)` from any method.

use std::collections::HashMap;

use async_trait::async_trait;

use mmi_domain::{
    AdapterDescription, AdapterError, AvatarDescription, BoolResponse, Checkpoint, Constraint,
    Instruction, MmuDescription, SceneObject, SceneUpdate, SimulationResult, SimulationState,
};

use crate::calls::AdapterCall;
use crate::responses::AdapterReply;

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AdapterService: Send + Sync {
    // Sessions
    async fn create_session(&self, session_id: &str) -> Result<BoolResponse, AdapterError>;
    async fn close_session(&self, session_id: &str) -> Result<BoolResponse, AdapterError>;

    // Catalog and loading
    async fn get_loadable_mmus(&self, session_id: &str)
        -> Result<Vec<MmuDescription>, AdapterError>;
    async fn get_mmus(&self, session_id: &str) -> Result<Vec<MmuDescription>, AdapterError>;
    async fn load_mmus(
        &self,
        unit_ids: Vec<String>,
        session_id: &str,
    ) -> Result<HashMap<String, String>, AdapterError>;

    // Unit lifecycle
    async fn initialize(
        &self,
        avatar_description: AvatarDescription,
        properties: HashMap<String, String>,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError>;
    async fn assign_instruction(
        &self,
        instruction: Instruction,
        simulation_state: SimulationState,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError>;
    async fn do_step(
        &self,
        time: f64,
        simulation_state: SimulationState,
        unit_id: &str,
        session_id: &str,
    ) -> Result<SimulationResult, AdapterError>;
    async fn abort(
        &self,
        instruction_id: &str,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError>;
    async fn check_prerequisites(
        &self,
        instruction: Instruction,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError>;
    async fn get_boundary_constraints(
        &self,
        instruction: Instruction,
        unit_id: &str,
        session_id: &str,
    ) -> Result<Vec<Constraint>, AdapterError>;
    async fn create_checkpoint(
        &self,
        unit_id: &str,
        session_id: &str,
    ) -> Result<Checkpoint, AdapterError>;
    async fn restore_checkpoint(
        &self,
        unit_id: &str,
        session_id: &str,
        checkpoint: Checkpoint,
    ) -> Result<BoolResponse, AdapterError>;
    async fn execute_function(
        &self,
        name: &str,
        parameters: HashMap<String, String>,
        unit_id: &str,
        session_id: &str,
    ) -> Result<HashMap<String, String>, AdapterError>;
    async fn dispose(&self, unit_id: &str, session_id: &str)
        -> Result<BoolResponse, AdapterError>;
    async fn get_description(
        &self,
        unit_id: &str,
        session_id: &str,
    ) -> Result<MmuDescription, AdapterError>;

    // Scene
    async fn push_scene(
        &self,
        scene_update: SceneUpdate,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError>;
    async fn get_scene(&self, session_id: &str) -> Result<Vec<SceneObject>, AdapterError>;
    async fn get_scene_changes(&self, session_id: &str) -> Result<SceneUpdate, AdapterError>;

    // Adapter
    async fn get_status(&self) -> Result<HashMap<String, String>, AdapterError>;
    async fn get_adapter_description(&self) -> Result<AdapterDescription, AdapterError>;
}

/// Route a decoded call to `service` and wrap its result as a reply.
pub async fn dispatch(
    service: &dyn AdapterService,
    call: AdapterCall,
) -> Result<AdapterReply, AdapterError> {
    let reply = match call {
        AdapterCall::CreateSession { session_id } => {
            AdapterReply::Bool(service.create_session(&session_id).await?)
        }
        AdapterCall::CloseSession { session_id } => {
            AdapterReply::Bool(service.close_session(&session_id).await?)
        }
        AdapterCall::GetLoadableMmus { session_id } => {
            AdapterReply::Descriptions(service.get_loadable_mmus(&session_id).await?)
        }
        AdapterCall::GetMmus { session_id } => {
            AdapterReply::Descriptions(service.get_mmus(&session_id).await?)
        }
        AdapterCall::LoadMmus {
            unit_ids,
            session_id,
        } => AdapterReply::Instances(service.load_mmus(unit_ids, &session_id).await?),
        AdapterCall::Initialize {
            avatar_description,
            properties,
            unit_id,
            session_id,
        } => AdapterReply::Bool(
            service
                .initialize(avatar_description, properties, &unit_id, &session_id)
                .await?,
        ),
        AdapterCall::AssignInstruction {
            instruction,
            simulation_state,
            unit_id,
            session_id,
        } => AdapterReply::Bool(
            service
                .assign_instruction(instruction, simulation_state, &unit_id, &session_id)
                .await?,
        ),
        AdapterCall::DoStep {
            time,
            simulation_state,
            unit_id,
            session_id,
        } => AdapterReply::Simulation(
            service
                .do_step(time, simulation_state, &unit_id, &session_id)
                .await?,
        ),
        AdapterCall::Abort {
            instruction_id,
            unit_id,
            session_id,
        } => AdapterReply::Bool(
            service
                .abort(&instruction_id, &unit_id, &session_id)
                .await?,
        ),
        AdapterCall::CheckPrerequisites {
            instruction,
            unit_id,
            session_id,
        } => AdapterReply::Bool(
            service
                .check_prerequisites(instruction, &unit_id, &session_id)
                .await?,
        ),
        AdapterCall::GetBoundaryConstraints {
            instruction,
            unit_id,
            session_id,
        } => AdapterReply::Constraints(
            service
                .get_boundary_constraints(instruction, &unit_id, &session_id)
                .await?,
        ),
        AdapterCall::CreateCheckpoint {
            unit_id,
            session_id,
        } => AdapterReply::Checkpoint(service.create_checkpoint(&unit_id, &session_id).await?),
        AdapterCall::RestoreCheckpoint {
            unit_id,
            session_id,
            checkpoint,
        } => AdapterReply::Bool(
            service
                .restore_checkpoint(&unit_id, &session_id, checkpoint)
                .await?,
        ),
        AdapterCall::ExecuteFunction {
            name,
            parameters,
            unit_id,
            session_id,
        } => AdapterReply::Properties(
            service
                .execute_function(&name, parameters, &unit_id, &session_id)
                .await?,
        ),
        AdapterCall::Dispose {
            unit_id,
            session_id,
        } => AdapterReply::Bool(service.dispose(&unit_id, &session_id).await?),
        AdapterCall::GetDescription {
            unit_id,
            session_id,
        } => AdapterReply::Description(service.get_description(&unit_id, &session_id).await?),
        AdapterCall::PushScene {
            scene_update,
            session_id,
        } => AdapterReply::Bool(service.push_scene(scene_update, &session_id).await?),
        AdapterCall::GetScene { session_id } => {
            AdapterReply::SceneObjects(service.get_scene(&session_id).await?)
        }
        AdapterCall::GetSceneChanges { session_id } => {
            AdapterReply::SceneUpdate(service.get_scene_changes(&session_id).await?)
        }
        AdapterCall::GetStatus => AdapterReply::Properties(service.get_status().await?),
        AdapterCall::GetAdapterDescription => {
            AdapterReply::AdapterDescription(service.get_adapter_description().await?)
        }
    };

    Ok(reply)
}

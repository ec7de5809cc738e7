//! Per-unit handle used by orchestrators.
//!
//! A `UnitHandle` addresses one loaded unit in one session. It owns its own
//! adapter client and can be moved to another adapter without changing its
//! identity, so callers keep their handles across a host migration.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use mmi_domain::{
    AdapterError, AvatarDescription, BoolResponse, Checkpoint, Constraint, Instruction,
    MmuDescription, SimulationResult, SimulationState,
};

use crate::ports::{AdapterAccess, AdapterClient};

struct Binding {
    adapter: Arc<dyn AdapterAccess>,
    client: Arc<dyn AdapterClient>,
}

pub struct UnitHandle {
    id: String,
    name: String,
    motion_type: String,
    description: MmuDescription,
    session_id: String,
    binding: RwLock<Binding>,
}

impl UnitHandle {
    pub async fn new(
        adapter: Arc<dyn AdapterAccess>,
        session_id: impl Into<String>,
        description: MmuDescription,
    ) -> Result<Self, AdapterError> {
        let client: Arc<dyn AdapterClient> = Arc::from(adapter.create_client().await?);
        Ok(Self {
            id: description.id.clone(),
            name: description.name.clone(),
            motion_type: description.motion_type.clone(),
            description,
            session_id: session_id.into(),
            binding: RwLock::new(Binding { adapter, client }),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn motion_type(&self) -> &str {
        &self.motion_type
    }

    pub fn description(&self) -> &MmuDescription {
        &self.description
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The adapter currently hosting this unit.
    pub fn adapter(&self) -> Arc<dyn AdapterAccess> {
        Arc::clone(&self.binding.read().adapter)
    }

    /// Whether this handle is bound to `adapter`.
    pub fn is_bound_to(&self, adapter: &Arc<dyn AdapterAccess>) -> bool {
        Arc::ptr_eq(&self.binding.read().adapter, adapter)
    }

    fn client(&self) -> Arc<dyn AdapterClient> {
        Arc::clone(&self.binding.read().client)
    }

    /// Rebind to `adapter`: open a client there and close the old one.
    pub async fn change_adapter(&self, adapter: Arc<dyn AdapterAccess>) -> Result<(), AdapterError> {
        let client: Arc<dyn AdapterClient> = Arc::from(adapter.create_client().await?);
        let previous = {
            let mut binding = self.binding.write();
            std::mem::replace(&mut *binding, Binding { adapter, client })
        };
        previous.client.close().await;
        tracing::debug!(
            unit_id = %self.id,
            from = %previous.adapter.description().name,
            to = %self.adapter().description().name,
            "Unit handle moved to another adapter"
        );
        Ok(())
    }

    pub async fn initialize(
        &self,
        avatar_description: AvatarDescription,
        properties: HashMap<String, String>,
    ) -> Result<BoolResponse, AdapterError> {
        self.client()
            .access()
            .initialize(avatar_description, properties, &self.id, &self.session_id)
            .await
    }

    pub async fn assign_instruction(
        &self,
        instruction: Instruction,
        simulation_state: SimulationState,
    ) -> Result<BoolResponse, AdapterError> {
        self.client()
            .access()
            .assign_instruction(instruction, simulation_state, &self.id, &self.session_id)
            .await
    }

    pub async fn do_step(
        &self,
        time: f64,
        simulation_state: SimulationState,
    ) -> Result<SimulationResult, AdapterError> {
        self.client()
            .access()
            .do_step(time, simulation_state, &self.id, &self.session_id)
            .await
    }

    pub async fn abort(&self, instruction_id: &str) -> Result<BoolResponse, AdapterError> {
        self.client()
            .access()
            .abort(instruction_id, &self.id, &self.session_id)
            .await
    }

    pub async fn check_prerequisites(
        &self,
        instruction: Instruction,
    ) -> Result<BoolResponse, AdapterError> {
        self.client()
            .access()
            .check_prerequisites(instruction, &self.id, &self.session_id)
            .await
    }

    pub async fn boundary_constraints(
        &self,
        instruction: Instruction,
    ) -> Result<Vec<Constraint>, AdapterError> {
        self.client()
            .access()
            .get_boundary_constraints(instruction, &self.id, &self.session_id)
            .await
    }

    pub async fn create_checkpoint(&self) -> Result<Checkpoint, AdapterError> {
        self.client()
            .access()
            .create_checkpoint(&self.id, &self.session_id)
            .await
    }

    pub async fn restore_checkpoint(
        &self,
        checkpoint: Checkpoint,
    ) -> Result<BoolResponse, AdapterError> {
        self.client()
            .access()
            .restore_checkpoint(&self.id, &self.session_id, checkpoint)
            .await
    }

    pub async fn execute_function(
        &self,
        name: &str,
        parameters: HashMap<String, String>,
    ) -> Result<HashMap<String, String>, AdapterError> {
        self.client()
            .access()
            .execute_function(name, parameters, &self.id, &self.session_id)
            .await
    }

    pub async fn dispose(&self) -> Result<BoolResponse, AdapterError> {
        self.client()
            .access()
            .dispose(&self.id, &self.session_id)
            .await
    }

    /// Close this handle's client.
    pub async fn close_connection(&self) {
        self.client().close().await;
    }
}

/// Wrap every unit loaded on `adapter` for `session_id` in a handle.
pub async fn create_unit_connections(
    adapter: &Arc<dyn AdapterAccess>,
    session_id: &str,
) -> Result<Vec<UnitHandle>, AdapterError> {
    let descriptions = adapter.get_mmus(session_id).await?;
    let mut handles = Vec::with_capacity(descriptions.len());
    for description in descriptions {
        handles.push(UnitHandle::new(Arc::clone(adapter), session_id, description).await?);
    }
    Ok(handles)
}

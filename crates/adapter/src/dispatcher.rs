//! RPC dispatcher.
//!
//! Every call resolves `session id → session → avatar → unit`, refreshes the
//! session's last access and forwards to the unit instance. Lookup failures
//! are returned before any unit map is touched.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;

use mmi_domain::{
    AdapterDescription, AdapterError, AvatarDescription, BoolResponse, Checkpoint, Constraint,
    Instruction, MmuDescription, SceneObject, SceneUpdate, SessionId, SimulationResult,
    SimulationState,
};
use mmi_shared::AdapterService;

use crate::session::{
    panic_message, AvatarContent, SessionContent, SessionDirectory, UnitInstance,
};
use crate::units::{AdapterEndpoint, UnitCatalog, UnitContext, UnitRegistry};

pub const STATUS_RUNNING_SINCE: &str = "Running since";
pub const STATUS_TOTAL_SESSIONS: &str = "Total Sessions";
pub const STATUS_LOADABLE_UNITS: &str = "Loadable MMUs";
pub const STATUS_VERSION: &str = "Version";
pub const STATUS_LAST_ACCESS: &str = "Last Access";

/// In-process implementation of the adapter RPC surface.
pub struct AdapterImplementation {
    sessions: Arc<SessionDirectory>,
    catalog: Arc<UnitCatalog>,
    registry: Arc<UnitRegistry>,
    endpoint: Arc<AdapterEndpoint>,
    version: String,
}

impl AdapterImplementation {
    pub fn new(
        sessions: Arc<SessionDirectory>,
        catalog: Arc<UnitCatalog>,
        registry: Arc<UnitRegistry>,
        endpoint: Arc<AdapterEndpoint>,
    ) -> Self {
        Self {
            sessions,
            catalog,
            registry,
            endpoint,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionDirectory> {
        &self.sessions
    }

    fn session(&self, session_id: &str) -> Result<(SessionId, Arc<SessionContent>), AdapterError> {
        let id = SessionId::parse(session_id)?;
        let content = self.sessions.get(&id)?;
        self.sessions.touch(&content);
        Ok((id, content))
    }

    fn avatar(
        &self,
        session_id: &str,
    ) -> Result<(Arc<SessionContent>, Arc<AvatarContent>), AdapterError> {
        let id = SessionId::parse(session_id)?;
        let (session, avatar) = self.sessions.contents(&id)?;
        self.sessions.touch(&session);
        Ok((session, avatar))
    }

    fn unit(&self, unit_id: &str, session_id: &str) -> Result<Arc<UnitInstance>, AdapterError> {
        let (_, avatar) = self.avatar(session_id)?;
        avatar
            .unit(unit_id)
            .ok_or_else(|| AdapterError::unit_not_found(unit_id, session_id))
    }

    /// Instantiate `unit_id` for the avatar, replacing an earlier instance.
    fn load_unit(
        &self,
        unit_id: &str,
        id: &SessionId,
        session: &SessionContent,
        avatar: &AvatarContent,
    ) -> Result<Arc<UnitInstance>, AdapterError> {
        let descriptor = self
            .catalog
            .get(unit_id)
            .ok_or_else(|| AdapterError::unit_not_found(unit_id, id.as_str()))?;

        let context = UnitContext {
            unit_id: unit_id.to_string(),
            session_id: id.clone(),
            scene: session.scene.clone(),
            services: session.services.clone(),
            skeleton: session.skeleton.clone(),
            endpoint: self.endpoint.clone(),
        };

        let unit = catch_unwind(AssertUnwindSafe(|| {
            self.registry.instantiate(&descriptor, context)
        }))
        .map_err(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!(unit_id, panic = %message, "Unit constructor panicked");
            AdapterError::instantiation(unit_id, message)
        })??;

        let instance = Arc::new(UnitInstance::new(descriptor.description, unit));
        if let Some(replaced) = avatar.insert_unit(instance.clone()) {
            tracing::debug!(unit_id, session_id = %id, "Replacing loaded unit instance");
            if let Err(e) = replaced.dispose() {
                tracing::debug!(unit_id, error = %e, "Replaced instance did not dispose cleanly");
            }
        }
        Ok(instance)
    }
}

fn bool_response(result: Result<(), AdapterError>) -> Result<BoolResponse, AdapterError> {
    Ok(result.into())
}

#[async_trait]
impl AdapterService for AdapterImplementation {
    async fn create_session(&self, session_id: &str) -> Result<BoolResponse, AdapterError> {
        let result = SessionId::parse(session_id).and_then(|id| self.sessions.create(&id).map(|_| ()));
        if let Err(e) = &result {
            tracing::warn!(session_id, error = %e, "CreateSession failed");
        }
        bool_response(result)
    }

    async fn close_session(&self, session_id: &str) -> Result<BoolResponse, AdapterError> {
        let result = SessionId::parse(session_id).and_then(|id| self.sessions.remove(&id).map(|_| ()));
        bool_response(result)
    }

    async fn get_loadable_mmus(
        &self,
        _session_id: &str,
    ) -> Result<Vec<MmuDescription>, AdapterError> {
        Ok(self.catalog.descriptions())
    }

    async fn get_mmus(&self, session_id: &str) -> Result<Vec<MmuDescription>, AdapterError> {
        let (_, avatar) = self.avatar(session_id)?;
        Ok(avatar.unit_descriptions())
    }

    /// Best effort per id: unknown ids and failing constructors are logged
    /// and left out of the result, the rest of the batch still loads.
    async fn load_mmus(
        &self,
        unit_ids: Vec<String>,
        session_id: &str,
    ) -> Result<HashMap<String, String>, AdapterError> {
        let (id, session) = self.session(session_id)?;
        let avatar = session.ensure_avatar(id.avatar_id());

        let mut loaded = HashMap::new();
        for unit_id in unit_ids {
            match self.load_unit(&unit_id, &id, &session, &avatar) {
                Ok(instance) => {
                    tracing::debug!(unit_id = %unit_id, session_id = %id, "Unit loaded");
                    loaded.insert(unit_id, instance.token().to_string());
                }
                Err(e) => {
                    tracing::warn!(unit_id = %unit_id, session_id = %id, error = %e, "Unit not loaded");
                }
            }
        }
        Ok(loaded)
    }

    async fn initialize(
        &self,
        avatar_description: AvatarDescription,
        properties: HashMap<String, String>,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        let result = self.avatar(session_id).and_then(|(session, avatar)| {
            let instance = avatar
                .unit(unit_id)
                .ok_or_else(|| AdapterError::unit_not_found(unit_id, session_id))?;
            instance.initialize(&avatar_description, &properties)?;
            session
                .skeleton
                .initialize_anthropometry(&avatar_description);
            avatar.set_reference_posture(avatar_description.zero_posture.clone());
            Ok(())
        });
        bool_response(result)
    }

    async fn assign_instruction(
        &self,
        instruction: Instruction,
        simulation_state: SimulationState,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        let result = self
            .unit(unit_id, session_id)
            .and_then(|unit| unit.assign_instruction(&instruction, &simulation_state));
        if let Err(e) = &result {
            tracing::debug!(unit_id, session_id, error = %e, "Instruction not accepted");
        }
        bool_response(result)
    }

    async fn do_step(
        &self,
        time: f64,
        simulation_state: SimulationState,
        unit_id: &str,
        session_id: &str,
    ) -> Result<SimulationResult, AdapterError> {
        self.unit(unit_id, session_id)?
            .do_step(time, &simulation_state)
    }

    async fn abort(
        &self,
        instruction_id: &str,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        bool_response(
            self.unit(unit_id, session_id)
                .and_then(|unit| unit.abort(instruction_id)),
        )
    }

    async fn check_prerequisites(
        &self,
        instruction: Instruction,
        unit_id: &str,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        let result = self
            .unit(unit_id, session_id)
            .and_then(|unit| unit.check_prerequisites(&instruction));
        Ok(match result {
            Ok(true) => BoolResponse::ok(),
            Ok(false) => BoolResponse::failure(format!(
                "Prerequisites of instruction {} not met",
                instruction.id
            )),
            Err(e) => BoolResponse::from(e),
        })
    }

    async fn get_boundary_constraints(
        &self,
        instruction: Instruction,
        unit_id: &str,
        session_id: &str,
    ) -> Result<Vec<Constraint>, AdapterError> {
        self.unit(unit_id, session_id)?
            .boundary_constraints(&instruction)
    }

    async fn create_checkpoint(
        &self,
        unit_id: &str,
        session_id: &str,
    ) -> Result<Checkpoint, AdapterError> {
        self.unit(unit_id, session_id)?.create_checkpoint()
    }

    async fn restore_checkpoint(
        &self,
        unit_id: &str,
        session_id: &str,
        checkpoint: Checkpoint,
    ) -> Result<BoolResponse, AdapterError> {
        bool_response(
            self.unit(unit_id, session_id)
                .and_then(|unit| unit.restore_checkpoint(&checkpoint)),
        )
    }

    async fn execute_function(
        &self,
        name: &str,
        parameters: HashMap<String, String>,
        unit_id: &str,
        session_id: &str,
    ) -> Result<HashMap<String, String>, AdapterError> {
        self.unit(unit_id, session_id)?
            .execute_function(name, &parameters)
    }

    /// Disposes the instance; it stays addressable until the avatar reloads
    /// the unit or the session goes away.
    async fn dispose(&self, unit_id: &str, session_id: &str) -> Result<BoolResponse, AdapterError> {
        bool_response(self.unit(unit_id, session_id).and_then(|unit| unit.dispose()))
    }

    async fn get_description(
        &self,
        unit_id: &str,
        session_id: &str,
    ) -> Result<MmuDescription, AdapterError> {
        Ok(self.unit(unit_id, session_id)?.description().clone())
    }

    async fn push_scene(
        &self,
        scene_update: SceneUpdate,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        Ok(match self.session(session_id) {
            Ok((_, session)) => BoolResponse {
                successful: true,
                log_data: session.scene.apply(scene_update),
            },
            Err(e) => BoolResponse::from(e),
        })
    }

    async fn get_scene(&self, session_id: &str) -> Result<Vec<SceneObject>, AdapterError> {
        let (_, session) = self.session(session_id)?;
        Ok(session.scene.scene_objects())
    }

    async fn get_scene_changes(&self, session_id: &str) -> Result<SceneUpdate, AdapterError> {
        let (_, session) = self.session(session_id)?;
        Ok(session.scene.scene_changes())
    }

    async fn get_status(&self) -> Result<HashMap<String, String>, AdapterError> {
        let last_access = self
            .sessions
            .last_access()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "None".to_string());

        Ok(HashMap::from([
            (
                STATUS_RUNNING_SINCE.to_string(),
                self.sessions.started_at().to_rfc3339(),
            ),
            (
                STATUS_TOTAL_SESSIONS.to_string(),
                self.sessions.len().to_string(),
            ),
            (
                STATUS_LOADABLE_UNITS.to_string(),
                self.catalog.len().to_string(),
            ),
            (STATUS_VERSION.to_string(), self.version.clone()),
            (STATUS_LAST_ACCESS.to_string(), last_access),
        ]))
    }

    async fn get_adapter_description(&self) -> Result<AdapterDescription, AdapterError> {
        Ok(self.endpoint.description.clone())
    }
}

//! Unit contract, loading descriptors and discovery.
//!
//! A unit computes the motion of one avatar for one instruction at a time.
//! Implementations are registered by name in a [`UnitRegistry`] at startup;
//! providers report which units are loadable and the [`UnitCatalog`] joins the
//! two.

mod builtin;
mod catalog;
mod directory_provider;
mod provider;
mod registry;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use mmi_domain::{
    AdapterDescription, AvatarDescription, Constraint, Instruction, MmuDescription, SessionId,
    SimulationResult, SimulationState,
};

use crate::scene::SceneBuffer;
use crate::services::{ServiceAccess, SkeletonAccess};

pub use builtin::{builtin_descriptors, IdleUnit, LinearMoveUnit, IDLE_FACTORY, LINEAR_MOVE_FACTORY};
pub use catalog::UnitCatalog;
pub use directory_provider::{DirectoryUnitProvider, DESCRIPTION_FILE};
pub use provider::{CompositeUnitProvider, StaticUnitProvider, UnitProvider};
pub use registry::{UnitFactory, UnitRegistry};

/// Error raised by unit code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct UnitError(pub String);

impl UnitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Motion model unit.
///
/// Calls for one instance are serialized by the adapter, so implementations
/// can keep plain mutable state.
pub trait Unit: Send {
    fn initialize(
        &mut self,
        avatar: &AvatarDescription,
        properties: &HashMap<String, String>,
    ) -> Result<(), UnitError>;

    /// Accept `instruction`, replacing any running one.
    fn assign_instruction(
        &mut self,
        instruction: &Instruction,
        state: &SimulationState,
    ) -> Result<(), UnitError>;

    /// Advance by `time` seconds.
    fn do_step(&mut self, time: f64, state: &SimulationState)
        -> Result<SimulationResult, UnitError>;

    fn abort(&mut self, _instruction_id: &str) -> Result<(), UnitError> {
        Ok(())
    }

    fn check_prerequisites(&mut self, _instruction: &Instruction) -> Result<bool, UnitError> {
        Ok(true)
    }

    fn boundary_constraints(
        &mut self,
        _instruction: &Instruction,
    ) -> Result<Vec<Constraint>, UnitError> {
        Ok(Vec::new())
    }

    /// Serialize the full internal state.
    fn create_checkpoint(&mut self) -> Result<Vec<u8>, UnitError>;

    fn restore_checkpoint(&mut self, data: &[u8]) -> Result<(), UnitError>;

    fn execute_function(
        &mut self,
        _name: &str,
        _parameters: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, UnitError> {
        Ok(HashMap::new())
    }

    fn dispose(&mut self) -> Result<(), UnitError> {
        Ok(())
    }
}

/// Where a loadable unit was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOrigin {
    Builtin,
    Path(PathBuf),
}

/// A loadable unit: its description and the registry entry that builds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitLoadingDescriptor {
    pub description: MmuDescription,
    pub factory: String,
    pub origin: UnitOrigin,
}

impl UnitLoadingDescriptor {
    pub fn new(description: MmuDescription, origin: UnitOrigin) -> Self {
        let factory = description.factory_key().to_string();
        Self {
            description,
            factory,
            origin,
        }
    }

    pub fn id(&self) -> &str {
        &self.description.id
    }
}

/// This adapter as seen by its units.
#[derive(Debug, Clone)]
pub struct AdapterEndpoint {
    pub description: AdapterDescription,
    /// Base URL of the directory service, if one is configured.
    pub directory_address: Option<String>,
}

/// Session resources handed to a unit when it is instantiated.
#[derive(Clone)]
pub struct UnitContext {
    pub unit_id: String,
    pub session_id: SessionId,
    pub scene: Arc<SceneBuffer>,
    pub services: Arc<ServiceAccess>,
    pub skeleton: Arc<SkeletonAccess>,
    pub endpoint: Arc<AdapterEndpoint>,
}

//! A loaded unit and its lifecycle state.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use parking_lot::Mutex;

use mmi_domain::{
    AdapterError, AvatarDescription, Checkpoint, Constraint, InstanceToken, Instruction,
    MmuDescription, SimulationResult, SimulationState,
};

use crate::units::{Unit, UnitError};

/// Lifecycle of a unit instance.
///
/// `Loaded → Initialized → Active ⇄ Idle → Disposed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Loaded,
    Initialized,
    Active,
    Idle,
    Disposed,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loaded => "loaded",
            Self::Initialized => "initialized",
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

struct UnitSlot {
    unit: Box<dyn Unit>,
    state: UnitState,
    instruction_id: Option<String>,
}

/// One unit instance owned by one avatar.
///
/// Calls into the unit are serialized by the slot lock. Unit errors and panics
/// come back as [`AdapterError::UnitFailure`].
pub struct UnitInstance {
    unit_id: String,
    token: InstanceToken,
    description: MmuDescription,
    slot: Mutex<UnitSlot>,
}

impl UnitInstance {
    pub fn new(description: MmuDescription, unit: Box<dyn Unit>) -> Self {
        Self {
            unit_id: description.id.clone(),
            token: InstanceToken::new(),
            description,
            slot: Mutex::new(UnitSlot {
                unit,
                state: UnitState::Loaded,
                instruction_id: None,
            }),
        }
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn token(&self) -> InstanceToken {
        self.token
    }

    pub fn description(&self) -> &MmuDescription {
        &self.description
    }

    pub fn state(&self) -> UnitState {
        self.slot.lock().state
    }

    /// Id of the instruction the unit is working on, if any.
    pub fn instruction_id(&self) -> Option<String> {
        self.slot.lock().instruction_id.clone()
    }

    pub fn initialize(
        &self,
        avatar: &AvatarDescription,
        properties: &HashMap<String, String>,
    ) -> Result<(), AdapterError> {
        let mut slot = self.slot.lock();
        self.require(&slot, "initialize", &[UnitState::Loaded, UnitState::Initialized])?;
        self.guarded("initialize", || slot.unit.initialize(avatar, properties))?;
        slot.state = UnitState::Initialized;
        slot.instruction_id = None;
        Ok(())
    }

    pub fn assign_instruction(
        &self,
        instruction: &Instruction,
        state: &SimulationState,
    ) -> Result<(), AdapterError> {
        let mut slot = self.slot.lock();
        self.require(
            &slot,
            "assign instruction",
            &[UnitState::Initialized, UnitState::Idle, UnitState::Active],
        )?;
        self.guarded("assign instruction", || {
            slot.unit.assign_instruction(instruction, state)
        })?;
        slot.state = UnitState::Active;
        slot.instruction_id = Some(instruction.id.clone());
        Ok(())
    }

    /// Advance the unit. An `end` event for the running instruction moves the
    /// instance to `Idle`.
    pub fn do_step(
        &self,
        time: f64,
        state: &SimulationState,
    ) -> Result<SimulationResult, AdapterError> {
        let mut slot = self.slot.lock();
        self.require(&slot, "step", &[UnitState::Active, UnitState::Idle])?;
        let result = self.guarded("step", || slot.unit.do_step(time, state))?;

        if slot.state == UnitState::Active {
            let finished = slot
                .instruction_id
                .as_deref()
                .is_some_and(|id| result.finished(id));
            if finished {
                slot.state = UnitState::Idle;
                slot.instruction_id = None;
            }
        }
        Ok(result)
    }

    pub fn abort(&self, instruction_id: &str) -> Result<(), AdapterError> {
        let mut slot = self.slot.lock();
        self.require(&slot, "abort", &[UnitState::Active, UnitState::Idle])?;
        self.guarded("abort", || slot.unit.abort(instruction_id))?;
        slot.state = UnitState::Idle;
        slot.instruction_id = None;
        Ok(())
    }

    pub fn check_prerequisites(&self, instruction: &Instruction) -> Result<bool, AdapterError> {
        let mut slot = self.slot.lock();
        self.require_live(&slot, "check prerequisites")?;
        self.guarded("check prerequisites", || {
            slot.unit.check_prerequisites(instruction)
        })
    }

    pub fn boundary_constraints(
        &self,
        instruction: &Instruction,
    ) -> Result<Vec<Constraint>, AdapterError> {
        let mut slot = self.slot.lock();
        self.require_live(&slot, "get boundary constraints")?;
        self.guarded("get boundary constraints", || {
            slot.unit.boundary_constraints(instruction)
        })
    }

    pub fn create_checkpoint(&self) -> Result<Checkpoint, AdapterError> {
        let mut slot = self.slot.lock();
        self.require_live(&slot, "create checkpoint")?;
        self.guarded("create checkpoint", || slot.unit.create_checkpoint())
            .map(Checkpoint::from)
    }

    pub fn restore_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), AdapterError> {
        let mut slot = self.slot.lock();
        self.require_live(&slot, "restore checkpoint")?;
        self.guarded("restore checkpoint", || {
            slot.unit.restore_checkpoint(checkpoint.as_bytes())
        })
    }

    pub fn execute_function(
        &self,
        name: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, AdapterError> {
        let mut slot = self.slot.lock();
        self.require_live(&slot, "execute function")?;
        self.guarded("execute function", || {
            slot.unit.execute_function(name, parameters)
        })
    }

    /// Terminal transition. The state becomes `Disposed` even if the unit's
    /// own cleanup fails.
    pub fn dispose(&self) -> Result<(), AdapterError> {
        let mut slot = self.slot.lock();
        self.require_live(&slot, "dispose")?;
        let outcome = self.guarded("dispose", || slot.unit.dispose());
        slot.state = UnitState::Disposed;
        slot.instruction_id = None;
        outcome
    }

    fn require(
        &self,
        slot: &UnitSlot,
        operation: &str,
        allowed: &[UnitState],
    ) -> Result<(), AdapterError> {
        if allowed.contains(&slot.state) {
            Ok(())
        } else {
            Err(AdapterError::invalid_state(
                &self.unit_id,
                operation,
                slot.state.to_string(),
            ))
        }
    }

    fn require_live(&self, slot: &UnitSlot, operation: &str) -> Result<(), AdapterError> {
        if slot.state == UnitState::Disposed {
            return Err(AdapterError::invalid_state(
                &self.unit_id,
                operation,
                slot.state.to_string(),
            ));
        }
        Ok(())
    }

    /// Run unit code, turning errors and panics into `UnitFailure`.
    fn guarded<T>(
        &self,
        operation: &str,
        f: impl FnOnce() -> Result<T, UnitError>,
    ) -> Result<T, AdapterError> {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::debug!(unit_id = %self.unit_id, operation, error = %e, "Unit reported failure");
                Err(AdapterError::unit_failure(&self.unit_id, e.to_string()))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    unit_id = %self.unit_id,
                    operation,
                    panic = %message,
                    "Unit panicked"
                );
                Err(AdapterError::unit_failure(
                    &self.unit_id,
                    format!("panicked during {operation}: {message}"),
                ))
            }
        }
    }
}

/// Text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

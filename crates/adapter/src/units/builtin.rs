//! Units shipped with the adapter.
//!
//! Both are deterministic and checkpoint their whole state as JSON.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use mmi_domain::{
    AvatarDescription, AvatarPostureValues, Constraint, Instruction, MmuDescription,
    SimulationEvent, SimulationResult, SimulationState, Transform, UnitParameter, Vec3,
};

use super::{UnitContext, UnitError, UnitLoadingDescriptor, UnitOrigin};
use crate::scene::SceneBuffer;

pub const IDLE_FACTORY: &str = "idle";
pub const LINEAR_MOVE_FACTORY: &str = "linear_move";

/// Instruction property naming a scene object to walk to.
const TARGET_ID: &str = "TargetID";
/// Instruction property with an explicit `x,y,z` target.
const TARGET_POSITION: &str = "TargetPosition";
/// Initialize/ExecuteFunction property for the walking speed in m/s.
const VELOCITY: &str = "Velocity";
const DEFAULT_VELOCITY: f64 = 1.0;

/// Loading descriptors of the built-in units.
pub fn builtin_descriptors() -> Vec<UnitLoadingDescriptor> {
    let description = |id: &str, name: &str, motion_type: &str, factory: &str, summary: &str| {
        MmuDescription {
            id: id.into(),
            name: name.into(),
            motion_type: motion_type.into(),
            language: "Rust".into(),
            author: "mmi-adapter".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            assembly_name: Some(factory.into()),
            short_description: summary.into(),
            ..Default::default()
        }
    };

    let idle = description(
        "idle",
        "Idle",
        "Pose/Idle",
        IDLE_FACTORY,
        "Holds the avatar in its reference posture",
    );

    let mut walk = description(
        "linear_move",
        "LinearMove",
        "Locomotion/Walk",
        LINEAR_MOVE_FACTORY,
        "Moves the avatar root toward a target at constant speed",
    );
    walk.parameters = vec![
        UnitParameter {
            name: TARGET_ID.into(),
            parameter_type: "ID".into(),
            description: "Scene object to move to".into(),
            required: false,
        },
        UnitParameter {
            name: TARGET_POSITION.into(),
            parameter_type: "Vector3".into(),
            description: "Explicit target as x,y,z".into(),
            required: false,
        },
    ];

    vec![
        UnitLoadingDescriptor::new(idle, UnitOrigin::Builtin),
        UnitLoadingDescriptor::new(walk, UnitOrigin::Builtin),
    ]
}

fn encode<T: Serialize>(state: &T) -> Result<Vec<u8>, UnitError> {
    serde_json::to_vec(state).map_err(|e| UnitError::new(format!("checkpoint encoding: {e}")))
}

fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, UnitError> {
    serde_json::from_slice(data).map_err(|e| UnitError::new(format!("invalid checkpoint: {e}")))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IdleState {
    posture: Option<AvatarPostureValues>,
    instruction_id: Option<String>,
}

/// Keeps returning the posture it was given.
pub struct IdleUnit {
    state: IdleState,
}

impl IdleUnit {
    pub fn new(_context: UnitContext) -> Self {
        Self {
            state: IdleState::default(),
        }
    }
}

impl super::Unit for IdleUnit {
    fn initialize(
        &mut self,
        avatar: &AvatarDescription,
        _properties: &HashMap<String, String>,
    ) -> Result<(), UnitError> {
        self.state = IdleState {
            posture: Some(avatar.zero_posture.clone()),
            instruction_id: None,
        };
        Ok(())
    }

    fn assign_instruction(
        &mut self,
        instruction: &Instruction,
        state: &SimulationState,
    ) -> Result<(), UnitError> {
        self.state.posture = Some(state.current.clone());
        self.state.instruction_id = Some(instruction.id.clone());
        Ok(())
    }

    fn do_step(
        &mut self,
        _time: f64,
        state: &SimulationState,
    ) -> Result<SimulationResult, UnitError> {
        let posture = self
            .state
            .posture
            .clone()
            .unwrap_or_else(|| state.current.clone());
        Ok(SimulationResult {
            posture,
            ..Default::default()
        })
    }

    fn abort(&mut self, _instruction_id: &str) -> Result<(), UnitError> {
        self.state.instruction_id = None;
        Ok(())
    }

    fn create_checkpoint(&mut self) -> Result<Vec<u8>, UnitError> {
        encode(&self.state)
    }

    fn restore_checkpoint(&mut self, data: &[u8]) -> Result<(), UnitError> {
        self.state = decode(data)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MoveState {
    velocity: f64,
    position: Option<Vec3>,
    target: Option<Vec3>,
    instruction_id: Option<String>,
}

impl Default for MoveState {
    fn default() -> Self {
        Self {
            velocity: DEFAULT_VELOCITY,
            position: None,
            target: None,
            instruction_id: None,
        }
    }
}

/// Moves the avatar root in a straight line toward a target.
///
/// The target is either a scene object (`TargetID`) or an explicit
/// `TargetPosition`. An `end` event is emitted on the step that arrives.
pub struct LinearMoveUnit {
    scene: Arc<SceneBuffer>,
    name: String,
    state: MoveState,
}

impl LinearMoveUnit {
    pub fn new(context: UnitContext) -> Self {
        Self {
            scene: context.scene,
            name: context.unit_id,
            state: MoveState::default(),
        }
    }

    fn resolve_target(&self, instruction: &Instruction) -> Result<Vec3, UnitError> {
        if let Some(object_id) = instruction.property(TARGET_ID) {
            return self
                .scene
                .scene_object(object_id)
                .map(|object| object.transform.position)
                .ok_or_else(|| UnitError::new(format!("target {object_id} not in scene")));
        }

        let raw = instruction
            .property(TARGET_POSITION)
            .ok_or_else(|| UnitError::new("instruction has no target"))?;
        parse_vec3(raw)
    }
}

fn parse_vec3(raw: &str) -> Result<Vec3, UnitError> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| UnitError::new(format!("invalid target position {raw}: {e}")))?;
    match values.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(UnitError::new(format!("invalid target position {raw}"))),
    }
}

fn parse_velocity(raw: &str) -> Result<f64, UnitError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v > 0.0 => Ok(v),
        _ => Err(UnitError::new(format!("invalid velocity {raw}"))),
    }
}

impl super::Unit for LinearMoveUnit {
    fn initialize(
        &mut self,
        _avatar: &AvatarDescription,
        properties: &HashMap<String, String>,
    ) -> Result<(), UnitError> {
        let velocity = match properties.get(VELOCITY) {
            Some(raw) => parse_velocity(raw)?,
            None => DEFAULT_VELOCITY,
        };
        self.state = MoveState {
            velocity,
            ..Default::default()
        };
        Ok(())
    }

    fn assign_instruction(
        &mut self,
        instruction: &Instruction,
        state: &SimulationState,
    ) -> Result<(), UnitError> {
        let target = self.resolve_target(instruction)?;
        self.state.target = Some(target);
        self.state.position = Some(state.current.root_position());
        self.state.instruction_id = Some(instruction.id.clone());
        Ok(())
    }

    fn do_step(
        &mut self,
        time: f64,
        state: &SimulationState,
    ) -> Result<SimulationResult, UnitError> {
        let (Some(target), Some(instruction_id)) =
            (self.state.target, self.state.instruction_id.clone())
        else {
            return Ok(SimulationResult {
                posture: state.current.clone(),
                ..Default::default()
            });
        };

        let from = self
            .state
            .position
            .unwrap_or_else(|| state.current.root_position());
        let position = from.move_toward(target, self.state.velocity * time.max(0.0));
        self.state.position = Some(position);

        let mut result = SimulationResult {
            posture: state.current.with_root_position(position),
            ..Default::default()
        };

        if position.distance(target) <= f64::EPSILON {
            result
                .events
                .push(SimulationEvent::end(self.name.clone(), instruction_id));
            self.state.target = None;
            self.state.instruction_id = None;
        }

        Ok(result)
    }

    fn abort(&mut self, _instruction_id: &str) -> Result<(), UnitError> {
        self.state.target = None;
        self.state.instruction_id = None;
        Ok(())
    }

    fn check_prerequisites(&mut self, instruction: &Instruction) -> Result<bool, UnitError> {
        Ok(self.resolve_target(instruction).is_ok())
    }

    fn boundary_constraints(
        &mut self,
        instruction: &Instruction,
    ) -> Result<Vec<Constraint>, UnitError> {
        let target = self.resolve_target(instruction)?;
        Ok(vec![Constraint {
            id: format!("{}-target", instruction.id),
            geometry: Some(Transform::at("target", target)),
            properties: HashMap::new(),
        }])
    }

    fn create_checkpoint(&mut self) -> Result<Vec<u8>, UnitError> {
        encode(&self.state)
    }

    fn restore_checkpoint(&mut self, data: &[u8]) -> Result<(), UnitError> {
        self.state = decode(data)?;
        Ok(())
    }

    fn execute_function(
        &mut self,
        name: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, UnitError> {
        match name {
            "SetVelocity" => {
                let raw = parameters
                    .get(VELOCITY)
                    .ok_or_else(|| UnitError::new("SetVelocity requires Velocity"))?;
                self.state.velocity = parse_velocity(raw)?;
            }
            "GetVelocity" => {}
            other => return Err(UnitError::new(format!("unknown function {other}"))),
        }
        Ok(HashMap::from([(
            VELOCITY.to_string(),
            self.state.velocity.to_string(),
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::test_support::{context, context_with_scene};
    use crate::units::Unit;
    use mmi_domain::{SceneObject, SceneUpdate};

    fn walk_to(x: f64) -> Instruction {
        Instruction {
            id: "i1".into(),
            name: "walk".into(),
            motion_type: "Locomotion/Walk".into(),
            properties: HashMap::from([(TARGET_POSITION.to_string(), format!("{x},0,0"))]),
            ..Default::default()
        }
    }

    fn origin() -> SimulationState {
        SimulationState::at(AvatarPostureValues::new("0", vec![0.0, 0.0, 0.0, 0.5]))
    }

    fn started_walker() -> LinearMoveUnit {
        let mut unit = LinearMoveUnit::new(context("linear_move"));
        unit.initialize(&AvatarDescription::default(), &HashMap::new())
            .unwrap();
        unit.assign_instruction(&walk_to(3.0), &origin()).unwrap();
        unit
    }

    #[test]
    fn test_walk_arrives_and_emits_end() {
        let mut unit = started_walker();
        let state = origin();

        let first = unit.do_step(1.0, &state).unwrap();
        assert_eq!(first.posture.root_position(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(first.posture.posture_data[3], 0.5);
        assert!(!first.finished("i1"));

        unit.do_step(1.0, &state).unwrap();
        let last = unit.do_step(1.5, &state).unwrap();
        assert_eq!(last.posture.root_position(), Vec3::new(3.0, 0.0, 0.0));
        assert!(last.finished("i1"));
    }

    #[test]
    fn test_checkpoint_restores_identical_future() {
        let mut unit = started_walker();
        let state = origin();
        unit.do_step(0.5, &state).unwrap();
        let checkpoint = unit.create_checkpoint().unwrap();

        let expected: Vec<_> = (0..4).map(|_| unit.do_step(0.5, &state).unwrap()).collect();

        let mut restored = LinearMoveUnit::new(context("linear_move"));
        restored.restore_checkpoint(&checkpoint).unwrap();
        let replayed: Vec<_> = (0..4)
            .map(|_| restored.do_step(0.5, &state).unwrap())
            .collect();
        assert_eq!(expected, replayed);
    }

    #[test]
    fn test_checkpoint_keeps_inexact_floats() {
        let mut unit = LinearMoveUnit::new(context("linear_move"));
        unit.initialize(&AvatarDescription::default(), &HashMap::new())
            .unwrap();
        unit.execute_function(
            "SetVelocity",
            &HashMap::from([(VELOCITY.to_string(), "0.7".to_string())]),
        )
        .unwrap();
        let instruction = Instruction {
            id: "i1".into(),
            properties: HashMap::from([(TARGET_POSITION.to_string(), "100,0.3,0".to_string())]),
            ..Default::default()
        };
        unit.assign_instruction(&instruction, &origin()).unwrap();
        let state = origin();

        for _ in 0..50 {
            let checkpoint = unit.create_checkpoint().unwrap();
            let direct = unit.do_step(0.1, &state).unwrap();
            unit.restore_checkpoint(&checkpoint).unwrap();
            let replayed = unit.do_step(0.1, &state).unwrap();
            assert_eq!(direct, replayed);
        }
    }

    #[test]
    fn test_target_from_scene_object() {
        let scene = Arc::new(SceneBuffer::new());
        scene.apply(SceneUpdate {
            added_scene_objects: vec![SceneObject {
                id: "table".into(),
                name: "table".into(),
                transform: Transform::at("table", Vec3::new(0.0, 0.0, 2.0)),
                ..Default::default()
            }],
            ..Default::default()
        });
        let mut unit = LinearMoveUnit::new(context_with_scene("linear_move", scene));
        let instruction = Instruction {
            id: "i2".into(),
            properties: HashMap::from([(TARGET_ID.to_string(), "table".to_string())]),
            ..Default::default()
        };
        assert!(unit.check_prerequisites(&instruction).unwrap());
        unit.assign_instruction(&instruction, &origin()).unwrap();
        let result = unit.do_step(5.0, &origin()).unwrap();
        assert!(result.finished("i2"));
    }

    #[test]
    fn test_rejects_instruction_without_target() {
        let mut unit = LinearMoveUnit::new(context("linear_move"));
        let instruction = Instruction {
            id: "i3".into(),
            ..Default::default()
        };
        assert!(!unit.check_prerequisites(&instruction).unwrap());
        assert!(unit.assign_instruction(&instruction, &origin()).is_err());
    }

    #[test]
    fn test_set_velocity_function() {
        let mut unit = started_walker();
        let result = unit
            .execute_function(
                "SetVelocity",
                &HashMap::from([(VELOCITY.to_string(), "3".to_string())]),
            )
            .unwrap();
        assert_eq!(result.get(VELOCITY).map(String::as_str), Some("3"));
        assert!(unit.do_step(1.0, &origin()).unwrap().finished("i1"));
        assert!(unit.execute_function("Jump", &HashMap::new()).is_err());
    }

    #[test]
    fn test_idle_holds_zero_posture() {
        let mut unit = IdleUnit::new(context("idle"));
        let avatar = AvatarDescription {
            zero_posture: AvatarPostureValues::new("0", vec![1.0, 2.0, 3.0]),
            ..Default::default()
        };
        unit.initialize(&avatar, &HashMap::new()).unwrap();
        let result = unit.do_step(0.1, &origin()).unwrap();
        assert_eq!(result.posture, avatar.zero_posture);
        assert!(result.events.is_empty());
    }
}

//! MMI Domain - vocabulary of the adapter substrate.
//!
//! Pure data: session addressing, unit and scene exchange types, checkpoint
//! blobs and the error taxonomy. No I/O and no runtime dependencies.

pub mod adapter;
pub mod avatar;
pub mod checkpoint;
pub mod error;
pub mod ids;
pub mod math;
pub mod response;
pub mod scene;
pub mod session_id;
pub mod unit;

pub use adapter::{AdapterDescription, IpAddress, ServiceDescription};
pub use avatar::{Avatar, AvatarDescription, AvatarPostureValues, AvatarUpdate};
pub use checkpoint::Checkpoint;
pub use error::AdapterError;
pub use ids::{ConnectionId, InstanceToken};
pub use math::{Quaternion, Transform, Vec3};
pub use response::BoolResponse;
pub use scene::{SceneManipulation, SceneObject, SceneObjectUpdate, SceneUpdate};
pub use session_id::{SessionId, DEFAULT_AVATAR_ID};
pub use unit::{
    Constraint, Instruction, MmuDescription, SimulationEvent, SimulationResult, SimulationState,
    UnitParameter, END_EVENT, START_EVENT,
};

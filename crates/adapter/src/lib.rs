//! MMI Adapter library.
//!
//! Multi-tenant host for motion model units: sessions keyed by scene and
//! avatar, an RPC dispatcher over the unit lifecycle, a registration heartbeat
//! towards the directory service and an idle-session reaper.
//!
//! ## Structure
//!
//! - `units/` - Unit contract, built-in units, registry and discovery
//! - `session/` - Session directory, avatar content and unit instances
//! - `dispatcher` - `AdapterService` implementation over the session directory
//! - `registration`, `reaper` - Background loops
//! - `infrastructure/` - Configuration, clock and directory clients
//! - `api/` - WebSocket RPC and HTTP status entry points
//! - `app` - Composition root

pub mod api;
pub mod app;
pub mod dispatcher;
pub mod infrastructure;
pub mod reaper;
pub mod registration;
pub mod scene;
pub mod services;
pub mod session;
pub mod units;

pub use app::{AdapterController, RunningAdapter};
pub use dispatcher::AdapterImplementation;
pub use infrastructure::AdapterConfig;
pub use units::{Unit, UnitContext, UnitError, UnitRegistry};

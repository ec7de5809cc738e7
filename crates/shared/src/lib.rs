//! MMI Shared - protocol and contracts between adapters and their clients
//!
//! This crate contains everything both sides of an adapter connection agree on:
//! - WebSocket frames (`ClientMessage`, `ServerMessage`)
//! - RPC calls and typed replies (`AdapterCall`, `AdapterReply`, `ResponseResult`)
//! - The `AdapterService` contract and a `dispatch` helper routing calls to it
//! - The `DirectoryService` contract of the central register
//!
//! No transport code lives here; sockets belong to the adapter and access crates.

pub mod calls;
pub mod directory;
pub mod messages;
pub mod responses;
pub mod service;

pub use calls::AdapterCall;
pub use directory::{DirectoryService, SessionQuery};
pub use messages::{ClientMessage, ServerMessage, ADAPTER_ROUTE};
pub use responses::{AdapterReply, ErrorCode, ResponseResult};
pub use service::{dispatch, AdapterService};

#[cfg(any(test, feature = "testing"))]
pub use directory::MockDirectoryService;
#[cfg(any(test, feature = "testing"))]
pub use service::MockAdapterService;

//! MMI Access - client side of the adapter substrate.
//!
//! Reaches adapters either in-process (`LocalAdapterAccess`) or over the
//! WebSocket RPC endpoint (`RemoteAdapterAccess`), wraps loaded units in
//! `UnitHandle`s and coordinates several adapters for one session through
//! `UnitAccess`.

pub mod infrastructure;
pub mod local;
pub mod ports;
pub mod remote;
pub mod unit_access;
pub mod unit_handle;

pub use infrastructure::{adapter_url, RemoteAdapterClient};
pub use local::{LocalAdapterAccess, LocalAdapterClient};
pub use ports::{AccessState, AdapterAccess, AdapterClient};
pub use remote::RemoteAdapterAccess;
pub use unit_access::UnitAccess;
pub use unit_handle::{create_unit_connections, UnitHandle};

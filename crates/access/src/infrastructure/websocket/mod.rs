//! WebSocket client for the adapter RPC endpoint.

mod client;
mod pending;
mod shared;

pub use client::RemoteAdapterClient;
pub use pending::PendingRequests;
pub use shared::{adapter_url, request_timeout, DEFAULT_REQUEST_TIMEOUT_MS};

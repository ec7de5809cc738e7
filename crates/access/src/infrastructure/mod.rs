//! Infrastructure: the WebSocket transport to remote adapters.

pub mod websocket;

pub use websocket::{adapter_url, RemoteAdapterClient};

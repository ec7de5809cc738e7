//! Frames exchanged on the adapter WebSocket.

use serde::{Deserialize, Serialize};

use crate::calls::AdapterCall;
use crate::responses::ResponseResult;

/// Path of the RPC WebSocket on an adapter.
pub const ADAPTER_ROUTE: &str = "/adapter";

/// Messages from a client (orchestrator) to the adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Invoke one RPC method
    Request {
        /// Unique request ID for correlation
        request_id: String,
        call: AdapterCall,
    },
    /// Application-level liveness probe
    Ping,
}

/// Messages from the adapter to a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Result of a previous request
    Response {
        request_id: String,
        result: ResponseResult,
    },
    Pong,
    /// Frame-level failure not tied to a request (e.g. unparsable JSON)
    Error { code: String, message: String },
}

//! Helpers shared by the remote client and remote access.

use std::time::Duration;

use mmi_domain::{AdapterError, IpAddress};
use mmi_shared::{ResponseResult, ServerMessage, ADAPTER_ROUTE};

/// Default request timeout in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Request timeout from `MMI_REQUEST_TIMEOUT_MS`, or the default.
pub fn request_timeout() -> Duration {
    Duration::from_millis(
        std::env::var("MMI_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
    )
}

/// WebSocket URL of the RPC endpoint at `address`.
pub fn adapter_url(address: &IpAddress) -> String {
    format!("ws://{}:{}{}", address.address, address.port, ADAPTER_ROUTE)
}

/// Parsed server message with `Response` lifted out for easier handling.
#[derive(Debug)]
pub(crate) enum ParsedServerMessage {
    Response {
        request_id: String,
        result: ResponseResult,
    },
    Pong,
    Error(AdapterError),
}

pub(crate) fn parse_server_message(text: &str) -> Result<ParsedServerMessage, serde_json::Error> {
    let msg: ServerMessage = serde_json::from_str(text)?;
    Ok(match msg {
        ServerMessage::Response { request_id, result } => {
            ParsedServerMessage::Response { request_id, result }
        }
        ServerMessage::Pong => ParsedServerMessage::Pong,
        ServerMessage::Error { code, message } => {
            ParsedServerMessage::Error(AdapterError::transport(format!("{code}: {message}")))
        }
    })
}

//! Response types for the adapter request/response pattern

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use mmi_domain::{
    AdapterDescription, AdapterError, BoolResponse, Checkpoint, Constraint, MmuDescription,
    SceneObject, SceneUpdate, SimulationResult,
};

// =============================================================================
// Replies
// =============================================================================

/// Typed payload of a successful call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AdapterReply {
    Bool(BoolResponse),
    Descriptions(Vec<MmuDescription>),
    Description(MmuDescription),
    /// Unit id → instance token
    Instances(HashMap<String, String>),
    Simulation(SimulationResult),
    Constraints(Vec<Constraint>),
    Checkpoint(Checkpoint),
    /// Free-form key/value map (status, function results)
    Properties(HashMap<String, String>),
    SceneObjects(Vec<SceneObject>),
    SceneUpdate(SceneUpdate),
    AdapterDescription(AdapterDescription),
}

macro_rules! reply_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(self) -> Result<$ty, AdapterError> {
            match self {
                AdapterReply::$variant(value) => Ok(value),
                other => Err(AdapterError::transport(format!(
                    "expected {} reply, got {}",
                    stringify!($variant),
                    other.kind()
                ))),
            }
        }
    };
}

impl AdapterReply {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Descriptions(_) => "descriptions",
            Self::Description(_) => "description",
            Self::Instances(_) => "instances",
            Self::Simulation(_) => "simulation",
            Self::Constraints(_) => "constraints",
            Self::Checkpoint(_) => "checkpoint",
            Self::Properties(_) => "properties",
            Self::SceneObjects(_) => "scene_objects",
            Self::SceneUpdate(_) => "scene_update",
            Self::AdapterDescription(_) => "adapter_description",
        }
    }

    reply_accessor!(into_bool, Bool, BoolResponse);
    reply_accessor!(into_descriptions, Descriptions, Vec<MmuDescription>);
    reply_accessor!(into_description, Description, MmuDescription);
    reply_accessor!(into_instances, Instances, HashMap<String, String>);
    reply_accessor!(into_simulation, Simulation, SimulationResult);
    reply_accessor!(into_constraints, Constraints, Vec<Constraint>);
    reply_accessor!(into_checkpoint, Checkpoint, Checkpoint);
    reply_accessor!(into_properties, Properties, HashMap<String, String>);
    reply_accessor!(into_scene_objects, SceneObjects, Vec<SceneObject>);
    reply_accessor!(into_scene_update, SceneUpdate, SceneUpdate);
    reply_accessor!(
        into_adapter_description,
        AdapterDescription,
        AdapterDescription
    );
}

// =============================================================================
// Response Result
// =============================================================================

/// Result of a request operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseResult {
    /// Operation succeeded
    Success { reply: AdapterReply },
    /// Operation failed
    Error {
        /// Error classification code
        code: ErrorCode,
        /// Human-readable error message
        message: String,
        /// Diagnostic lines for the caller's log
        #[serde(default)]
        log_data: Vec<String>,
        /// Structured error, when the peer speaks the same taxonomy
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<AdapterError>,
    },
    /// Unknown response type for forward compatibility
    #[serde(other)]
    Unknown,
}

impl ResponseResult {
    pub fn success(reply: AdapterReply) -> Self {
        ResponseResult::Success { reply }
    }

    pub fn error(err: &AdapterError) -> Self {
        ResponseResult::Error {
            code: ErrorCode::from(err),
            message: err.to_string(),
            log_data: err.diagnostics(),
            error: Some(err.clone()),
        }
    }

    pub fn from_result(result: Result<AdapterReply, AdapterError>) -> Self {
        match result {
            Ok(reply) => Self::success(reply),
            Err(err) => Self::error(&err),
        }
    }

    /// Convert back into the caller-side result.
    ///
    /// Errors without a structured payload become transport failures carrying
    /// the peer's message.
    pub fn into_result(self) -> Result<AdapterReply, AdapterError> {
        match self {
            ResponseResult::Success { reply } => Ok(reply),
            ResponseResult::Error { message, error, .. } => {
                Err(error.unwrap_or_else(|| AdapterError::transport(message)))
            }
            ResponseResult::Unknown => {
                Err(AdapterError::transport("unknown response status from adapter"))
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseResult::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResponseResult::Error { .. })
    }
}

// =============================================================================
// Error Codes
// =============================================================================

/// Error classification codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request was malformed or invalid
    BadRequest,
    /// Requested session, avatar or unit not found
    NotFound,
    /// Operation conflicts with current state
    Conflict,
    /// Unit code failed
    InternalError,
    /// Peer or directory unreachable
    ServiceUnavailable,
    /// Operation timed out
    Timeout,

    /// Unknown variant for forward compatibility
    #[serde(other)]
    Unknown,
}

impl From<&AdapterError> for ErrorCode {
    fn from(err: &AdapterError) -> Self {
        match err {
            AdapterError::InvalidSessionId => ErrorCode::BadRequest,
            AdapterError::SessionNotFound { .. }
            | AdapterError::AvatarNotFound { .. }
            | AdapterError::UnitNotFound { .. } => ErrorCode::NotFound,
            AdapterError::DuplicateSessionId { .. } | AdapterError::InvalidUnitState { .. } => {
                ErrorCode::Conflict
            }
            AdapterError::UnitInstantiationFailure { .. } | AdapterError::UnitFailure { .. } => {
                ErrorCode::InternalError
            }
            AdapterError::Directory(_) | AdapterError::TransportFailure(_) => {
                ErrorCode::ServiceUnavailable
            }
            AdapterError::Timeout(_) => ErrorCode::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_keeps_structured_payload() {
        let err = AdapterError::avatar_not_found("s:b", "b");
        let wire = serde_json::to_string(&ResponseResult::error(&err)).unwrap();
        let parsed: ResponseResult = serde_json::from_str(&wire).unwrap();
        assert!(parsed.is_error());
        assert_eq!(parsed.into_result().unwrap_err(), err);
    }

    #[test]
    fn test_error_without_payload_is_transport_failure() {
        let json = r#"{"status":"error","code":"internal_error","message":"boom"}"#;
        let parsed: ResponseResult = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.into_result().unwrap_err(),
            AdapterError::transport("boom")
        );
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let parsed: ResponseResult = serde_json::from_str(r#"{"status":"later"}"#).unwrap();
        assert!(matches!(parsed, ResponseResult::Unknown));
    }

    #[test]
    fn test_reply_accessor_rejects_other_kind() {
        let reply = AdapterReply::Bool(BoolResponse::ok());
        let err = reply.into_checkpoint().unwrap_err();
        assert!(matches!(err, AdapterError::TransportFailure(_)));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ErrorCode::from(&AdapterError::session_not_found("x")),
            ErrorCode::NotFound
        );
        assert_eq!(
            ErrorCode::from(&AdapterError::duplicate_session("x")),
            ErrorCode::Conflict
        );
    }
}

//! Unified error taxonomy for the adapter substrate
//!
//! Every failure the adapter, its transport or its clients can report maps onto
//! one of these variants. Expected conditions (unknown session, unknown avatar)
//! are values, never panics: callers convert them into wire-level failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for adapter operations
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AdapterError {
    /// Session id was empty or otherwise unusable
    #[error("Session ID invalid")]
    InvalidSessionId,

    /// CreateSession for an id whose scene is already present
    #[error("Session ID already available")]
    DuplicateSessionId { session_id: String },

    /// No session content for the scene part of the id
    #[error("Session content not available {session_id}")]
    SessionNotFound { session_id: String },

    /// Session exists but the avatar part does not
    #[error("Avatar content not available {session_id}, avatarId: {avatar_id}")]
    AvatarNotFound {
        session_id: String,
        avatar_id: String,
    },

    /// Unit id is not loaded for the addressed avatar
    #[error("MMU {unit_id} not available in session {session_id}")]
    UnitNotFound {
        unit_id: String,
        session_id: String,
    },

    /// Unit could not be constructed from its loading descriptor
    #[error("Problem at loading MMU {unit_id}: {reason}")]
    UnitInstantiationFailure { unit_id: String, reason: String },

    /// Call is not allowed in the unit instance's current lifecycle state
    #[error("MMU {unit_id} cannot {operation} while {state}")]
    InvalidUnitState {
        unit_id: String,
        operation: String,
        state: String,
    },

    /// The unit's own code reported an error or panicked
    #[error("MMU {unit_id} failed: {message}")]
    UnitFailure { unit_id: String, message: String },

    /// Directory service rejected or could not serve a request
    #[error("Directory service error: {0}")]
    Directory(String),

    /// Client-side transport problem (connect, send, decode)
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Operation did not complete within its deadline
    #[error("Timed out: {0}")]
    Timeout(String),
}

impl AdapterError {
    pub fn duplicate_session(session_id: impl Into<String>) -> Self {
        Self::DuplicateSessionId {
            session_id: session_id.into(),
        }
    }

    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    pub fn avatar_not_found(session_id: impl Into<String>, avatar_id: impl Into<String>) -> Self {
        Self::AvatarNotFound {
            session_id: session_id.into(),
            avatar_id: avatar_id.into(),
        }
    }

    pub fn unit_not_found(unit_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::UnitNotFound {
            unit_id: unit_id.into(),
            session_id: session_id.into(),
        }
    }

    pub fn instantiation(unit_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnitInstantiationFailure {
            unit_id: unit_id.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_state(
        unit_id: impl Into<String>,
        operation: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self::InvalidUnitState {
            unit_id: unit_id.into(),
            operation: operation.into(),
            state: state.into(),
        }
    }

    /// Creates a failure raised by unit code.
    ///
    /// Units return this from their own operations; the dispatcher also uses it
    /// when a unit panics, with the panic payload as the message.
    pub fn unit_failure(unit_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnitFailure {
            unit_id: unit_id.into(),
            message: message.into(),
        }
    }

    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportFailure(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Human-readable diagnostic list carried back to RPC callers.
    pub fn diagnostics(&self) -> Vec<String> {
        vec![self.to_string()]
    }

    /// True for the lookup failures of the session directory.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound { .. } | Self::AvatarNotFound { .. } | Self::UnitNotFound { .. }
        )
    }
}

//! Boolean result with diagnostics, returned by the bool-typed RPC methods.

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolResponse {
    pub successful: bool,
    #[serde(default)]
    pub log_data: Vec<String>,
}

impl BoolResponse {
    pub fn ok() -> Self {
        Self {
            successful: true,
            log_data: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            successful: false,
            log_data: vec![message.into()],
        }
    }

    pub fn from_error(err: &AdapterError) -> Self {
        Self {
            successful: false,
            log_data: err.diagnostics(),
        }
    }

    pub fn with_log(mut self, message: impl Into<String>) -> Self {
        self.log_data.push(message.into());
        self
    }
}

impl From<Result<(), AdapterError>> for BoolResponse {
    fn from(result: Result<(), AdapterError>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(err) => Self::from_error(&err),
        }
    }
}

impl From<AdapterError> for BoolResponse {
    fn from(err: AdapterError) -> Self {
        Self::from_error(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_from_error_carries_diagnostic() {
        let response = BoolResponse::from(AdapterError::session_not_found("x"));
        assert!(!response.successful);
        assert_eq!(response.log_data, vec!["Session content not available x"]);
    }

    #[test]
    fn test_ok_from_result() {
        assert!(BoolResponse::from(Ok(())).successful);
    }
}

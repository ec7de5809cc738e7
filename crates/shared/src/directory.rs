//! Directory service contract.
//!
//! The directory (the "register") is the external registry where adapters and
//! services advertise their addresses. Adapters register themselves through it;
//! orchestrators discover adapters and services through it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mmi_domain::{AdapterDescription, AdapterError, BoolResponse, ServiceDescription};

/// HTTP routes of a directory service, relative to its base URL.
pub mod routes {
    pub const ADAPTERS: &str = "/adapters";
    pub const ADAPTERS_UNREGISTER: &str = "/adapters/unregister";
    pub const SERVICES: &str = "/services";
    pub const SERVICES_UNREGISTER: &str = "/services/unregister";
}

/// Query string used by the listing routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQuery {
    pub session_id: String,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn registered_adapters(
        &self,
        session_id: &str,
    ) -> Result<Vec<AdapterDescription>, AdapterError>;

    async fn register_adapter(
        &self,
        description: &AdapterDescription,
    ) -> Result<BoolResponse, AdapterError>;

    async fn unregister_adapter(
        &self,
        description: &AdapterDescription,
    ) -> Result<BoolResponse, AdapterError>;

    async fn registered_services(
        &self,
        session_id: &str,
    ) -> Result<Vec<ServiceDescription>, AdapterError>;

    async fn register_service(
        &self,
        description: &ServiceDescription,
    ) -> Result<BoolResponse, AdapterError>;

    async fn unregister_service(
        &self,
        description: &ServiceDescription,
    ) -> Result<BoolResponse, AdapterError>;
}

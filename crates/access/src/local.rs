//! In-process access: calls the adapter's dispatcher directly.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mmi_domain::{AdapterDescription, AdapterError, BoolResponse};
use mmi_shared::AdapterService;

use crate::ports::{AccessState, AdapterAccess, AdapterClient};

pub struct LocalAdapterAccess {
    description: AdapterDescription,
    service: Arc<dyn AdapterService>,
    state: AccessState,
}

impl LocalAdapterAccess {
    pub fn new(description: AdapterDescription, service: Arc<dyn AdapterService>) -> Self {
        Self {
            description,
            service,
            state: AccessState::default(),
        }
    }
}

#[async_trait]
impl AdapterAccess for LocalAdapterAccess {
    fn description(&self) -> &AdapterDescription {
        &self.description
    }

    fn state(&self) -> &AccessState {
        &self.state
    }

    async fn start(&self, _abort: CancellationToken) -> Result<(), AdapterError> {
        self.state.set_initialized(true);
        Ok(())
    }

    async fn create_client(&self) -> Result<Box<dyn AdapterClient>, AdapterError> {
        Ok(Box::new(LocalAdapterClient {
            service: Arc::clone(&self.service),
        }))
    }

    fn service(&self) -> Result<Arc<dyn AdapterService>, AdapterError> {
        Ok(Arc::clone(&self.service))
    }

    async fn close_connection(&self) -> BoolResponse {
        BoolResponse::ok()
    }
}

/// Client sharing the in-process dispatcher; closing it is a no-op.
pub struct LocalAdapterClient {
    service: Arc<dyn AdapterService>,
}

#[async_trait]
impl AdapterClient for LocalAdapterClient {
    fn access(&self) -> &dyn AdapterService {
        self.service.as_ref()
    }

    async fn close(&self) {}
}

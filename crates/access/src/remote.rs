//! Access to an adapter in another process, over the WebSocket RPC endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use mmi_domain::{AdapterDescription, AdapterError, BoolResponse, IpAddress};
use mmi_shared::AdapterService;

use crate::infrastructure::websocket::{adapter_url, request_timeout};
use crate::infrastructure::RemoteAdapterClient;
use crate::ports::{AccessState, AdapterAccess, AdapterClient};

/// Delay between liveness probes while starting.
pub const START_POLL_INTERVAL: Duration = Duration::from_millis(30);

pub struct RemoteAdapterAccess {
    description: AdapterDescription,
    url: String,
    request_timeout: Duration,
    state: AccessState,
    client: RwLock<Option<Arc<RemoteAdapterClient>>>,
}

impl RemoteAdapterAccess {
    /// Access for an adapter advertised at the directory.
    pub fn new(description: AdapterDescription) -> Result<Self, AdapterError> {
        let address = description.primary_address().ok_or_else(|| {
            AdapterError::transport(format!("adapter {} has no address", description.name))
        })?;
        Ok(Self {
            url: adapter_url(address),
            description,
            request_timeout: request_timeout(),
            state: AccessState::default(),
            client: RwLock::new(None),
        })
    }

    /// Access for a manually configured `address:port`.
    pub fn from_address(address: impl Into<String>, port: u16) -> Self {
        let address = IpAddress::new(address, port);
        Self {
            url: adapter_url(&address),
            description: AdapterDescription {
                id: Uuid::new_v4().to_string(),
                name: "Manual connection".to_string(),
                language: "Remote".to_string(),
                addresses: vec![address],
                ..Default::default()
            },
            request_timeout: request_timeout(),
            state: AccessState::default(),
            client: RwLock::new(None),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn aborted(&self, attempts: u32) -> AdapterError {
        tracing::info!(url = %self.url, attempts, "Adapter start aborted");
        AdapterError::transport(format!("start of adapter at {} aborted", self.url))
    }

    async fn probe(&self) -> Result<(), AdapterError> {
        let client =
            Arc::new(RemoteAdapterClient::connect(self.url.clone(), self.request_timeout).await?);
        client.get_status().await?;
        *self.client.write() = Some(client);
        Ok(())
    }
}

#[async_trait]
impl AdapterAccess for RemoteAdapterAccess {
    fn description(&self) -> &AdapterDescription {
        &self.description
    }

    fn state(&self) -> &AccessState {
        &self.state
    }

    /// Poll `GetStatus` until the adapter answers. Only `abort` ends the wait
    /// early; an unreachable peer is "not up yet", never a failure. `abort` is
    /// observed during the pause and while a probe is in flight.
    async fn start(&self, abort: CancellationToken) -> Result<(), AdapterError> {
        let mut attempts: u32 = 0;
        while !self.is_initialized() {
            tokio::select! {
                _ = abort.cancelled() => return Err(self.aborted(attempts)),
                _ = tokio::time::sleep(START_POLL_INTERVAL) => {}
            }

            attempts += 1;
            let probe = tokio::select! {
                _ = abort.cancelled() => return Err(self.aborted(attempts)),
                probe = tokio::time::timeout(self.request_timeout, self.probe()) => probe,
            };
            match probe {
                Ok(Ok(())) => {
                    self.state.set_initialized(true);
                    tracing::info!(
                        adapter = %self.description.name,
                        url = %self.url,
                        attempts,
                        "Remote adapter available"
                    );
                }
                Ok(Err(e)) => {
                    tracing::trace!(url = %self.url, error = %e, "Adapter not reachable yet");
                }
                Err(_) => {
                    tracing::trace!(url = %self.url, "Adapter probe stalled");
                }
            }
        }
        Ok(())
    }

    async fn create_client(&self) -> Result<Box<dyn AdapterClient>, AdapterError> {
        let client = RemoteAdapterClient::connect(self.url.clone(), self.request_timeout).await?;
        Ok(Box::new(client))
    }

    fn service(&self) -> Result<Arc<dyn AdapterService>, AdapterError> {
        match self.client.read().as_ref() {
            Some(client) if !client.is_closed() => Ok(Arc::clone(client) as Arc<dyn AdapterService>),
            _ => Err(AdapterError::transport(format!(
                "adapter at {} is not connected",
                self.url
            ))),
        }
    }

    async fn close_connection(&self) -> BoolResponse {
        if let Some(client) = self.client.write().take() {
            client.close();
        }
        BoolResponse::ok()
    }
}

//! Registration heartbeat.
//!
//! Keeps this adapter listed at the directory service. Each tick checks the
//! listing and registers again if the entry is missing, so a restarted
//! directory relearns the adapter within one interval. Errors never stop the
//! loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mmi_domain::AdapterDescription;
use mmi_shared::DirectoryService;

/// What one heartbeat tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    AlreadyRegistered,
    Registered,
    /// The directory answered but refused the registration.
    Rejected(Vec<String>),
    /// The register call did not get through.
    Failed(String),
}

pub struct RegistrationHandler {
    directory: Arc<dyn DirectoryService>,
    description: AdapterDescription,
    interval: Duration,
}

impl RegistrationHandler {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        description: AdapterDescription,
        interval: Duration,
    ) -> Self {
        Self {
            directory,
            description,
            interval,
        }
    }

    /// One heartbeat: register unless the directory already lists us.
    ///
    /// A failing listing counts as "not listed".
    pub async fn tick(&self) -> RegistrationOutcome {
        match self.directory.registered_adapters("").await {
            Ok(adapters) => {
                if adapters.iter().any(|a| self.description.same_endpoint(a)) {
                    return RegistrationOutcome::AlreadyRegistered;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Directory listing failed, registering anyway");
            }
        }

        match self.directory.register_adapter(&self.description).await {
            Ok(response) if response.successful => {
                tracing::info!(
                    adapter_id = %self.description.id,
                    address = ?self.description.primary_address(),
                    "Adapter registered at directory"
                );
                RegistrationOutcome::Registered
            }
            Ok(response) => {
                tracing::warn!(log = ?response.log_data, "Directory rejected registration");
                RegistrationOutcome::Rejected(response.log_data)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Registration failed, retrying next tick");
                RegistrationOutcome::Failed(e.to_string())
            }
        }
    }

    /// Best-effort unregister; failures are only logged.
    pub async fn unregister(&self) {
        match self.directory.unregister_adapter(&self.description).await {
            Ok(response) if response.successful => {
                tracing::info!(adapter_id = %self.description.id, "Adapter unregistered");
            }
            Ok(response) => {
                tracing::debug!(log = ?response.log_data, "Directory refused unregister");
            }
            Err(e) => {
                tracing::debug!(error = %e, "Unregister failed");
            }
        }
    }

    /// Run the heartbeat until `cancel` fires, then unregister.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                self.tick().await;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
            self.unregister().await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmi_domain::{AdapterError, BoolResponse, IpAddress};
    use mmi_shared::MockDirectoryService;

    fn description() -> AdapterDescription {
        AdapterDescription {
            id: "adapter-1".into(),
            name: "Rust Adapter".into(),
            language: "Rust".into(),
            addresses: vec![IpAddress::new("127.0.0.1", 8900)],
            ..Default::default()
        }
    }

    fn handler(directory: MockDirectoryService) -> RegistrationHandler {
        RegistrationHandler::new(
            Arc::new(directory),
            description(),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_listed_adapter_is_not_registered_again() {
        let mut directory = MockDirectoryService::new();
        directory
            .expect_registered_adapters()
            .times(2)
            .returning(|_| Ok(vec![description()]));
        directory.expect_register_adapter().times(0);

        let handler = handler(directory);
        assert_eq!(handler.tick().await, RegistrationOutcome::AlreadyRegistered);
        assert_eq!(handler.tick().await, RegistrationOutcome::AlreadyRegistered);
    }

    #[tokio::test]
    async fn test_missing_entry_is_registered() {
        let mut directory = MockDirectoryService::new();
        directory.expect_registered_adapters().returning(|_| {
            let mut moved = description();
            moved.addresses = vec![IpAddress::new("127.0.0.1", 9999)];
            Ok(vec![moved])
        });
        directory
            .expect_register_adapter()
            .times(1)
            .returning(|_| Ok(BoolResponse::ok()));

        assert_eq!(handler(directory).tick().await, RegistrationOutcome::Registered);
    }

    #[tokio::test]
    async fn test_listing_error_still_registers() {
        let mut directory = MockDirectoryService::new();
        directory
            .expect_registered_adapters()
            .returning(|_| Err(AdapterError::directory("connection refused")));
        directory
            .expect_register_adapter()
            .times(1)
            .returning(|_| Err(AdapterError::directory("connection refused")));

        let outcome = handler(directory).tick().await;
        assert!(matches!(outcome, RegistrationOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_shutdown_unregisters_and_swallows_errors() {
        let mut directory = MockDirectoryService::new();
        directory
            .expect_registered_adapters()
            .returning(|_| Ok(vec![description()]));
        directory
            .expect_unregister_adapter()
            .times(1)
            .returning(|_| Err(AdapterError::directory("gone")));

        let cancel = CancellationToken::new();
        let handle = Arc::new(handler(directory)).spawn(cancel.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

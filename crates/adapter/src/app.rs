//! Adapter composition root.
//!
//! `AdapterController::start` wires the unit catalog, the session directory,
//! the dispatcher, the RPC listener and the background loops. The returned
//! [`RunningAdapter`] owns every task and stops them on `shutdown`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mmi_domain::{AdapterDescription, IpAddress};
use mmi_shared::DirectoryService;

use crate::api::{self, ApiState};
use crate::dispatcher::AdapterImplementation;
use crate::infrastructure::{
    AdapterConfig, ClockPort, HttpDirectoryClient, InMemoryDirectory, SystemClock,
};
use crate::reaper::SessionReaper;
use crate::registration::RegistrationHandler;
use crate::session::SessionDirectory;
use crate::units::{
    builtin_descriptors, AdapterEndpoint, CompositeUnitProvider, DirectoryUnitProvider,
    StaticUnitProvider, UnitCatalog, UnitProvider, UnitRegistry,
};

/// Language advertised at the directory.
const ADAPTER_LANGUAGE: &str = "Rust";

/// Builds and starts an adapter.
pub struct AdapterController {
    config: AdapterConfig,
    registry: UnitRegistry,
    directory: Option<Arc<dyn DirectoryService>>,
    clock: Arc<dyn ClockPort>,
    providers: Vec<Arc<dyn UnitProvider>>,
    layer: Option<Box<dyn FnOnce(Router) -> Router + Send>>,
}

impl AdapterController {
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            registry: UnitRegistry::new(),
            directory: None,
            clock: Arc::new(SystemClock),
            providers: Vec::new(),
            layer: None,
        }
    }

    /// Use `registry` instead of the built-in units only.
    pub fn with_registry(mut self, registry: UnitRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use `directory` instead of the one derived from the configuration.
    pub fn with_directory(mut self, directory: Arc<dyn DirectoryService>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn ClockPort>) -> Self {
        self.clock = clock;
        self
    }

    /// Add a source of loadable units next to the built-ins and unit folders.
    pub fn with_provider(mut self, provider: Arc<dyn UnitProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Wrap the HTTP router, e.g. with a CORS layer.
    pub fn with_router_layer(
        mut self,
        layer: impl FnOnce(Router) -> Router + Send + 'static,
    ) -> Self {
        self.layer = Some(Box::new(layer));
        self
    }

    fn directory(&self) -> Result<Arc<dyn DirectoryService>> {
        if let Some(directory) = &self.directory {
            return Ok(directory.clone());
        }
        match &self.config.directory_url {
            Some(url) => {
                tracing::info!(url = %url, "Using directory service");
                let client = HttpDirectoryClient::new(url)
                    .with_context(|| format!("invalid DIRECTORY_URL {url}"))?;
                Ok(Arc::new(client))
            }
            None => {
                tracing::info!("No DIRECTORY_URL configured, using in-memory directory");
                Ok(Arc::new(InMemoryDirectory::new()))
            }
        }
    }

    pub async fn start(self) -> Result<RunningAdapter> {
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        let directory = self.directory()?;

        let listener = TcpListener::bind(self.config.bind_address())
            .await
            .with_context(|| format!("failed to bind {}", self.config.bind_address()))?;
        let local_addr = listener.local_addr()?;

        let description = AdapterDescription {
            id: self.config.adapter_id.clone(),
            name: self.config.adapter_name.clone(),
            language: ADAPTER_LANGUAGE.to_string(),
            addresses: vec![IpAddress::new(
                self.config.public_address.clone(),
                local_addr.port(),
            )],
            ..Default::default()
        };

        // Unit discovery
        let mut providers: Vec<Arc<dyn UnitProvider>> =
            vec![Arc::new(StaticUnitProvider::new(builtin_descriptors()))];
        if !self.config.units.paths.is_empty() {
            let folders = Arc::new(DirectoryUnitProvider::new(self.config.units.paths.clone()));
            folders.scan().await;
            tasks.push(
                folders
                    .clone()
                    .spawn(self.config.units.poll_interval, cancel.clone()),
            );
            providers.push(folders);
        }
        providers.extend(self.providers);
        let provider = Arc::new(CompositeUnitProvider::new(providers));

        let registry = Arc::new(self.registry);
        let catalog = Arc::new(UnitCatalog::new());
        catalog.rebuild(provider.available_units(), &registry);
        tasks.push(spawn_catalog_watcher(
            provider,
            catalog.clone(),
            registry.clone(),
            cancel.clone(),
        ));

        // Sessions and dispatcher
        let sessions = Arc::new(SessionDirectory::new(self.clock, directory.clone()));
        let service = Arc::new(AdapterImplementation::new(
            sessions.clone(),
            catalog,
            registry,
            Arc::new(AdapterEndpoint {
                description: description.clone(),
                directory_address: self.config.directory_url.clone(),
            }),
        ));

        // RPC listener
        let mut router = api::router(Arc::new(ApiState::new(service.clone())));
        if let Some(layer) = self.layer {
            router = layer(router);
        }
        let server_cancel = cancel.clone();
        let server = tokio::spawn(async move {
            let shutdown = server_cancel.cancelled_owned();
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(error = %e, "RPC server failed");
            }
        });
        tracing::info!(address = %local_addr, "Adapter listening");

        // Background loops
        let registration = Arc::new(RegistrationHandler::new(
            directory,
            description.clone(),
            self.config.registration_interval,
        ))
        .spawn(cancel.clone());

        match self.config.sessions.timeout {
            Some(timeout) => {
                tracing::info!(timeout_secs = timeout.as_secs(), "Session reaper enabled");
                tasks.push(
                    Arc::new(SessionReaper::new(
                        sessions,
                        timeout,
                        self.config.sessions.sweep_interval,
                    ))
                    .spawn(cancel.clone()),
                );
            }
            None => tracing::debug!("Session reaper disabled"),
        }

        Ok(RunningAdapter {
            local_addr,
            description,
            service,
            cancel,
            server,
            registration,
            tasks,
        })
    }
}

/// Rebuild the catalog whenever the provider signals a change.
fn spawn_catalog_watcher(
    provider: Arc<CompositeUnitProvider>,
    catalog: Arc<UnitCatalog>,
    registry: Arc<UnitRegistry>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut changes = provider.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    catalog.rebuild(provider.available_units(), &registry);
                }
            }
        }
    })
}

/// A started adapter.
pub struct RunningAdapter {
    local_addr: SocketAddr,
    description: AdapterDescription,
    service: Arc<AdapterImplementation>,
    cancel: CancellationToken,
    server: JoinHandle<()>,
    registration: JoinHandle<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningAdapter {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn description(&self) -> &AdapterDescription {
        &self.description
    }

    /// The in-process dispatcher, for local access without the network.
    pub fn service(&self) -> Arc<AdapterImplementation> {
        self.service.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop all loops, unregister from the directory and close the listener.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down adapter");
        self.cancel.cancel();

        if let Err(e) = self.registration.await {
            tracing::warn!(error = %e, "Registration task ended abnormally");
        }
        for task in self.tasks {
            let _ = task.await;
        }
        if let Err(e) = self.server.await {
            tracing::warn!(error = %e, "Server task ended abnormally");
        }
        tracing::info!("Adapter stopped");
    }
}

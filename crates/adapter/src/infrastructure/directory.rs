//! Directory service clients.
//!
//! `HttpDirectoryClient` talks JSON to a remote register; `InMemoryDirectory`
//! keeps the registry in-process for stand-alone runs and tests.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use mmi_domain::{AdapterDescription, AdapterError, BoolResponse, ServiceDescription};
use mmi_shared::directory::routes;
use mmi_shared::{DirectoryService, SessionQuery};

/// Per-request deadline; the heartbeat retries on the next tick anyway.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a directory service's HTTP API
#[derive(Clone)]
pub struct HttpDirectoryClient {
    client: Client,
    base_url: Url,
}

impl HttpDirectoryClient {
    pub fn new(base_url: &str) -> Result<Self, AdapterError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| AdapterError::directory(format!("invalid directory url: {e}")))?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, route: &str) -> Url {
        let path = format!("{}{}", self.base_url.path().trim_end_matches('/'), route);
        let mut url = self.base_url.clone();
        url.set_path(&path);
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        route: &str,
        session_id: &str,
    ) -> Result<T, AdapterError> {
        let response = self
            .client
            .get(self.endpoint(route))
            .query(&SessionQuery {
                session_id: session_id.to_string(),
            })
            .send()
            .await
            .map_err(|e| AdapterError::directory(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdapterError::directory(error_text));
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::directory(e.to_string()))
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<BoolResponse, AdapterError> {
        let response = self
            .client
            .post(self.endpoint(route))
            .json(body)
            .send()
            .await
            .map_err(|e| AdapterError::directory(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdapterError::directory(error_text));
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::directory(e.to_string()))
    }
}

#[async_trait]
impl DirectoryService for HttpDirectoryClient {
    async fn registered_adapters(
        &self,
        session_id: &str,
    ) -> Result<Vec<AdapterDescription>, AdapterError> {
        self.get_json(routes::ADAPTERS, session_id).await
    }

    async fn register_adapter(
        &self,
        description: &AdapterDescription,
    ) -> Result<BoolResponse, AdapterError> {
        self.post_json(routes::ADAPTERS, description).await
    }

    async fn unregister_adapter(
        &self,
        description: &AdapterDescription,
    ) -> Result<BoolResponse, AdapterError> {
        self.post_json(routes::ADAPTERS_UNREGISTER, description)
            .await
    }

    async fn registered_services(
        &self,
        session_id: &str,
    ) -> Result<Vec<ServiceDescription>, AdapterError> {
        self.get_json(routes::SERVICES, session_id).await
    }

    async fn register_service(
        &self,
        description: &ServiceDescription,
    ) -> Result<BoolResponse, AdapterError> {
        self.post_json(routes::SERVICES, description).await
    }

    async fn unregister_service(
        &self,
        description: &ServiceDescription,
    ) -> Result<BoolResponse, AdapterError> {
        self.post_json(routes::SERVICES_UNREGISTER, description)
            .await
    }
}

/// In-process registry.
#[derive(Default)]
pub struct InMemoryDirectory {
    adapters: RwLock<Vec<AdapterDescription>>,
    services: RwLock<Vec<ServiceDescription>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every registration, as a restarted directory would.
    pub fn forget_all(&self) {
        self.adapters.write().clear();
        self.services.write().clear();
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.read().len()
    }
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn registered_adapters(
        &self,
        _session_id: &str,
    ) -> Result<Vec<AdapterDescription>, AdapterError> {
        Ok(self.adapters.read().clone())
    }

    async fn register_adapter(
        &self,
        description: &AdapterDescription,
    ) -> Result<BoolResponse, AdapterError> {
        let mut adapters = self.adapters.write();
        adapters.retain(|a| a.id != description.id);
        adapters.push(description.clone());
        Ok(BoolResponse::ok())
    }

    async fn unregister_adapter(
        &self,
        description: &AdapterDescription,
    ) -> Result<BoolResponse, AdapterError> {
        let mut adapters = self.adapters.write();
        let before = adapters.len();
        adapters.retain(|a| a.id != description.id);
        if adapters.len() == before {
            return Ok(BoolResponse::failure(format!(
                "Adapter {} not registered",
                description.id
            )));
        }
        Ok(BoolResponse::ok())
    }

    async fn registered_services(
        &self,
        _session_id: &str,
    ) -> Result<Vec<ServiceDescription>, AdapterError> {
        Ok(self.services.read().clone())
    }

    async fn register_service(
        &self,
        description: &ServiceDescription,
    ) -> Result<BoolResponse, AdapterError> {
        let mut services = self.services.write();
        services.retain(|s| s.id != description.id);
        services.push(description.clone());
        Ok(BoolResponse::ok())
    }

    async fn unregister_service(
        &self,
        description: &ServiceDescription,
    ) -> Result<BoolResponse, AdapterError> {
        self.services.write().retain(|s| s.id != description.id);
        Ok(BoolResponse::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use mmi_domain::IpAddress;
    use tokio::net::TcpListener;

    fn adapter(id: &str) -> AdapterDescription {
        AdapterDescription {
            id: id.into(),
            name: "test".into(),
            language: "Rust".into(),
            addresses: vec![IpAddress::new("127.0.0.1", 9000)],
            ..Default::default()
        }
    }

    /// Serve `directory` over HTTP the way a remote register would.
    async fn spawn_directory_server(directory: Arc<InMemoryDirectory>) -> String {
        async fn list(
            State(d): State<Arc<InMemoryDirectory>>,
            Query(q): Query<SessionQuery>,
        ) -> Json<Vec<AdapterDescription>> {
            Json(d.registered_adapters(&q.session_id).await.unwrap_or_default())
        }
        async fn register(
            State(d): State<Arc<InMemoryDirectory>>,
            Json(desc): Json<AdapterDescription>,
        ) -> Json<BoolResponse> {
            Json(
                d.register_adapter(&desc)
                    .await
                    .unwrap_or_else(BoolResponse::from),
            )
        }
        async fn unregister(
            State(d): State<Arc<InMemoryDirectory>>,
            Json(desc): Json<AdapterDescription>,
        ) -> Json<BoolResponse> {
            Json(
                d.unregister_adapter(&desc)
                    .await
                    .unwrap_or_else(BoolResponse::from),
            )
        }

        let router = Router::new()
            .route(routes::ADAPTERS, get(list).post(register))
            .route(routes::ADAPTERS_UNREGISTER, post(unregister))
            .with_state(directory);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_in_memory_register_is_upsert() {
        let directory = InMemoryDirectory::new();
        directory.register_adapter(&adapter("a")).await.unwrap();
        directory.register_adapter(&adapter("a")).await.unwrap();
        assert_eq!(directory.adapter_count(), 1);

        let response = directory.unregister_adapter(&adapter("b")).await.unwrap();
        assert!(!response.successful);
        directory.forget_all();
        assert_eq!(directory.adapter_count(), 0);
    }

    #[tokio::test]
    async fn test_http_client_round_trip() {
        let backing = Arc::new(InMemoryDirectory::new());
        let url = spawn_directory_server(backing.clone()).await;
        let client = HttpDirectoryClient::new(&url).unwrap();

        assert!(client.registered_adapters("").await.unwrap().is_empty());
        assert!(client.register_adapter(&adapter("a")).await.unwrap().successful);
        let listed = client.registered_adapters("").await.unwrap();
        assert_eq!(listed, vec![adapter("a")]);

        assert!(client.unregister_adapter(&adapter("a")).await.unwrap().successful);
        assert_eq!(backing.adapter_count(), 0);
    }

    #[tokio::test]
    async fn test_http_client_unreachable_is_directory_error() {
        // Port 9 (discard) is not served in test environments.
        let client = HttpDirectoryClient::new("http://127.0.0.1:9").unwrap();
        let err = client.registered_adapters("").await.unwrap_err();
        assert!(matches!(err, AdapterError::Directory(_)));
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(HttpDirectoryClient::new("not a url").is_err());
    }
}

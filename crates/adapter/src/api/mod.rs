//! API layer - WebSocket RPC and HTTP entry points.

pub mod connections;
pub mod http;
pub mod websocket;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use mmi_shared::AdapterService;

pub use connections::ConnectionManager;
pub use mmi_shared::ADAPTER_ROUTE;

/// Shared state of every route.
pub struct ApiState {
    pub service: Arc<dyn AdapterService>,
    pub connections: Arc<ConnectionManager>,
}

impl ApiState {
    pub fn new(service: Arc<dyn AdapterService>) -> Self {
        Self {
            service,
            connections: Arc::new(ConnectionManager::new()),
        }
    }
}

/// Router with the RPC socket and the HTTP routes.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(ADAPTER_ROUTE, get(websocket::ws_handler))
        .merge(http::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

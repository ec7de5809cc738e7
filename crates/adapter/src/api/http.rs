//! HTTP routes.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use super::ApiState;

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/status", get(status))
}

async fn health() -> &'static str {
    "OK"
}

async fn status(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    let mut status = state
        .service
        .get_status()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    status.insert(
        "Open Connections".to_string(),
        state.connections.count().await.to_string(),
    );
    status.insert(
        "Open Connection Requests".to_string(),
        state.connections.open_requests().await.to_string(),
    );
    Ok(Json(status))
}

#[derive(Debug)]
pub enum ApiError {
    Internal(String),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Status request failed");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::dispatcher::tests::adapter;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_route() {
        let app = router(Arc::new(ApiState::new(Arc::new(adapter()))));

        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_status_route_serves_status_map() {
        let state = Arc::new(ApiState::new(Arc::new(adapter())));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });

        let status: HashMap<String, String> = reqwest::get(format!("http://{addr}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["Total Sessions"], "0");
        assert_eq!(status["Open Connections"], "0");
        assert_eq!(status["Open Connection Requests"], "0");
    }

    #[tokio::test]
    async fn test_status_counts_requests_of_open_connections() {
        let state = Arc::new(ApiState::new(Arc::new(adapter())));
        let connection = mmi_domain::ConnectionId::new();
        state.connections.register(connection).await;
        state.connections.record_request(connection).await;
        state.connections.record_request(connection).await;

        let request = Request::builder().uri("/status").body(Body::empty()).unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let status: HashMap<String, String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(status["Open Connections"], "1");
        assert_eq!(status["Open Connection Requests"], "2");
    }
}

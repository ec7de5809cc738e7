//! Connection bookkeeping for RPC WebSocket clients.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use mmi_domain::ConnectionId;

/// Information about a connected client.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub connected_at: DateTime<Utc>,
    /// Requests received on this connection
    pub requests: u64,
}

/// Tracks open RPC connections.
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, ConnectionInfo>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    pub async fn register(&self, connection_id: ConnectionId) {
        let info = ConnectionInfo {
            connection_id,
            connected_at: Utc::now(),
            requests: 0,
        };
        self.connections.write().await.insert(connection_id, info);
        tracing::debug!(connection_id = %connection_id, "Connection registered");
    }

    /// Unregister a connection.
    pub async fn unregister(&self, connection_id: ConnectionId) {
        if self
            .connections
            .write()
            .await
            .remove(&connection_id)
            .is_some()
        {
            tracing::debug!(connection_id = %connection_id, "Connection unregistered");
        }
    }

    /// Count one request on `connection_id`.
    pub async fn record_request(&self, connection_id: ConnectionId) {
        if let Some(info) = self.connections.write().await.get_mut(&connection_id) {
            info.requests += 1;
        }
    }

    /// Requests received over the connections that are still open.
    pub async fn open_requests(&self) -> u64 {
        self.connections
            .read()
            .await
            .values()
            .map(|info| info.requests)
            .sum()
    }

    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_count_unregister() {
        let manager = ConnectionManager::new();
        let id = ConnectionId::new();
        manager.register(id).await;
        manager.record_request(id).await;
        manager.record_request(id).await;

        assert_eq!(manager.count().await, 1);
        assert_eq!(manager.open_requests().await, 2);

        manager.unregister(id).await;
        assert_eq!(manager.count().await, 0);
        manager.record_request(id).await;
        assert_eq!(manager.open_requests().await, 0);
    }
}

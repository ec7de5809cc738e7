//! Client-side contracts for reaching an adapter.
//!
//! `AdapterAccess` is what an orchestrator holds per adapter, whether the
//! adapter runs in-process or behind a WebSocket. The RPC forwarding is
//! shared: implementors only say how to start, how to reach the adapter's
//! `AdapterService` and how to open per-unit clients.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use mmi_domain::{
    AdapterDescription, AdapterError, BoolResponse, Checkpoint, MmuDescription, SceneObject,
    SceneUpdate,
};
use mmi_shared::AdapterService;

/// A disposable connection to an adapter, owned by one call site.
#[async_trait]
pub trait AdapterClient: Send + Sync {
    /// RPC surface of the connected adapter.
    fn access(&self) -> &dyn AdapterService;

    /// Release the connection. Later calls through `access` fail.
    async fn close(&self);
}

/// Flags and caches every access keeps.
#[derive(Debug, Default)]
pub struct AccessState {
    initialized: AtomicBool,
    loaded: AtomicBool,
    scene_synchronized: AtomicBool,
    descriptions: RwLock<Vec<MmuDescription>>,
}

impl AccessState {
    pub fn set_initialized(&self, value: bool) {
        self.initialized.store(value, Ordering::SeqCst);
    }

    pub fn set_loaded(&self, value: bool) {
        self.loaded.store(value, Ordering::SeqCst);
    }

    pub fn set_scene_synchronized(&self, value: bool) {
        self.scene_synchronized.store(value, Ordering::SeqCst);
    }

    pub fn set_descriptions(&self, descriptions: Vec<MmuDescription>) {
        *self.descriptions.write() = descriptions;
    }
}

#[async_trait]
pub trait AdapterAccess: Send + Sync {
    fn description(&self) -> &AdapterDescription;

    fn state(&self) -> &AccessState;

    /// Make the adapter usable. Remote accesses block until the peer answers
    /// or `abort` fires.
    async fn start(&self, abort: CancellationToken) -> Result<(), AdapterError>;

    /// Open a client for one unit handle.
    async fn create_client(&self) -> Result<Box<dyn AdapterClient>, AdapterError>;

    /// The adapter's RPC surface for session-wide calls.
    fn service(&self) -> Result<Arc<dyn AdapterService>, AdapterError>;

    async fn close_connection(&self) -> BoolResponse;

    fn is_initialized(&self) -> bool {
        self.state().initialized.load(Ordering::SeqCst)
    }

    fn is_loaded(&self) -> bool {
        self.state().loaded.load(Ordering::SeqCst)
    }

    fn scene_synchronized(&self) -> bool {
        self.state().scene_synchronized.load(Ordering::SeqCst)
    }

    /// Units reported by the last `get_loadable_mmus`.
    fn unit_descriptions(&self) -> Vec<MmuDescription> {
        self.state().descriptions.read().clone()
    }

    async fn create_session(&self, session_id: &str) -> Result<BoolResponse, AdapterError> {
        self.service()?.create_session(session_id).await
    }

    async fn close_session(&self, session_id: &str) -> Result<BoolResponse, AdapterError> {
        self.service()?.close_session(session_id).await
    }

    async fn get_loadable_mmus(
        &self,
        session_id: &str,
    ) -> Result<Vec<MmuDescription>, AdapterError> {
        let descriptions = self.service()?.get_loadable_mmus(session_id).await?;
        self.state().set_descriptions(descriptions.clone());
        Ok(descriptions)
    }

    /// Units loaded for `session_id`.
    async fn get_mmus(&self, session_id: &str) -> Result<Vec<MmuDescription>, AdapterError> {
        self.service()?.get_mmus(session_id).await
    }

    /// Load `ids`; successful only if the adapter loaded every one of them.
    async fn load_mmus(
        &self,
        ids: Vec<String>,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        let requested = ids.clone();
        let loaded = self.service()?.load_mmus(ids, session_id).await?;

        let missing: Vec<&String> = requested
            .iter()
            .filter(|id| !loaded.contains_key(id.as_str()))
            .collect();
        if missing.is_empty() {
            self.state().set_loaded(true);
            return Ok(BoolResponse::ok());
        }

        tracing::warn!(
            adapter = %self.description().name,
            session_id,
            ?missing,
            "Adapter did not load every requested unit"
        );
        let mut response = BoolResponse::failure("Not every requested MMU could be loaded");
        for id in missing {
            response = response.with_log(format!("MMU {id} not loaded"));
        }
        Ok(response)
    }

    async fn push_scene(
        &self,
        scene_update: SceneUpdate,
        session_id: &str,
    ) -> Result<BoolResponse, AdapterError> {
        self.state().set_scene_synchronized(false);
        let response = self.service()?.push_scene(scene_update, session_id).await?;
        self.state().set_scene_synchronized(true);
        Ok(response)
    }

    async fn get_scene(&self, session_id: &str) -> Result<Vec<SceneObject>, AdapterError> {
        self.service()?.get_scene(session_id).await
    }

    async fn get_scene_changes(&self, session_id: &str) -> Result<SceneUpdate, AdapterError> {
        self.service()?.get_scene_changes(session_id).await
    }

    async fn get_status(&self) -> Result<HashMap<String, String>, AdapterError> {
        self.service()?.get_status().await
    }

    async fn create_checkpoint(
        &self,
        unit_id: &str,
        session_id: &str,
    ) -> Result<Checkpoint, AdapterError> {
        self.service()?.create_checkpoint(unit_id, session_id).await
    }

    async fn restore_checkpoint(
        &self,
        unit_id: &str,
        session_id: &str,
        checkpoint: Checkpoint,
    ) -> Result<BoolResponse, AdapterError> {
        self.service()?
            .restore_checkpoint(unit_id, session_id, checkpoint)
            .await
    }
}

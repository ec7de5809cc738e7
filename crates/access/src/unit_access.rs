//! Multi-adapter orchestration for one session.
//!
//! `UnitAccess` connects to every adapter a simulation uses, creates the
//! session on each, loads and initializes units across them and fans scene
//! updates out. Adapters that do not come up within the timeout are dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use mmi_domain::{
    AdapterDescription, AdapterError, AvatarDescription, Checkpoint, MmuDescription, SceneObject,
    SceneUpdate,
};
use mmi_shared::DirectoryService;

use crate::ports::AdapterAccess;
use crate::remote::RemoteAdapterAccess;
use crate::unit_handle::{create_unit_connections, UnitHandle};

/// Delay between directory listing attempts while connecting.
const DIRECTORY_RETRY_INTERVAL: Duration = Duration::from_millis(100);

pub struct UnitAccess {
    session_id: String,
    adapters: RwLock<Vec<Arc<dyn AdapterAccess>>>,
    units: RwLock<Vec<Arc<UnitHandle>>>,
    descriptions: RwLock<Vec<MmuDescription>>,
    initialized: AtomicBool,
}

impl UnitAccess {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            adapters: RwLock::new(Vec::new()),
            units: RwLock::new(Vec::new()),
            descriptions: RwLock::new(Vec::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Access with a fresh random session id.
    pub fn with_random_session() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn adapters(&self) -> Vec<Arc<dyn AdapterAccess>> {
        self.adapters.read().clone()
    }

    pub fn adapter_descriptions(&self) -> Vec<AdapterDescription> {
        self.adapters
            .read()
            .iter()
            .map(|a| a.description().clone())
            .collect()
    }

    pub fn units(&self) -> Vec<Arc<UnitHandle>> {
        self.units.read().clone()
    }

    pub fn unit(&self, unit_id: &str) -> Option<Arc<UnitHandle>> {
        self.units.read().iter().find(|u| u.id() == unit_id).cloned()
    }

    /// Every adapter is up. False while no adapter is known.
    pub fn is_loaded(&self) -> bool {
        let adapters = self.adapters.read();
        !adapters.is_empty() && adapters.iter().all(|a| a.is_initialized())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Descriptions collected by `loadable_units`.
    pub fn unit_descriptions(&self) -> Vec<MmuDescription> {
        self.descriptions.read().clone()
    }

    /// Start `adapters` and create the session on each, in parallel.
    ///
    /// Adapters already known (same name at the same address) are skipped.
    /// Adapters that do not finish within `timeout` are closed and dropped.
    /// Returns whether at least one adapter is connected.
    pub async fn connect(&self, adapters: Vec<Arc<dyn AdapterAccess>>, timeout: Duration) -> bool {
        {
            let mut known = self.adapters.write();
            for adapter in adapters {
                if known
                    .iter()
                    .any(|k| k.description().same_named_endpoint(adapter.description()))
                {
                    continue;
                }
                tracing::info!(adapter = %adapter.description().name, "Adding adapter");
                known.push(adapter);
            }
        }

        let candidates = self.adapters();
        let abort = CancellationToken::new();
        let starts = candidates.iter().map(|adapter| {
            let abort = abort.clone();
            async move {
                let connect = async {
                    adapter.start(abort).await?;
                    adapter.create_session(&self.session_id).await
                };
                match tokio::time::timeout(timeout, connect).await {
                    Ok(Ok(response)) if response.successful => true,
                    Ok(Ok(response)) => {
                        // an existing session is fine
                        tracing::debug!(
                            adapter = %adapter.description().name,
                            log = ?response.log_data,
                            "CreateSession refused"
                        );
                        adapter.is_initialized()
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(adapter = %adapter.description().name, error = %e, "Adapter connect failed");
                        false
                    }
                    Err(_) => {
                        tracing::warn!(adapter = %adapter.description().name, "Adapter connect timed out");
                        false
                    }
                }
            }
        });
        let results = join_all(starts).await;
        abort.cancel();

        let mut dropped = Vec::new();
        {
            let mut known = self.adapters.write();
            for (adapter, connected) in candidates.iter().zip(results) {
                if !connected {
                    known.retain(|k| !Arc::ptr_eq(k, adapter));
                    dropped.push(Arc::clone(adapter));
                }
            }
        }
        for adapter in dropped {
            adapter.close_connection().await;
        }

        !self.adapters.read().is_empty()
    }

    /// Discover adapters at the directory and connect to them.
    ///
    /// Listing is retried until `timeout`; the same `timeout` then bounds
    /// connecting.
    pub async fn connect_directory(
        &self,
        directory: Arc<dyn DirectoryService>,
        timeout: Duration,
    ) -> bool {
        let listing = async {
            loop {
                match directory.registered_adapters(&self.session_id).await {
                    Ok(descriptions) => break descriptions,
                    Err(e) => {
                        tracing::debug!(error = %e, "Directory not reachable yet");
                        tokio::time::sleep(DIRECTORY_RETRY_INTERVAL).await;
                    }
                }
            }
        };
        let Ok(descriptions) = tokio::time::timeout(timeout, listing).await else {
            tracing::warn!("No adapter list received from directory");
            return false;
        };

        let adapters = descriptions
            .into_iter()
            .filter_map(|description| match RemoteAdapterAccess::new(description) {
                Ok(access) => Some(Arc::new(access) as Arc<dyn AdapterAccess>),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping adapter without address");
                    None
                }
            })
            .collect();
        self.connect(adapters, timeout).await
    }

    /// Add `adapter`. A known adapter with the same name and address is
    /// replaced: its unit handles move to `adapter` and it is closed.
    pub async fn add_adapter(&self, adapter: Arc<dyn AdapterAccess>) -> Result<(), AdapterError> {
        let previous = self
            .adapters
            .read()
            .iter()
            .find(|k| k.description().same_named_endpoint(adapter.description()))
            .cloned();

        if let Some(previous) = previous {
            for unit in self.units().iter().filter(|u| u.is_bound_to(&previous)) {
                unit.change_adapter(Arc::clone(&adapter)).await?;
            }
            previous.close_connection().await;
            self.adapters.write().retain(|k| !Arc::ptr_eq(k, &previous));
            tracing::info!(adapter = %adapter.description().name, "Replaced adapter");
        }

        self.adapters.write().push(adapter);
        Ok(())
    }

    /// Loadable units of every adapter, concatenated.
    pub async fn loadable_units(&self) -> Result<Vec<MmuDescription>, AdapterError> {
        let mut units = Vec::new();
        for adapter in self.adapters() {
            units.extend(adapter.get_loadable_mmus(&self.session_id).await?);
        }
        *self.descriptions.write() = units.clone();
        Ok(units)
    }

    /// Load `descriptions` on every adapter and collect handles for what each
    /// adapter loaded. True only if every adapter finished within `timeout`.
    pub async fn load_units(&self, descriptions: &[MmuDescription], timeout: Duration) -> bool {
        let ids: Vec<String> = descriptions.iter().map(|d| d.id.clone()).collect();
        let adapters = self.adapters();

        let loads = adapters.iter().map(|adapter| {
            let ids = ids.clone();
            async move {
                adapter.load_mmus(ids, &self.session_id).await?;
                create_unit_connections(adapter, &self.session_id).await
            }
        });

        let results = match tokio::time::timeout(timeout, join_all(loads)).await {
            Ok(results) => results,
            Err(_) => {
                tracing::warn!("Timeout while loading units");
                return false;
            }
        };

        let mut handles = Vec::new();
        for (adapter, result) in adapters.iter().zip(results) {
            match result {
                Ok(created) => handles.extend(created.into_iter().map(Arc::new)),
                Err(e) => {
                    tracing::warn!(adapter = %adapter.description().name, error = %e, "Loading units failed");
                    return false;
                }
            }
        }

        // GetMMus reports every unit of the session, so earlier loads come
        // back too; keep the handles already held for those.
        let duplicates = {
            let mut units = self.units.write();
            let (fresh, held): (Vec<_>, Vec<_>) = handles.into_iter().partition(|handle| {
                !units
                    .iter()
                    .any(|unit| unit.id() == handle.id() && handle.is_bound_to(&unit.adapter()))
            });
            tracing::info!(count = fresh.len(), "Units loaded");
            units.extend(fresh);
            held
        };
        for handle in duplicates {
            handle.close_connection().await;
        }
        true
    }

    /// Initialize every loaded unit in parallel.
    pub async fn initialize_units(
        &self,
        avatar_description: &AvatarDescription,
        properties: HashMap<String, String>,
        timeout: Duration,
    ) -> bool {
        if !self.is_loaded() {
            return false;
        }

        let units = self.units();
        let calls = units.iter().map(|unit| {
            let avatar_description = avatar_description.clone();
            let properties = properties.clone();
            async move {
                match unit.initialize(avatar_description, properties).await {
                    Ok(response) if response.successful => true,
                    Ok(response) => {
                        tracing::warn!(unit_id = %unit.id(), log = ?response.log_data, "Unit refused initialization");
                        false
                    }
                    Err(e) => {
                        tracing::warn!(unit_id = %unit.id(), error = %e, "Unit initialization failed");
                        false
                    }
                }
            }
        });

        let success = match tokio::time::timeout(timeout, join_all(calls)).await {
            Ok(results) => results.into_iter().all(|ok| ok),
            Err(_) => {
                tracing::warn!("Timeout while initializing units");
                false
            }
        };
        if success {
            self.initialized.store(true, Ordering::SeqCst);
        }
        success
    }

    /// Push `scene_update` to every adapter in parallel. True if every
    /// adapter accepted it.
    pub async fn push_scene(&self, scene_update: &SceneUpdate) -> bool {
        let adapters = self.adapters();
        let pushes = adapters.iter().map(|adapter| {
            let update = scene_update.clone();
            async move {
                match adapter.push_scene(update, &self.session_id).await {
                    Ok(response) => {
                        if !response.log_data.is_empty() {
                            tracing::debug!(adapter = %adapter.description().name, log = ?response.log_data, "Scene pushed with diagnostics");
                        }
                        response.successful
                    }
                    Err(e) => {
                        tracing::warn!(adapter = %adapter.description().name, error = %e, "Scene push failed");
                        false
                    }
                }
            }
        });
        join_all(pushes).await.into_iter().all(|ok| ok)
    }

    /// Checkpoints of the listed units that are loaded.
    pub async fn create_checkpoint(
        &self,
        unit_ids: &[String],
    ) -> Result<HashMap<String, Checkpoint>, AdapterError> {
        let mut checkpoints = HashMap::new();
        for unit in self.units() {
            if unit_ids.iter().any(|id| id == unit.id()) {
                checkpoints.insert(unit.id().to_string(), unit.create_checkpoint().await?);
            }
        }
        Ok(checkpoints)
    }

    /// Restore every loaded unit that has an entry in `checkpoints`.
    pub async fn restore_checkpoint(
        &self,
        checkpoints: &HashMap<String, Checkpoint>,
    ) -> Result<(), AdapterError> {
        for unit in self.units() {
            if let Some(checkpoint) = checkpoints.get(unit.id()) {
                let response = unit.restore_checkpoint(checkpoint.clone()).await?;
                if !response.successful {
                    tracing::warn!(unit_id = %unit.id(), log = ?response.log_data, "Checkpoint not restored");
                }
            }
        }
        Ok(())
    }

    /// Scene as seen by the first adapter; empty without adapters.
    pub async fn fetch_scene(&self) -> Result<Vec<SceneObject>, AdapterError> {
        let first = self.adapters.read().first().cloned();
        match first {
            Some(adapter) => adapter.get_scene(&self.session_id).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn fetch_scene_changes(&self) -> Result<SceneUpdate, AdapterError> {
        let first = self.adapters.read().first().cloned();
        match first {
            Some(adapter) => adapter.get_scene_changes(&self.session_id).await,
            None => Ok(SceneUpdate::default()),
        }
    }

    /// Close the session on every adapter, then dispose every unit and close
    /// all connections. Failures are logged and skipped.
    pub async fn dispose(&self) {
        for unit in self.units() {
            if let Err(e) = unit.dispose().await {
                tracing::debug!(unit_id = %unit.id(), error = %e, "Unit dispose failed");
            }
            unit.close_connection().await;
        }
        for adapter in self.adapters() {
            if let Err(e) = adapter.close_session(&self.session_id).await {
                tracing::debug!(adapter = %adapter.description().name, error = %e, "CloseSession failed");
            }
            adapter.close_connection().await;
        }
        self.units.write().clear();
        self.initialized.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmi_domain::{AvatarPostureValues, Instruction, SimulationState, Transform};
    use mmi_shared::AdapterService;

    use crate::local::LocalAdapterAccess;
    use crate::test_support::start_adapter;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn local(adapter: &mmi_adapter::RunningAdapter) -> Arc<dyn AdapterAccess> {
        let service: Arc<dyn AdapterService> = adapter.service();
        Arc::new(LocalAdapterAccess::new(adapter.description().clone(), service))
    }

    fn remote(adapter: &mmi_adapter::RunningAdapter) -> Arc<dyn AdapterAccess> {
        Arc::new(RemoteAdapterAccess::new(adapter.description().clone()).unwrap())
    }

    fn walk_to(x: f64) -> Instruction {
        Instruction {
            id: "i1".into(),
            name: "walk".into(),
            properties: HashMap::from([("TargetPosition".to_string(), format!("{x},0,0"))]),
            ..Default::default()
        }
    }

    fn origin() -> SimulationState {
        SimulationState::at(AvatarPostureValues::new("0", vec![0.0; 3]))
    }

    async fn loaded(access: &UnitAccess, ids: &[&str]) {
        let loadable = access.loadable_units().await.unwrap();
        let wanted: Vec<MmuDescription> = loadable
            .into_iter()
            .filter(|d| ids.contains(&d.id.as_str()))
            .collect();
        assert!(access.load_units(&wanted, TIMEOUT).await);
    }

    #[tokio::test]
    async fn test_local_and_remote_adapters_share_a_session() {
        let first = start_adapter().await;
        let second = start_adapter().await;
        let access = UnitAccess::new("scene1");

        assert!(access.connect(vec![local(&first), remote(&second)], TIMEOUT).await);
        assert!(access.is_loaded());
        assert_eq!(access.adapters().len(), 2);

        loaded(&access, &["idle"]).await;
        // one handle per adapter
        assert_eq!(access.units().len(), 2);

        assert!(
            access
                .initialize_units(&AvatarDescription::default(), HashMap::new(), TIMEOUT)
                .await
        );
        assert!(access.is_initialized());

        access.dispose().await;
        first.shutdown().await;
        second.shutdown().await;
    }

    #[tokio::test]
    async fn test_second_load_keeps_one_handle_per_unit() {
        let running = start_adapter().await;
        let access = UnitAccess::new("scene1");
        assert!(access.connect(vec![local(&running)], TIMEOUT).await);

        loaded(&access, &["idle"]).await;
        loaded(&access, &["linear_move"]).await;

        let mut ids: Vec<String> = access.units().iter().map(|u| u.id().to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["idle", "linear_move"]);

        running.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_adapter_is_dropped() {
        let running = start_adapter().await;
        let access = UnitAccess::with_random_session();

        let dead: Arc<dyn AdapterAccess> = Arc::new(RemoteAdapterAccess::from_address("127.0.0.1", 9));
        let connected = access
            .connect(vec![local(&running), dead], Duration::from_millis(300))
            .await;

        assert!(connected);
        assert_eq!(access.adapters().len(), 1);
        running.shutdown().await;
    }

    #[tokio::test]
    async fn test_initialize_requires_loaded_adapters() {
        let access = UnitAccess::new("scene1");
        assert!(!access.is_loaded());
        assert!(
            !access
                .initialize_units(&AvatarDescription::default(), HashMap::new(), TIMEOUT)
                .await
        );
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip_through_handles() {
        let running = start_adapter().await;
        let access = UnitAccess::new("scene1");
        assert!(access.connect(vec![remote(&running)], TIMEOUT).await);
        loaded(&access, &["linear_move"]).await;
        assert!(
            access
                .initialize_units(&AvatarDescription::default(), HashMap::new(), TIMEOUT)
                .await
        );

        let unit = access.unit("linear_move").unwrap();
        assert!(unit.assign_instruction(walk_to(10.0), origin()).await.unwrap().successful);
        unit.do_step(1.0, origin()).await.unwrap();

        let saved = access
            .create_checkpoint(&["linear_move".to_string()])
            .await
            .unwrap();
        let expected = unit.do_step(1.0, origin()).await.unwrap();

        access.restore_checkpoint(&saved).await.unwrap();
        let replayed = unit.do_step(1.0, origin()).await.unwrap();
        assert_eq!(replayed.posture, expected.posture);

        access.dispose().await;
        running.shutdown().await;
    }

    #[tokio::test]
    async fn test_scene_push_and_fetch() {
        let running = start_adapter().await;
        let access = UnitAccess::new("scene1");
        assert!(access.connect(vec![local(&running)], TIMEOUT).await);

        let update = SceneUpdate {
            added_scene_objects: vec![SceneObject {
                id: "box".into(),
                name: "Box".into(),
                transform: Transform::default(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(access.push_scene(&update).await);
        assert!(access.adapters()[0].scene_synchronized());

        let scene = access.fetch_scene().await.unwrap();
        assert_eq!(scene.len(), 1);
        let changes = access.fetch_scene_changes().await.unwrap();
        assert_eq!(changes.added_scene_objects.len(), 1);

        // adding the same object again is reported, not fatal
        assert!(access.push_scene(&update).await);

        running.shutdown().await;
    }

    #[tokio::test]
    async fn test_add_adapter_moves_units_to_replacement() {
        let running = start_adapter().await;
        let access = UnitAccess::new("scene1");
        let original = remote(&running);
        assert!(access.connect(vec![Arc::clone(&original)], TIMEOUT).await);
        loaded(&access, &["idle"]).await;

        let replacement = local(&running);
        access.add_adapter(Arc::clone(&replacement)).await.unwrap();

        assert_eq!(access.adapters().len(), 1);
        let unit = access.unit("idle").unwrap();
        assert!(unit.is_bound_to(&replacement));
        assert!(!unit.is_bound_to(&original));
        // still the same unit in the same session
        assert!(
            unit.initialize(AvatarDescription::default(), HashMap::new())
                .await
                .unwrap()
                .successful
        );

        running.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_access_fetches_empty_scene() {
        let access = UnitAccess::new("scene1");
        assert!(access.fetch_scene().await.unwrap().is_empty());
        assert_eq!(access.fetch_scene_changes().await.unwrap(), SceneUpdate::default());
    }
}

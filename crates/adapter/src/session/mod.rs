//! Session directory: scene id → session → avatar → unit instances.
//!
//! Every map is a `DashMap`, so lookups and insertions for different keys never
//! contend on a global lock. Removing a session drops the only strong
//! reference the directory holds; its avatars and units go with it.

mod content;
mod instance;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use mmi_domain::{AdapterError, SessionId};
use mmi_shared::DirectoryService;

use crate::infrastructure::ClockPort;
use crate::services::ServiceAccess;

pub use content::{AvatarContent, SessionContent};
pub(crate) use instance::panic_message;
pub use instance::{UnitInstance, UnitState};

const NEVER: i64 = i64::MIN;

pub struct SessionDirectory {
    sessions: DashMap<String, Arc<SessionContent>>,
    clock: Arc<dyn ClockPort>,
    directory: Arc<dyn DirectoryService>,
    started_at: DateTime<Utc>,
    /// Latest access over all sessions, in epoch millis.
    last_access: AtomicI64,
}

impl SessionDirectory {
    pub fn new(clock: Arc<dyn ClockPort>, directory: Arc<dyn DirectoryService>) -> Self {
        let started_at = clock.now();
        Self {
            sessions: DashMap::new(),
            clock,
            directory,
            started_at,
            last_access: AtomicI64::new(NEVER),
        }
    }

    /// Create the session content for the scene and the avatar content for
    /// the avatar of `id`.
    ///
    /// An existing scene is kept and only gains the avatar. Fails with
    /// `DuplicateSessionId` if both already exist.
    pub fn create(&self, id: &SessionId) -> Result<Arc<SessionContent>, AdapterError> {
        let content = self
            .sessions
            .entry(id.scene_id().to_string())
            .or_insert_with(|| {
                Arc::new(SessionContent::new(
                    id.scene_id(),
                    ServiceAccess::new(self.directory.clone(), id.as_str()),
                    self.clock.now(),
                ))
            })
            .clone();

        if !content.add_avatar(id.avatar_id()) {
            return Err(AdapterError::duplicate_session(id.as_str()));
        }

        self.touch(&content);
        tracing::info!(session_id = %id, "Session created");
        Ok(content)
    }

    /// Session content for the scene of `id`. Never creates.
    pub fn get(&self, id: &SessionId) -> Result<Arc<SessionContent>, AdapterError> {
        self.sessions
            .get(id.scene_id())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AdapterError::session_not_found(id.as_str()))
    }

    /// Session and avatar content addressed by `id`.
    pub fn contents(
        &self,
        id: &SessionId,
    ) -> Result<(Arc<SessionContent>, Arc<AvatarContent>), AdapterError> {
        let session = self.get(id)?;
        let avatar = session
            .avatar(id.avatar_id())
            .map_err(|_| AdapterError::avatar_not_found(id.as_str(), id.avatar_id()))?;
        Ok((session, avatar))
    }

    /// Remove the whole scene of `id`, including every avatar in it.
    pub fn remove(&self, id: &SessionId) -> Result<Arc<SessionContent>, AdapterError> {
        let (_, content) = self
            .sessions
            .remove(id.scene_id())
            .ok_or_else(|| AdapterError::session_not_found(id.as_str()))?;
        tracing::info!(session_id = %id, "Session removed");
        Ok(content)
    }

    /// Refresh the last access time of `content` and of the directory.
    pub fn touch(&self, content: &SessionContent) {
        let now = self.clock.now();
        content.touch(now);
        self.last_access
            .fetch_max(now.timestamp_millis(), Ordering::AcqRel);
    }

    /// Remove the scene if it was not accessed after `cutoff`.
    ///
    /// The check and the removal happen under the entry lock, so a request
    /// touching the session concurrently either keeps it alive or finds it gone.
    pub fn remove_if_idle(&self, scene_id: &str, cutoff: DateTime<Utc>) -> bool {
        self.sessions
            .remove_if(scene_id, |_, content| content.last_access() < cutoff)
            .is_some()
    }

    /// `(scene id, last access)` of every session at this moment.
    pub fn snapshot(&self) -> Vec<(String, DateTime<Utc>)> {
        self.sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_access()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Latest access over all sessions, `None` before the first one.
    pub fn last_access(&self) -> Option<DateTime<Utc>> {
        match self.last_access.load(Ordering::Acquire) {
            NEVER => None,
            millis => DateTime::from_timestamp_millis(millis),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

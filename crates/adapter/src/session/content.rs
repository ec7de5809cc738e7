//! Session and avatar content.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use mmi_domain::{AdapterError, AvatarPostureValues, MmuDescription};

use super::instance::UnitInstance;
use crate::scene::SceneBuffer;
use crate::services::{ServiceAccess, SkeletonAccess};

/// State shared by every avatar of one scene.
pub struct SessionContent {
    scene_id: String,
    pub scene: Arc<SceneBuffer>,
    pub services: Arc<ServiceAccess>,
    pub skeleton: Arc<SkeletonAccess>,
    avatars: DashMap<String, Arc<AvatarContent>>,
    created_at: DateTime<Utc>,
    /// Milliseconds since the epoch; only ever raised.
    last_access: AtomicI64,
}

impl SessionContent {
    pub fn new(scene_id: impl Into<String>, services: ServiceAccess, now: DateTime<Utc>) -> Self {
        Self {
            scene_id: scene_id.into(),
            scene: Arc::new(SceneBuffer::new()),
            services: Arc::new(services),
            skeleton: Arc::new(SkeletonAccess::new()),
            avatars: DashMap::new(),
            created_at: now,
            last_access: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        let millis = self.last_access.load(Ordering::Acquire);
        DateTime::from_timestamp_millis(millis).unwrap_or(self.created_at)
    }

    /// Raise the last access time to `now`; earlier times are ignored.
    pub fn touch(&self, now: DateTime<Utc>) {
        self.last_access
            .fetch_max(now.timestamp_millis(), Ordering::AcqRel);
    }

    /// Avatar content for `avatar_id`, created if missing.
    pub fn ensure_avatar(&self, avatar_id: &str) -> Arc<AvatarContent> {
        self.avatars
            .entry(avatar_id.to_string())
            .or_insert_with(|| Arc::new(AvatarContent::new(avatar_id)))
            .clone()
    }

    /// Insert the avatar content; false if it already existed.
    pub fn add_avatar(&self, avatar_id: &str) -> bool {
        let mut created = false;
        self.avatars.entry(avatar_id.to_string()).or_insert_with(|| {
            created = true;
            Arc::new(AvatarContent::new(avatar_id))
        });
        created
    }

    pub fn avatar(&self, avatar_id: &str) -> Result<Arc<AvatarContent>, AdapterError> {
        self.avatars
            .get(avatar_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                AdapterError::avatar_not_found(format!("{}:{avatar_id}", self.scene_id), avatar_id)
            })
    }

    pub fn avatar_ids(&self) -> Vec<String> {
        self.avatars.iter().map(|e| e.key().clone()).collect()
    }
}

/// Units and reference posture of one avatar.
pub struct AvatarContent {
    avatar_id: String,
    units: DashMap<String, Arc<UnitInstance>>,
    reference_posture: RwLock<Option<AvatarPostureValues>>,
}

impl AvatarContent {
    pub fn new(avatar_id: impl Into<String>) -> Self {
        Self {
            avatar_id: avatar_id.into(),
            units: DashMap::new(),
            reference_posture: RwLock::new(None),
        }
    }

    pub fn avatar_id(&self) -> &str {
        &self.avatar_id
    }

    /// Insert `instance`, returning the instance it replaced.
    pub fn insert_unit(&self, instance: Arc<UnitInstance>) -> Option<Arc<UnitInstance>> {
        self.units
            .insert(instance.unit_id().to_string(), instance)
    }

    pub fn unit(&self, unit_id: &str) -> Option<Arc<UnitInstance>> {
        self.units.get(unit_id).map(|entry| entry.value().clone())
    }

    pub fn remove_unit(&self, unit_id: &str) -> Option<Arc<UnitInstance>> {
        self.units.remove(unit_id).map(|(_, instance)| instance)
    }

    pub fn unit_ids(&self) -> Vec<String> {
        self.units.iter().map(|e| e.key().clone()).collect()
    }

    pub fn unit_descriptions(&self) -> Vec<MmuDescription> {
        let mut descriptions: Vec<_> = self
            .units
            .iter()
            .map(|e| e.value().description().clone())
            .collect();
        descriptions.sort_by(|a, b| a.id.cmp(&b.id));
        descriptions
    }

    pub fn reference_posture(&self) -> Option<AvatarPostureValues> {
        self.reference_posture.read().clone()
    }

    pub fn set_reference_posture(&self, posture: AvatarPostureValues) {
        *self.reference_posture.write() = Some(posture);
    }
}

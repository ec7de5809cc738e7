//! Session-scoped access to external services and skeleton data.

use std::sync::Arc;

use dashmap::DashMap;

use mmi_domain::{AdapterError, AvatarDescription, AvatarPostureValues, ServiceDescription};
use mmi_shared::DirectoryService;

/// Lists the services registered at the directory for one session.
pub struct ServiceAccess {
    directory: Arc<dyn DirectoryService>,
    session_id: String,
}

impl ServiceAccess {
    pub fn new(directory: Arc<dyn DirectoryService>, session_id: impl Into<String>) -> Self {
        Self {
            directory,
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn services(&self) -> Result<Vec<ServiceDescription>, AdapterError> {
        self.directory.registered_services(&self.session_id).await
    }

    /// First registered service with the given name.
    pub async fn service(&self, name: &str) -> Result<Option<ServiceDescription>, AdapterError> {
        Ok(self
            .services()
            .await?
            .into_iter()
            .find(|service| service.name == name))
    }
}

/// Avatar descriptions and reference postures known to a session.
#[derive(Default)]
pub struct SkeletonAccess {
    descriptions: DashMap<String, AvatarDescription>,
    postures: DashMap<String, AvatarPostureValues>,
}

impl SkeletonAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the skeleton of `description.avatar_id` and reset its posture
    /// to the zero posture.
    pub fn initialize_anthropometry(&self, description: &AvatarDescription) {
        let avatar_id = description.avatar_id.clone();
        self.postures
            .insert(avatar_id.clone(), description.zero_posture.clone());
        self.descriptions.insert(avatar_id, description.clone());
    }

    pub fn description(&self, avatar_id: &str) -> Option<AvatarDescription> {
        self.descriptions.get(avatar_id).map(|d| d.clone())
    }

    pub fn posture(&self, avatar_id: &str) -> Option<AvatarPostureValues> {
        self.postures.get(avatar_id).map(|p| p.clone())
    }

    pub fn set_posture(&self, values: AvatarPostureValues) {
        self.postures.insert(values.avatar_id.clone(), values);
    }
}

//! Shared fixtures for unit tests.

use std::sync::Arc;

use mmi_domain::{AdapterDescription, SessionId};

use super::{AdapterEndpoint, UnitContext};
use crate::infrastructure::InMemoryDirectory;
use crate::scene::SceneBuffer;
use crate::services::{ServiceAccess, SkeletonAccess};

pub fn context(unit_id: &str) -> UnitContext {
    context_with_scene(unit_id, Arc::new(SceneBuffer::new()))
}

pub fn context_with_scene(unit_id: &str, scene: Arc<SceneBuffer>) -> UnitContext {
    let session_id = SessionId::new("scene", "0");
    UnitContext {
        unit_id: unit_id.to_string(),
        services: Arc::new(ServiceAccess::new(
            Arc::new(InMemoryDirectory::new()),
            session_id.as_str(),
        )),
        session_id,
        scene,
        skeleton: Arc::new(SkeletonAccess::new()),
        endpoint: Arc::new(AdapterEndpoint {
            description: AdapterDescription::default(),
            directory_address: None,
        }),
    }
}

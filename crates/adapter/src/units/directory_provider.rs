//! Unit discovery from folders on disk.
//!
//! Every sub-folder of a configured path that contains a `description.json`
//! is one loadable unit. The folders are rescanned on an interval.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mmi_domain::MmuDescription;

use super::{UnitLoadingDescriptor, UnitOrigin, UnitProvider};

pub const DESCRIPTION_FILE: &str = "description.json";

pub struct DirectoryUnitProvider {
    paths: Vec<PathBuf>,
    units: RwLock<Vec<UnitLoadingDescriptor>>,
    changed: watch::Sender<u64>,
}

impl DirectoryUnitProvider {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            paths,
            units: RwLock::new(Vec::new()),
            changed,
        }
    }

    /// Rescan all paths. Returns true if the set of units changed.
    pub async fn scan(&self) -> bool {
        let mut found = Vec::new();
        for root in &self.paths {
            scan_root(root, &mut found).await;
        }
        found.sort_by(|a, b| a.id().cmp(b.id()));

        {
            let mut units = self.units.write();
            if *units == found {
                return false;
            }
            *units = found;
        }

        self.changed.send_modify(|version| *version += 1);
        true
    }

    /// Scan now and then every `interval` until `cancel` fires.
    pub fn spawn(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if self.scan().await {
                    tracing::info!(
                        count = self.units.read().len(),
                        "Unit folders changed"
                    );
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            tracing::debug!("Unit folder polling stopped");
        })
    }
}

async fn scan_root(root: &Path, found: &mut Vec<UnitLoadingDescriptor>) {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %root.display(), error = %e, "Cannot read unit folder");
            return;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(path = %root.display(), error = %e, "Unit folder listing failed");
                break;
            }
        };

        let folder = entry.path();
        let file = folder.join(DESCRIPTION_FILE);
        let Ok(raw) = tokio::fs::read(&file).await else {
            continue;
        };

        match serde_json::from_slice::<MmuDescription>(&raw) {
            Ok(description) => {
                found.push(UnitLoadingDescriptor::new(
                    description,
                    UnitOrigin::Path(folder),
                ));
            }
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "Invalid unit description");
            }
        }
    }
}

impl UnitProvider for DirectoryUnitProvider {
    fn available_units(&self) -> Vec<UnitLoadingDescriptor> {
        self.units.read().clone()
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }
}

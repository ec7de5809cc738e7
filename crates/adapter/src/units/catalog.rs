//! The set of units that can currently be loaded.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use mmi_domain::MmuDescription;

use super::{UnitLoadingDescriptor, UnitRegistry};

/// Loadable units keyed by unit id.
///
/// Readers get a consistent snapshot; `rebuild` swaps the whole map at once.
#[derive(Default)]
pub struct UnitCatalog {
    units: RwLock<Arc<BTreeMap<String, UnitLoadingDescriptor>>>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the catalog with `descriptors` that `registry` can build.
    ///
    /// Later descriptors win over earlier ones with the same id. Returns the
    /// number of loadable units.
    pub fn rebuild(
        &self,
        descriptors: impl IntoIterator<Item = UnitLoadingDescriptor>,
        registry: &UnitRegistry,
    ) -> usize {
        let mut units = BTreeMap::new();
        for descriptor in descriptors {
            if !registry.contains(&descriptor.factory) {
                tracing::warn!(
                    unit_id = %descriptor.id(),
                    factory = %descriptor.factory,
                    origin = ?descriptor.origin,
                    "Skipping unit without registered implementation"
                );
                continue;
            }
            units.insert(descriptor.id().to_string(), descriptor);
        }

        let count = units.len();
        *self.units.write() = Arc::new(units);
        tracing::info!(count, "Unit catalog rebuilt");
        count
    }

    pub fn snapshot(&self) -> Arc<BTreeMap<String, UnitLoadingDescriptor>> {
        self.units.read().clone()
    }

    pub fn get(&self, unit_id: &str) -> Option<UnitLoadingDescriptor> {
        self.units.read().get(unit_id).cloned()
    }

    pub fn descriptions(&self) -> Vec<MmuDescription> {
        self.snapshot()
            .values()
            .map(|d| d.description.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{builtin_descriptors, UnitOrigin};
    use std::path::PathBuf;

    #[test]
    fn test_rebuild_skips_unknown_factories() {
        let catalog = UnitCatalog::new();
        let mut descriptors = builtin_descriptors();
        descriptors.push(UnitLoadingDescriptor::new(
            MmuDescription {
                id: "reach".into(),
                name: "Reach".into(),
                ..Default::default()
            },
            UnitOrigin::Path(PathBuf::from("units/reach")),
        ));

        assert_eq!(catalog.rebuild(descriptors, &UnitRegistry::new()), 2);
        assert!(catalog.get("reach").is_none());
        assert!(catalog.get("idle").is_some());
    }

    #[test]
    fn test_snapshot_survives_rebuild() {
        let catalog = UnitCatalog::new();
        let registry = UnitRegistry::new();
        catalog.rebuild(builtin_descriptors(), &registry);
        let before = catalog.snapshot();

        catalog.rebuild(Vec::new(), &registry);
        assert_eq!(before.len(), 2);
        assert!(catalog.is_empty());
    }
}

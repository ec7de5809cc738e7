//! Sources of loadable units.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use super::UnitLoadingDescriptor;

/// Reports the loadable units and signals when they change.
pub trait UnitProvider: Send + Sync {
    fn available_units(&self) -> Vec<UnitLoadingDescriptor>;

    /// Receiver whose value is bumped on every change.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// Fixed list of units, replaceable at runtime.
pub struct StaticUnitProvider {
    units: RwLock<Vec<UnitLoadingDescriptor>>,
    changed: watch::Sender<u64>,
}

impl StaticUnitProvider {
    pub fn new(units: Vec<UnitLoadingDescriptor>) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            units: RwLock::new(units),
            changed,
        }
    }

    pub fn set_units(&self, units: Vec<UnitLoadingDescriptor>) {
        *self.units.write() = units;
        self.changed.send_modify(|version| *version += 1);
    }
}

impl UnitProvider for StaticUnitProvider {
    fn available_units(&self) -> Vec<UnitLoadingDescriptor> {
        self.units.read().clone()
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }
}

/// Concatenation of several providers; later providers override earlier ones
/// for the same unit id once the catalog is built.
pub struct CompositeUnitProvider {
    providers: Vec<Arc<dyn UnitProvider>>,
    changed: watch::Sender<u64>,
    forwarding: Mutex<bool>,
}

impl CompositeUnitProvider {
    pub fn new(providers: Vec<Arc<dyn UnitProvider>>) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            providers,
            changed,
            forwarding: Mutex::new(false),
        }
    }

    /// Forward change signals of the inner providers. Needs a tokio runtime;
    /// started on the first `subscribe`.
    fn start_forwarding(&self) {
        let mut started = self.forwarding.lock();
        if *started {
            return;
        }
        *started = true;

        for provider in &self.providers {
            let mut inner = provider.subscribe();
            let changed = self.changed.clone();
            tokio::spawn(async move {
                while inner.changed().await.is_ok() {
                    changed.send_modify(|version| *version += 1);
                }
            });
        }
    }
}

impl UnitProvider for CompositeUnitProvider {
    fn available_units(&self) -> Vec<UnitLoadingDescriptor> {
        self.providers
            .iter()
            .flat_map(|p| p.available_units())
            .collect()
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.start_forwarding();
        self.changed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::builtin_descriptors;
    use std::time::Duration;

    #[tokio::test]
    async fn test_static_provider_signals_changes() {
        let provider = StaticUnitProvider::new(Vec::new());
        let mut rx = provider.subscribe();

        provider.set_units(builtin_descriptors());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);
        assert_eq!(provider.available_units().len(), 2);
    }

    #[tokio::test]
    async fn test_composite_merges_and_forwards() {
        let builtins = Arc::new(StaticUnitProvider::new(builtin_descriptors()));
        let extra = Arc::new(StaticUnitProvider::new(Vec::new()));
        let composite = CompositeUnitProvider::new(vec![builtins, extra.clone()]);

        let mut rx = composite.subscribe();
        assert_eq!(composite.available_units().len(), 2);

        extra.set_units(builtin_descriptors());
        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("change forwarded")
            .unwrap();
        assert_eq!(composite.available_units().len(), 4);
    }
}

//! Explicit table of unit implementations.

use std::collections::HashMap;
use std::sync::Arc;

use mmi_domain::AdapterError;

use super::builtin::{IdleUnit, LinearMoveUnit, IDLE_FACTORY, LINEAR_MOVE_FACTORY};
use super::{Unit, UnitContext, UnitError, UnitLoadingDescriptor};

/// Builds a unit instance for one session.
pub type UnitFactory = Arc<
    dyn Fn(&UnitLoadingDescriptor, UnitContext) -> Result<Box<dyn Unit>, UnitError> + Send + Sync,
>;

/// Factory name to constructor.
#[derive(Clone)]
pub struct UnitRegistry {
    factories: HashMap<String, UnitFactory>,
}

impl UnitRegistry {
    /// Registry with the built-in units.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(IDLE_FACTORY, |_, ctx| Ok(Box::new(IdleUnit::new(ctx))));
        registry.register(LINEAR_MOVE_FACTORY, |_, ctx| {
            Ok(Box::new(LinearMoveUnit::new(ctx)))
        });
        registry
    }

    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Add or replace the constructor for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&UnitLoadingDescriptor, UnitContext) -> Result<Box<dyn Unit>, UnitError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn instantiate(
        &self,
        descriptor: &UnitLoadingDescriptor,
        context: UnitContext,
    ) -> Result<Box<dyn Unit>, AdapterError> {
        let factory = self.factories.get(&descriptor.factory).ok_or_else(|| {
            AdapterError::instantiation(
                descriptor.id(),
                format!("no implementation registered as {}", descriptor.factory),
            )
        })?;

        factory(descriptor, context)
            .map_err(|e| AdapterError::instantiation(descriptor.id(), e.to_string()))
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::test_support::context;
    use crate::units::{builtin_descriptors, UnitOrigin};
    use mmi_domain::MmuDescription;

    #[test]
    fn test_builtins_are_registered() {
        let registry = UnitRegistry::new();
        for descriptor in builtin_descriptors() {
            assert!(registry.contains(&descriptor.factory));
            assert!(registry
                .instantiate(&descriptor, context(descriptor.id()))
                .is_ok());
        }
    }

    #[test]
    fn test_unknown_factory_is_instantiation_failure() {
        let registry = UnitRegistry::empty();
        let descriptor = UnitLoadingDescriptor::new(
            MmuDescription {
                id: "reach".into(),
                name: "Reach".into(),
                ..Default::default()
            },
            UnitOrigin::Builtin,
        );
        let err = registry
            .instantiate(&descriptor, context("reach"))
            .err()
            .unwrap();
        assert!(matches!(err, AdapterError::UnitInstantiationFailure { .. }));
    }

    #[test]
    fn test_factory_error_is_reported() {
        let mut registry = UnitRegistry::empty();
        registry.register("broken", |_, _| Err(UnitError::new("missing model file")));
        let descriptor = UnitLoadingDescriptor {
            description: MmuDescription {
                id: "b".into(),
                ..Default::default()
            },
            factory: "broken".into(),
            origin: UnitOrigin::Builtin,
        };
        let err = registry.instantiate(&descriptor, context("b")).err().unwrap();
        assert!(err.to_string().contains("missing model file"));
    }
}

//! Static registry of service definitions.
//!
//! The `(provider, type)` → [`ServiceDefinition`] lookup is resolved once
//! at startup: [`ServiceRegistry::standard`] builds the full catalog and
//! every later lookup is a map access over `Arc`-shared immutable
//! definitions. Nothing is discovered dynamically.

pub mod catalog;
pub mod definition;

pub use definition::{
    Association, EnvRequirement, LinkHandler, LinkPredicate, ProvisionOutput, ScopeHandler,
    ServiceDefinition,
};

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{Provider, ServiceType, StackplanError};

/// Registry of every known service definition, keyed by (provider, type).
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    definitions: HashMap<(Provider, ServiceType), Arc<ServiceDefinition>>,
}

impl ServiceRegistry {
    /// An empty registry; useful for tests that build their own catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard catalog shipped with the crate.
    pub fn standard() -> anyhow::Result<Self> {
        let mut registry = Self::new();
        catalog::register_standard(&mut registry)?;
        Ok(registry)
    }

    /// Register a definition under its (provider, type) pair.
    pub fn register(&mut self, definition: ServiceDefinition) {
        self.definitions
            .insert((definition.provider(), definition.kind()), Arc::new(definition));
    }

    /// Look up the definition for a (provider, type) pair.
    pub fn get(
        &self,
        provider: Provider,
        kind: ServiceType,
    ) -> Result<Arc<ServiceDefinition>, StackplanError> {
        self.definitions
            .get(&(provider, kind))
            .cloned()
            .ok_or(StackplanError::UnknownServiceType { provider, kind })
    }

    pub fn contains(&self, provider: Provider, kind: ServiceType) -> bool {
        self.definitions.contains_key(&(provider, kind))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_registers_the_expected_pairs() {
        let registry = ServiceRegistry::standard().unwrap();
        for kind in [
            ServiceType::Mysql,
            ServiceType::Postgresql,
            ServiceType::Monitoring,
            ServiceType::State,
            ServiceType::Dns,
            ServiceType::Ssl,
            ServiceType::Cluster,
        ] {
            assert!(registry.contains(Provider::Aws, kind), "missing aws {kind}");
        }
        assert!(registry.contains(Provider::Local, ServiceType::State));
    }

    #[test]
    fn unknown_pair_lookup_is_an_error() {
        let registry = ServiceRegistry::standard().unwrap();
        let err = registry.get(Provider::Local, ServiceType::Mysql).unwrap_err();
        assert!(matches!(
            err,
            StackplanError::UnknownServiceType { provider: Provider::Local, kind: ServiceType::Mysql }
        ));
    }
}

//! Graph nodes and their factory.
//!
//! A [`Provisionable`] is one concrete configuration bound to its shared
//! [`crate::registry::ServiceDefinition`], plus the outputs it accumulates
//! while the registration engine resolves it. Node identity is a content
//! hash over the configuration, so two structurally identical
//! configurations collapse to the same node.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{DEFAULT_PROVIDER, ServiceConfig, StackplanError};
use crate::registry::{ProvisionOutput, ServiceDefinition, ServiceRegistry};

/// Content-derived node identity.
///
/// Deterministic and independent of attribute insertion order:
/// `serde_json` maps serialize with sorted keys, so the hashed encoding is
/// canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Hash a configuration's content into an id.
    pub fn of(config: &ServiceConfig) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(config.attributes()).unwrap_or_default());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a node is in the registration state machine.
///
/// `InProgress` is what makes requirement cycles detectable: re-entering a
/// node that is not yet `Registered` aborts the operation instead of
/// recursing forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Pending,
    InProgress,
    Registered,
}

/// One graph node: a concrete configuration plus accumulated outputs.
///
/// Created once per configuration at operation start and mutated in place
/// by the registration engine; it lives as long as the operation does.
#[derive(Debug, Clone)]
pub struct Provisionable {
    /// Content-derived identity.
    pub id: NodeId,
    /// Human-readable slug used to name created resources. Not required
    /// to be globally unique.
    pub resource_id: String,
    /// The concrete, schema-validated attribute set.
    pub config: ServiceConfig,
    /// Shared definition for this node's (provider, type) pair.
    pub definition: Arc<ServiceDefinition>,
    /// Outputs collected from requirement edges, by association name.
    pub requirements: BTreeMap<String, Vec<ProvisionOutput>>,
    /// Output of this node's own scope handler.
    pub provisions: ProvisionOutput,
    /// Outputs collected from side-effect edges, by association name.
    pub side_effects: BTreeMap<String, Vec<ProvisionOutput>>,
    /// Registration state machine position.
    pub state: RegistrationState,
}

impl Provisionable {
    /// Build a node from a concrete configuration.
    ///
    /// Fails with [`StackplanError::UnknownServiceType`] when no definition
    /// is registered for the configuration's (provider, type) pair, and
    /// with [`StackplanError::UnknownService`] when the `type` attribute is
    /// missing or unrecognized.
    pub fn from_config(
        config: ServiceConfig,
        registry: &ServiceRegistry,
    ) -> Result<Self, StackplanError> {
        let kind = config.kind()?;
        let provider = config.provider().unwrap_or(DEFAULT_PROVIDER);
        let definition = registry.get(provider, kind)?;

        let resource_id = format!(
            "{}-{}-{}",
            config.name().unwrap_or(kind.as_str()),
            provider,
            config.region().unwrap_or("default"),
        );

        Ok(Self {
            id: NodeId::of(&config),
            resource_id,
            config,
            definition,
            requirements: BTreeMap::new(),
            provisions: ProvisionOutput::Null,
            side_effects: BTreeMap::new(),
            state: RegistrationState::Pending,
        })
    }

    /// Outputs a requirement association collected, if any.
    pub fn requirement(&self, name: &str) -> Option<&[ProvisionOutput]> {
        self.requirements.get(name).map(Vec::as_slice)
    }

    /// Outputs a side-effect association collected, if any.
    pub fn side_effect(&self, name: &str) -> Option<&[ProvisionOutput]> {
        self.side_effects.get(name).map(Vec::as_slice)
    }

    pub fn is_registered(&self) -> bool {
        self.state == RegistrationState::Registered
    }

    /// Label used in error messages, e.g. `mysql 'db1'`.
    pub fn label(&self) -> String {
        self.config.label()
    }
}

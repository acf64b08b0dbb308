//! Immutable service definitions and their composable builder.
//!
//! A [`ServiceDefinition`] describes one (provider, service-type) pair:
//! its composed configuration schema, at most one provisioning handler per
//! scope, named [`Association`] declarations per scope, and environment
//! variable requirements. Definitions are built once by a pipeline of
//! consuming builder methods, each returning a new value, and shared
//! behind `Arc` by every configuration of that type.

use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::core::{Provider, Scope, ServiceConfig, ServiceType, StackplanError};
use crate::graph::Provisionable;
use crate::schema;
use crate::stack::StackContext;

/// Opaque output bag produced by scope and association handlers.
///
/// A single resource handle, a list of handles, or a named mapping.
/// Downstream handlers read fields from it but never mutate it.
pub type ProvisionOutput = Value;

/// A scope's provisioning function.
///
/// Receives the node with its resolved requirements and the backend
/// handle; returns the node's provisions.
pub type ScopeHandler =
    Arc<dyn Fn(&Provisionable, &mut StackContext) -> anyhow::Result<ProvisionOutput> + Send + Sync>;

/// An association's handler.
///
/// Receives the already-provisioned linked node, the backend handle, and
/// the owning node; returns the output recorded under the association's
/// name.
pub type LinkHandler = Arc<
    dyn Fn(&Provisionable, &mut StackContext, &Provisionable) -> anyhow::Result<ProvisionOutput>
        + Send
        + Sync,
>;

/// Pure predicate deciding whether an association applies to a candidate
/// pair of configurations.
pub type LinkPredicate = Arc<dyn Fn(&ServiceConfig, &ServiceConfig) -> bool + Send + Sync>;

/// A declared edge template from one service type to another.
#[derive(Clone)]
pub struct Association {
    /// Service type the association targets; `None` matches any other node.
    pub target: Option<ServiceType>,
    /// Predicate over (owner config, candidate config).
    pub predicate: LinkPredicate,
    /// `true` = must resolve before the owner's own provisioning;
    /// `false` = resolved after, as a side effect.
    pub requirement: bool,
    /// Handler invoked once per resolved edge.
    pub handler: LinkHandler,
}

impl Association {
    /// Whether this association applies to the pair (owner, candidate).
    pub fn applies_to(&self, owner: &ServiceConfig, candidate: &ServiceConfig) -> bool {
        if let Some(target) = self.target
            && candidate.kind().ok() != Some(target)
        {
            return false;
        }
        (self.predicate)(owner, candidate)
    }
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("target", &self.target)
            .field("requirement", &self.requirement)
            .finish_non_exhaustive()
    }
}

/// One environment-variable requirement declared by a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvRequirement {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Immutable template for one (provider, service-type) pair.
#[derive(Clone)]
pub struct ServiceDefinition {
    provider: Provider,
    kind: ServiceType,
    schema_id: String,
    schema: Value,
    handlers: HashMap<Scope, ScopeHandler>,
    associations: HashMap<Scope, BTreeMap<String, Association>>,
    environment: Vec<EnvRequirement>,
    regions: Option<Vec<String>>,
}

impl ServiceDefinition {
    /// Start a definition with the base schema every service shares:
    /// `name` and `type` required, optional `provider`, `region`,
    /// `domain`, `links`, and `profile`, root closed to unrecognized
    /// properties.
    pub fn new(provider: Provider, kind: ServiceType) -> Self {
        let schema = schema::object_schema(
            json!({
                "name": { "type": "string", "minLength": 1 },
                "type": { "type": "string", "enum": [kind.as_str()] },
                "provider": { "type": "string", "enum": [provider.as_str()], "default": provider.as_str() },
                "region": { "type": "string" },
                "domain": { "type": "string" },
                "links": { "type": "array", "items": { "type": "string" } },
                "profile": { "type": "string", "enum": crate::core::SERVICE_PROFILES },
            }),
            &["name", "type"],
        );
        Self {
            provider,
            kind,
            schema_id: format!("service/{provider}/{kind}"),
            schema,
            handlers: HashMap::new(),
            associations: HashMap::new(),
            environment: Vec::new(),
            regions: None,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn kind(&self) -> ServiceType {
        self.kind
    }

    /// Stable string key for this definition's schema.
    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn handler(&self, scope: Scope) -> Option<&ScopeHandler> {
        self.handlers.get(&scope)
    }

    /// Named associations declared for a scope, in name order.
    pub fn associations(&self, scope: Scope) -> Option<&BTreeMap<String, Association>> {
        self.associations.get(&scope)
    }

    pub fn environment(&self) -> &[EnvRequirement] {
        &self.environment
    }

    /// Allowed regions, when [`Self::with_regions`] constrained them.
    pub fn regions(&self) -> Option<&[String]> {
        self.regions.as_deref()
    }

    /// Merge a schema fragment into the definition's schema.
    pub fn with_schema(mut self, fragment: Value) -> Self {
        self.schema = schema::compose(&self.schema, &fragment);
        self
    }

    /// Constrain the `region` property to an allowed set with a default.
    pub fn with_regions(mut self, allowed: &[&str], default: &str) -> Self {
        self.regions = Some(allowed.iter().map(ToString::to_string).collect());
        self.with_schema(schema::enum_property("region", allowed, default))
    }

    /// Add a `size` property constrained to the given machine sizes.
    pub fn with_sizing(self, sizes: &[&str], default: &str) -> Self {
        self.with_schema(schema::enum_property("size", sizes, default))
    }

    /// Add a bounded `storage` property (gigabytes).
    pub fn with_storage(self, min: u64, max: u64, default: u64) -> Self {
        self.with_schema(schema::bounded_integer("storage", min, max, default))
    }

    /// Add a bounded `nodes` property (instance count).
    pub fn with_node_count(self, min: u64, max: u64, default: u64) -> Self {
        self.with_schema(schema::bounded_integer("nodes", min, max, default))
    }

    /// Add a `version` property constrained to supported engine versions.
    pub fn with_versioning(self, versions: &[&str], default: &str) -> Self {
        self.with_schema(schema::enum_property("version", versions, default))
    }

    /// Register the scope's provisioning handler.
    ///
    /// Fails fast with [`StackplanError::DuplicateHandler`] when the scope
    /// already has one; a second registration is a programming error, not
    /// something to silently overwrite.
    pub fn with_handler(mut self, scope: Scope, handler: ScopeHandler) -> Result<Self, StackplanError> {
        if self.handlers.contains_key(&scope) {
            return Err(StackplanError::DuplicateHandler {
                scope,
                kind: self.kind,
            });
        }
        self.handlers.insert(scope, handler);
        Ok(self)
    }

    /// Merge a named association into the scope's association set.
    ///
    /// Other names are left untouched; re-registering the same name under
    /// the same scope overwrites (last registration wins).
    pub fn with_association(mut self, scope: Scope, name: &str, association: Association) -> Self {
        self.associations.entry(scope).or_default().insert(name.to_string(), association);
        self
    }

    /// Append an environment-variable requirement.
    pub fn with_environment_requirement(
        mut self,
        name: &str,
        description: &str,
        required: bool,
    ) -> Self {
        self.environment.push(EnvRequirement {
            name: name.to_string(),
            description: description.to_string(),
            required,
        });
        self
    }
}

impl fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("provider", &self.provider)
            .field("kind", &self.kind)
            .field("schema_id", &self.schema_id)
            .field("scopes", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

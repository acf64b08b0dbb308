//! Provisioning backend handle and its serialized output.
//!
//! [`StackContext`] is the append-only construction context handlers
//! declare resources into. The registration engine never inspects it; it
//! only threads the handle through handlers and, once an operation
//! completes, turns it into the backend's native configuration document,
//! a [`StackDocument`].

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One declared resource inside a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackResource {
    /// Backend resource kind, e.g. `db_instance` or `notification_topic`.
    pub kind: String,
    /// Resource identifier within the stack, derived from the owning
    /// node's resource id.
    pub id: String,
    /// Backend-specific attributes, opaque to the engine.
    pub attributes: Value,
}

/// Append-only construction context for one operation.
///
/// Not safe for concurrent mutation; the engine is single-threaded and the
/// registration order is the correctness mechanism.
#[derive(Debug)]
pub struct StackContext {
    name: String,
    resources: Vec<StackResource>,
}

impl StackContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a resource and return its output handle.
    ///
    /// The handle is the opaque bag downstream handlers read fields from:
    /// it carries a `ref` (`{kind}.{id}`) plus the declared attributes.
    /// Handles are never mutated by consumers.
    pub fn declare(&mut self, kind: &str, id: &str, attributes: Value) -> Value {
        let handle = json!({
            "ref": format!("{kind}.{id}"),
            "kind": kind,
            "id": id,
            "attributes": attributes,
        });
        self.resources.push(StackResource {
            kind: kind.to_string(),
            id: id.to_string(),
            attributes,
        });
        handle
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Consume the context and produce the serialized document.
    pub fn into_document(self) -> StackDocument {
        StackDocument {
            stack: self.name,
            resources: self.resources,
        }
    }
}

/// Final provisioning output of one operation, in the backend's native
/// configuration shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackDocument {
    /// Stack name, `{project}-{environment}`.
    pub stack: String,
    /// Every resource declared during the operation, in declaration order.
    pub resources: Vec<StackResource>,
}

impl StackDocument {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// All resources of one backend kind, in declaration order.
    pub fn resources_of_kind(&self, kind: &str) -> Vec<&StackResource> {
        self.resources.iter().filter(|resource| resource.kind == kind).collect()
    }
}

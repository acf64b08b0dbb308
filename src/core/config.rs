//! Concrete service configuration attributes.
//!
//! A [`ServiceConfig`] is the schema-validated attribute set one service ends
//! up with after project defaults and auto-derivation are applied. It is a
//! thin wrapper over a JSON object so schemas, validation, and content
//! hashing all operate on the same representation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use super::{Provider, ServiceType, StackplanError};

/// Attribute set for one concrete service.
///
/// Well-known attributes (`type`, `provider`, `region`, `name`) have typed
/// accessors; everything else is reachable through [`ServiceConfig::get`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceConfig {
    attributes: Map<String, Value>,
}

impl ServiceConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing attribute map.
    pub fn from_map(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }

    /// The raw attribute map.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(Value::as_bool)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.attributes.get(key).and_then(Value::as_u64)
    }

    /// Insert or replace an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    /// Service type from the `type` attribute.
    ///
    /// Fails when the attribute is missing or names a type the crate does
    /// not know about.
    pub fn kind(&self) -> Result<ServiceType, StackplanError> {
        match self.get_str("type") {
            Some(value) => ServiceType::from_str(value),
            None => Err(StackplanError::UnknownService {
                name: "<missing type attribute>".to_string(),
            }),
        }
    }

    /// Provider from the `provider` attribute, if present and recognized.
    pub fn provider(&self) -> Option<Provider> {
        self.get_str("provider").and_then(|value| Provider::from_str(value).ok())
    }

    pub fn region(&self) -> Option<&str> {
        self.get_str("region")
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    /// Label used in error messages, e.g. `mysql 'db1'`.
    pub fn label(&self) -> String {
        let kind = self.get_str("type").unwrap_or("service");
        match self.name() {
            Some(name) => format!("{kind} '{name}'"),
            None => kind.to_string(),
        }
    }

    /// Fill every attribute missing here from `fallback`.
    ///
    /// Existing attributes always win, which is what makes a specialized
    /// generator's output take precedence over the generic derivation.
    pub fn fill_defaults(&mut self, fallback: &ServiceConfig) {
        for (key, value) in &fallback.attributes {
            self.attributes.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

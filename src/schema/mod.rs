//! Structural schemas and schema composition.
//!
//! Service definitions are assembled from small schema fragments, one per
//! behavior (regions, sizing, storage, ...). [`compose`] merges a fragment
//! into a base schema with right-biased semantics: the later fragment's
//! property definition wins on conflict, `required` lists are unioned, and
//! every other top-level keyword from the addition overrides the base's.
//!
//! Schemas are plain JSON objects. No well-formedness checking happens
//! here; the [`validator`] is the one that interprets them.

pub mod validator;

pub use validator::ConfigValidator;

use serde_json::{Map, Value, json};

/// Build a closed object schema with the given properties and required
/// attribute names.
///
/// The root always rejects unrecognized properties; composition never
/// reopens it.
pub fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": properties,
        "required": required,
    })
}

/// Fragment declaring a single string property constrained to a fixed set
/// of values, with a default.
pub fn enum_property(name: &str, values: &[&str], default: &str) -> Value {
    json!({
        "properties": {
            name: { "type": "string", "enum": values, "default": default }
        }
    })
}

/// Fragment declaring a single integer property with inclusive bounds and
/// a default.
pub fn bounded_integer(name: &str, min: u64, max: u64, default: u64) -> Value {
    json!({
        "properties": {
            name: { "type": "integer", "minimum": min, "maximum": max, "default": default }
        }
    })
}

/// Merge `addition` into `base`, right-biased.
///
/// - `properties` merge key by key; the addition's definition replaces the
///   base's for the same property name.
/// - `required` lists are unioned and de-duplicated, base entries first.
/// - Any other top-level keyword in the addition overrides the base's.
///
/// Applying a sequence of fragments is independent of how the sequence is
/// grouped as long as later fragments are the ones meant to win.
pub fn compose(base: &Value, addition: &Value) -> Value {
    let mut merged = base.as_object().cloned().unwrap_or_default();
    let Some(add) = addition.as_object() else {
        return Value::Object(merged);
    };

    for (keyword, value) in add {
        match keyword.as_str() {
            "properties" => {
                let mut properties = merged
                    .get("properties")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                if let Some(additions) = value.as_object() {
                    for (name, definition) in additions {
                        properties.insert(name.clone(), definition.clone());
                    }
                }
                merged.insert("properties".to_string(), Value::Object(properties));
            }
            "required" => {
                let mut required: Vec<Value> = merged
                    .get("required")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                if let Some(additions) = value.as_array() {
                    for name in additions {
                        if !required.contains(name) {
                            required.push(name.clone());
                        }
                    }
                }
                merged.insert("required".to_string(), Value::Array(required));
            }
            _ => {
                merged.insert(keyword.clone(), value.clone());
            }
        }
    }

    Value::Object(merged)
}

/// Convenience accessor for a schema's `properties` object.
pub(crate) fn properties(schema: &Value) -> Option<&Map<String, Value>> {
    schema.get("properties").and_then(Value::as_object)
}

//! Structural validation of service configurations.
//!
//! The validator interprets the composed object schemas from
//! [`crate::schema`]: it applies declared defaults, rejects unrecognized
//! properties, and checks types, enums, numeric bounds, and string lengths.
//! Every problem in a configuration is collected before reporting, so a
//! failed validation names all offending attributes at once, never just the
//! first.
//!
//! One validator instance is built per operation and passed explicitly;
//! there is no process-wide schema cache.

use serde_json::{Map, Value};

use crate::core::{ServiceConfig, StackplanError, Violation};

/// Validates concrete service configurations against composed schemas.
#[derive(Debug, Default, Clone)]
pub struct ConfigValidator {
    _private: (),
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `config` against `schema`, applying declared defaults.
    ///
    /// Returns the validated configuration with defaults filled in, or a
    /// [`StackplanError::SchemaViolation`] aggregating one [`Violation`]
    /// per offending attribute. `service` is only used to label the error.
    pub fn validate(
        &self,
        service: &str,
        schema: &Value,
        config: &ServiceConfig,
    ) -> Result<ServiceConfig, StackplanError> {
        let mut attributes = config.attributes().clone();
        let mut violations = Vec::new();

        let properties = crate::schema::properties(schema).cloned().unwrap_or_default();

        if !schema.get("additionalProperties").and_then(Value::as_bool).unwrap_or(true) {
            for key in attributes.keys() {
                if !properties.contains_key(key) {
                    violations.push(Violation::new(key, "unrecognized property"));
                }
            }
        }

        // Defaults first, so required checks see them.
        for (name, definition) in &properties {
            if !attributes.contains_key(name)
                && let Some(default) = definition.get("default")
            {
                attributes.insert(name.clone(), default.clone());
            }
        }

        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !attributes.contains_key(name) {
                    violations.push(Violation::new(name, "required attribute is missing"));
                }
            }
        }

        for (name, definition) in &properties {
            if let Some(value) = attributes.get(name) {
                check_value(name, definition, value, &mut violations);
            }
        }

        if violations.is_empty() {
            Ok(ServiceConfig::from_map(attributes))
        } else {
            Err(StackplanError::SchemaViolation {
                service: service.to_string(),
                violations,
            })
        }
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn check_value(path: &str, definition: &Value, value: &Value, violations: &mut Vec<Violation>) {
    if let Some(expected) = definition.get("type").and_then(Value::as_str)
        && !type_matches(expected, value)
    {
        violations.push(Violation::new(path, format!("expected a value of type '{expected}'")));
        return;
    }

    if let Some(allowed) = definition.get("enum").and_then(Value::as_array)
        && !allowed.contains(value)
    {
        let rendered: Vec<String> = allowed.iter().map(Value::to_string).collect();
        violations
            .push(Violation::new(path, format!("must be one of {}", rendered.join(", "))));
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = definition.get("minimum").and_then(Value::as_f64)
            && number < min
        {
            violations.push(Violation::new(path, format!("is below the minimum of {min}")));
        }
        if let Some(max) = definition.get("maximum").and_then(Value::as_f64)
            && number > max
        {
            violations.push(Violation::new(path, format!("is above the maximum of {max}")));
        }
    }

    if let Some(text) = value.as_str() {
        if let Some(min) = definition.get("minLength").and_then(Value::as_u64)
            && (text.chars().count() as u64) < min
        {
            violations.push(Violation::new(path, format!("must be at least {min} characters")));
        }
        if let Some(max) = definition.get("maxLength").and_then(Value::as_u64)
            && (text.chars().count() as u64) > max
        {
            violations.push(Violation::new(path, format!("must be at most {max} characters")));
        }
    }

    if let Some(items) = value.as_array()
        && let Some(item_schema) = definition.get("items")
    {
        for (index, item) in items.iter().enumerate() {
            check_value(&format!("{path}[{index}]"), item_schema, item, violations);
        }
    }

    if let Some(object) = value.as_object()
        && let Some(nested) = definition.get("properties").and_then(Value::as_object)
    {
        check_object(path, definition, nested, object, violations);
    }
}

fn check_object(
    path: &str,
    definition: &Value,
    nested: &Map<String, Value>,
    object: &Map<String, Value>,
    violations: &mut Vec<Violation>,
) {
    if !definition.get("additionalProperties").and_then(Value::as_bool).unwrap_or(true) {
        for key in object.keys() {
            if !nested.contains_key(key) {
                violations.push(Violation::new(format!("{path}.{key}"), "unrecognized property"));
            }
        }
    }

    if let Some(required) = definition.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(name) {
                violations.push(Violation::new(
                    format!("{path}.{name}"),
                    "required attribute is missing",
                ));
            }
        }
    }

    for (name, nested_definition) in nested {
        if let Some(nested_value) = object.get(name) {
            check_value(&format!("{path}.{name}"), nested_definition, nested_value, violations);
        }
    }
}

//! Argument validation against a function's JSON Schema.
//!
//! Full JSON Schema checking is the host's concern; the dispatcher only needs
//! something implementing [`SchemaValidator`]. [`BasicSchemaValidator`] covers
//! the subset function schemas use in practice: `type`, `required`,
//! `properties`, `items` and `enum`, recursively.

/// Validates raw arguments before they are decoded and invoked.
pub trait SchemaValidator: Send + Sync {
    /// `Err` describes the first violation found.
    fn validate(&self, value: &serde_json::Value, schema: &serde_json::Value) -> Result<(), String>;
}

/// Structural validator for common function schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicSchemaValidator;

impl SchemaValidator for BasicSchemaValidator {
    fn validate(&self, value: &serde_json::Value, schema: &serde_json::Value) -> Result<(), String> {
        check(value, schema, "$")
    }
}

/// Accepts everything. Useful when the backend already constrains output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl SchemaValidator for NoopValidator {
    fn validate(&self, _value: &serde_json::Value, _schema: &serde_json::Value) -> Result<(), String> {
        Ok(())
    }
}

fn check(value: &serde_json::Value, schema: &serde_json::Value, path: &str) -> Result<(), String> {
    if let Some(expected) = schema.get("type") {
        let matches = match expected {
            serde_json::Value::String(t) => value_matches_type(value, t),
            serde_json::Value::Array(types) => types
                .iter()
                .filter_map(|t| t.as_str())
                .any(|t| value_matches_type(value, t)),
            _ => true,
        };
        if !matches {
            return Err(format!(
                "{path}: expected type {expected}, got {}",
                json_type_name(value)
            ));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(|v| v.as_array()) {
        if !allowed.contains(value) {
            return Err(format!("{path}: value {value} is not one of {}", serde_json::Value::Array(allowed.clone())));
        }
    }

    if let Some(obj) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
            for name in required.iter().filter_map(|f| f.as_str()) {
                if !obj.contains_key(name) {
                    return Err(format!("{path}: missing required field '{name}'"));
                }
            }
        }
        if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
            for (key, field) in obj {
                if let Some(field_schema) = properties.get(key) {
                    check(field, field_schema, &format!("{path}.{key}"))?;
                }
            }
        }
    }

    if let (Some(items), Some(elements)) = (schema.get("items"), value.as_array()) {
        for (index, element) in elements.iter().enumerate() {
            check(element, items, &format!("{path}[{index}]"))?;
        }
    }

    Ok(())
}

fn value_matches_type(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

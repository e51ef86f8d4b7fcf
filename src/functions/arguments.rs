//! Typed access to function call arguments.

use serde::de::DeserializeOwned;

use crate::error::AgentError;

/// Arguments of one function call, as emitted by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionArguments {
    value: serde_json::Value,
}

impl FunctionArguments {
    /// Wrap raw arguments. Backends that emit arguments as a JSON-encoded
    /// string are normalized to the decoded value; an empty string becomes `{}`.
    pub fn new(value: serde_json::Value) -> Self {
        let value = match value {
            serde_json::Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(trimmed).unwrap_or(serde_json::Value::String(raw))
                }
            }
            serde_json::Value::Null => serde_json::json!({}),
            other => other,
        };
        Self { value }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn into_raw(self) -> serde_json::Value {
        self.value
    }

    /// Decode the whole argument object into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AgentError> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| AgentError::InvalidArgument(format!("failed to decode arguments: {e}")))
    }

    /// Decode one field into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, AgentError> {
        let field = self
            .value
            .get(key)
            .ok_or_else(|| AgentError::InvalidArgument(format!("missing argument '{key}'")))?;
        serde_json::from_value(field.clone())
            .map_err(|e| AgentError::InvalidArgument(format!("argument '{key}': {e}")))
    }

    /// Decode one optional field; absent and `null` both yield `None`.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AgentError> {
        match self.value.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(_) => self.get(key).map(Some),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<&str, AgentError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::InvalidArgument(format!("missing string argument '{key}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_encoded_arguments_are_decoded() {
        let args = FunctionArguments::new(json!(r#"{"city": "Oslo"}"#));
        assert_eq!(args.get_str("city").unwrap(), "Oslo");
    }

    #[test]
    fn empty_and_null_arguments_become_empty_object() {
        assert_eq!(FunctionArguments::new(json!("  ")).raw(), &json!({}));
        assert_eq!(FunctionArguments::new(json!(null)).raw(), &json!({}));
    }

    #[test]
    fn typed_field_access() {
        let args = FunctionArguments::new(json!({"count": 3, "tags": ["a", "b"], "unit": null}));
        assert_eq!(args.get::<u32>("count").unwrap(), 3);
        assert_eq!(args.get::<Vec<String>>("tags").unwrap(), vec!["a", "b"]);
        assert_eq!(args.get_opt::<String>("unit").unwrap(), None);
        assert_eq!(args.get_opt::<String>("absent").unwrap(), None);
        assert!(args.get::<String>("count").is_err());
        assert!(args.get::<u32>("missing").is_err());
    }
}

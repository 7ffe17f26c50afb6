//! JSON schema handling for tool arguments.

use std::fmt;

use jsonschema::Validator;
use serde_json::{Map, Value, json};

use crate::registry::{ToolError, ToolResult};

/// Compiled argument schema of a tool.
pub struct ArgumentSchema {
    source: Value,
    validator: Validator,
}

impl fmt::Debug for ArgumentSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentSchema")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl ArgumentSchema {
    /// Compiles `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] when the schema itself is not a
    /// valid JSON schema.
    pub fn compile(schema: &Value) -> ToolResult<Self> {
        let validator = Validator::new(schema).map_err(|err| ToolError::InvalidMetadata {
            reason: format!("invalid argument schema: {err}"),
        })?;
        Ok(Self {
            source: schema.clone(),
            validator,
        })
    }

    /// Returns the schema document.
    #[must_use]
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Checks `arguments` against the schema.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] listing every violation.
    pub fn validate(&self, tool: &str, arguments: &Value) -> ToolResult<()> {
        if self.validator.is_valid(arguments) {
            return Ok(());
        }

        let violations: Vec<String> = self
            .validator
            .iter_errors(arguments)
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{path}: {err}")
                }
            })
            .collect();

        Err(ToolError::InvalidArguments {
            tool: tool.to_owned(),
            reason: violations.join("; "),
        })
    }
}

/// Schema accepting any JSON object.
#[must_use]
pub fn any_object() -> Value {
    json!({ "type": "object" })
}

/// Builds an object schema from `(name, type, description)` properties.
///
/// Every listed property is required unless its name appears in `optional`.
#[must_use]
pub fn object(properties: &[(&str, &str, &str)], optional: &[&str]) -> Value {
    let mut props = Map::new();
    let mut required = Vec::new();
    for (name, kind, description) in properties {
        props.insert(
            (*name).to_owned(),
            json!({ "type": kind, "description": description }),
        );
        if !optional.contains(name) {
            required.push(Value::from(*name));
        }
    }

    json!({
        "type": "object",
        "properties": props,
        "required": required,
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_object_schema() {
        let schema = object(
            &[
                ("title", "string", "Task title"),
                ("priority", "string", "low, medium, or high"),
            ],
            &["priority"],
        );
        assert_eq!(schema["required"], json!(["title"]));
        assert_eq!(schema["properties"]["title"]["type"], "string");
    }

    #[test]
    fn validates_arguments() {
        let schema =
            ArgumentSchema::compile(&object(&[("topic", "string", "Topic")], &[])).unwrap();
        assert!(schema.validate("research", &json!({"topic": "rust"})).is_ok());

        let err = schema
            .validate("research", &json!({"topic": 7}))
            .expect_err("wrong type");
        match err {
            ToolError::InvalidArguments { tool, reason } => {
                assert_eq!(tool, "research");
                assert!(reason.contains("/topic"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(schema.validate("research", &json!({})).is_err());
        assert!(
            schema
                .validate("research", &json!({"topic": "a", "extra": 1}))
                .is_err()
        );
    }

    #[test]
    fn rejects_invalid_schema() {
        let err = ArgumentSchema::compile(&json!({"type": 12})).expect_err("bad schema");
        assert!(matches!(err, ToolError::InvalidMetadata { .. }));
    }
}

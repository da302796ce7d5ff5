// Input schema helpers and argument validation
//
// Only the subset the tool catalog uses is checked: the arguments must be an
// object, required keys must be present and non-null, and declared properties
// must match their primitive type.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("arguments must be a JSON object")]
    NotAnObject,

    #[error("missing required argument '{0}'")]
    MissingRequired(String),

    #[error("argument '{name}' must be of type {expected}")]
    WrongType { name: String, expected: String },
}

/// Check `arguments` against an object schema built with [`json_schema_object`].
pub fn validate(schema: &Value, arguments: &Value) -> Result<(), SchemaError> {
    let args = arguments.as_object().ok_or(SchemaError::NotAnObject)?;

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();

    for name in required {
        match args.get(name) {
            None | Some(Value::Null) => return Err(SchemaError::MissingRequired(name.to_string())),
            Some(_) => {}
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (name, value) in args {
        // null on an optional argument means "not given"
        if value.is_null() {
            continue;
        }
        let Some(expected) = properties
            .get(name)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        if !matches_type(expected, value) {
            return Err(SchemaError::WrongType {
                name: name.clone(),
                expected: expected.to_string(),
            });
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

/// True when `schema` is an object schema whose required keys are all declared properties.
pub fn is_well_formed(schema: &Value) -> bool {
    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return false;
    }
    let properties = schema.get("properties").and_then(Value::as_object);
    let required = schema.get("required").and_then(Value::as_array);

    match (properties, required) {
        (_, None) => true,
        (None, Some(required)) => required.is_empty(),
        (Some(properties), Some(required)) => required
            .iter()
            .all(|r| r.as_str().is_some_and(|name| properties.contains_key(name))),
    }
}

// Helper functions for creating tool schemas

pub fn json_schema_object(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub fn json_schema_string(description: &str) -> Value {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query_schema() -> Value {
        json_schema_object(
            json!({
                "workspace_id": json_schema_string("Workspace ID"),
                "query": json_schema_string("PromQL query"),
                "region": json_schema_string("AWS region")
            }),
            vec!["workspace_id", "query"],
        )
    }

    #[test]
    fn test_valid_arguments() {
        let args = json!({"workspace_id": "ws-1", "query": "up"});
        assert_eq!(validate(&query_schema(), &args), Ok(()));
    }

    #[test]
    fn test_missing_required() {
        let err = validate(&query_schema(), &json!({"query": "up"})).unwrap_err();
        assert_eq!(err, SchemaError::MissingRequired("workspace_id".to_string()));

        let err = validate(&query_schema(), &json!({"workspace_id": null, "query": "up"})).unwrap_err();
        assert_eq!(err, SchemaError::MissingRequired("workspace_id".to_string()));
    }

    #[test]
    fn test_wrong_type() {
        let err = validate(&query_schema(), &json!({"workspace_id": 42, "query": "up"})).unwrap_err();
        assert_eq!(
            err,
            SchemaError::WrongType {
                name: "workspace_id".to_string(),
                expected: "string".to_string()
            }
        );
    }

    #[test]
    fn test_null_optional_and_unknown_keys_pass() {
        let args = json!({"workspace_id": "ws-1", "query": "up", "region": null, "extra": 1});
        assert_eq!(validate(&query_schema(), &args), Ok(()));
    }

    #[test]
    fn test_non_object_arguments() {
        assert_eq!(
            validate(&query_schema(), &json!(["ws-1", "up"])),
            Err(SchemaError::NotAnObject)
        );
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed(&query_schema()));
        assert!(is_well_formed(&json_schema_object(json!({}), vec![])));
        assert!(!is_well_formed(&json!({"type": "string"})));
        assert!(!is_well_formed(&json_schema_object(json!({}), vec!["missing"])));
    }
}

// Argument validation
//
// Basic checks against a tool's declared schema: the arguments are an object,
// required keys are present, and present keys have the declared primitive
// kind. Extra keys are passed through untouched.

use crate::errors::ToolError;
use crate::tools::types::ToolInputSchema;
use serde_json::{Map, Value};

/// Validate `arguments` and return them as an object.
///
/// `null` is treated as an empty object (models send it for tools without
/// parameters).
pub fn validate_arguments(schema: &ToolInputSchema, arguments: &Value) -> Result<Value, ToolError> {
    let object = match arguments {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        Value::String(raw) => {
            return Err(ToolError::invalid_arguments(format!(
                "arguments must be a JSON object, got unparsable text: {}",
                preview(raw)
            )))
        }
        other => {
            return Err(ToolError::invalid_arguments(format!(
                "arguments must be a JSON object, got {}",
                kind_of(other)
            )))
        }
    };

    for key in &schema.required {
        match object.get(key) {
            None | Some(Value::Null) => {
                return Err(ToolError::invalid_arguments(format!(
                    "missing required argument '{}'",
                    key
                )))
            }
            Some(_) => {}
        }
    }

    for (key, value) in &object {
        let Some(declared) = schema.property(key).and_then(|p| p.get("type")) else {
            continue;
        };
        // Optional arguments may be explicitly null
        if value.is_null() && !schema.required.iter().any(|r| r == key) {
            continue;
        }
        if !matches_declared(declared, value) {
            return Err(ToolError::invalid_arguments(format!(
                "argument '{}' must be of type {}, got {}",
                key,
                describe_declared(declared),
                kind_of(value)
            )));
        }
    }

    Ok(Value::Object(object))
}

fn matches_declared(declared: &Value, value: &Value) -> bool {
    match declared {
        Value::String(kind) => matches_kind(kind, value),
        Value::Array(kinds) => kinds
            .iter()
            .filter_map(Value::as_str)
            .any(|kind| matches_kind(kind, value)),
        // Unrecognised declaration: don't second-guess it
        _ => true,
    }
}

fn matches_kind(kind: &str, value: &Value) -> bool {
    match kind {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn describe_declared(declared: &Value) -> String {
    match declared {
        Value::Array(kinds) => kinds
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" | "),
        Value::String(kind) => kind.clone(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(raw: &str) -> String {
    const MAX: usize = 80;
    if raw.chars().count() <= MAX {
        raw.to_string()
    } else {
        format!("{}...", raw.chars().take(MAX).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolErrorKind;
    use serde_json::json;

    fn schema() -> ToolInputSchema {
        ToolInputSchema::object(
            json!({
                "sql": {"type": "string"},
                "max_rows": {"type": "integer"},
                "params": {"type": ["array", "object", "string", "number", "boolean"]},
            }),
            &["sql"],
        )
    }

    #[test]
    fn test_valid_arguments_pass_through() {
        let args = json!({"sql": "SELECT 1", "max_rows": 5, "extra": true});
        assert_eq!(validate_arguments(&schema(), &args).unwrap(), args);
    }

    #[test]
    fn test_missing_required() {
        let err = validate_arguments(&schema(), &json!({"max_rows": 5})).unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidArguments);
        assert!(err.message.contains("'sql'"));
    }

    #[test]
    fn test_wrong_kind() {
        let err = validate_arguments(&schema(), &json!({"sql": 42})).unwrap_err();
        assert!(err.message.contains("string"), "{}", err.message);

        let err = validate_arguments(&schema(), &json!({"sql": "x", "max_rows": 1.5})).unwrap_err();
        assert!(err.message.contains("integer"), "{}", err.message);
    }

    #[test]
    fn test_union_types_and_optional_null() {
        assert!(validate_arguments(&schema(), &json!({"sql": "x", "params": [1]})).is_ok());
        assert!(validate_arguments(&schema(), &json!({"sql": "x", "params": {"a": 1}})).is_ok());
        assert!(validate_arguments(&schema(), &json!({"sql": "x", "max_rows": null})).is_ok());
        assert!(validate_arguments(&schema(), &json!({"sql": null})).is_err());
    }

    #[test]
    fn test_non_object_arguments() {
        let err = validate_arguments(&schema(), &json!("{not json")).unwrap_err();
        assert!(err.message.contains("unparsable"));
        assert!(validate_arguments(&schema(), &json!([1, 2])).is_err());

        let empty = ToolInputSchema::object(json!({}), &[]);
        assert_eq!(validate_arguments(&empty, &Value::Null).unwrap(), json!({}));
    }
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SkillOutput;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaValidationResult {
    pub valid: bool,
    pub errors: Vec<SchemaError>,
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 布尔值不算数字
fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn push(errors: &mut Vec<SchemaError>, path: &str, message: String) {
    errors.push(SchemaError {
        path: path.to_string(),
        message,
    });
}

fn check(data: &Value, schema: &Value, path: &str, errors: &mut Vec<SchemaError>) {
    let expected = schema.get("type").and_then(Value::as_str);
    if let Some(expected) = expected {
        if !matches_type(data, expected) {
            push(
                errors,
                path,
                format!(
                    "Expected type '{}' but got '{}'",
                    expected,
                    type_name(data)
                ),
            );
            return;
        }
    }

    match (expected, data) {
        (Some("object"), Value::Object(map)) => {
            if let Some(required) = schema.get("required").and_then(Value::as_array) {
                for field in required.iter().filter_map(Value::as_str) {
                    if !map.contains_key(field) {
                        push(
                            errors,
                            &format!("{}.{}", path, field),
                            format!("Required field '{}' is missing", field),
                        );
                    }
                }
            }
            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                for (key, value) in map {
                    if let Some(sub) = properties.get(key) {
                        check(value, sub, &format!("{}.{}", path, key), errors);
                    }
                }
            }
        }
        (Some("array"), Value::Array(items)) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check(item, item_schema, &format!("{}[{}]", path, i), errors);
                }
            }
            if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
                if (items.len() as u64) < min {
                    push(errors, path, format!("Array must have at least {} items", min));
                }
            }
            if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
                if (items.len() as u64) > max {
                    push(errors, path, format!("Array must have at most {} items", max));
                }
            }
        }
        (Some("string"), Value::String(s)) => {
            let len = s.chars().count() as u64;
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
                if len < min {
                    push(errors, path, format!("String must be at least {} characters", min));
                }
            }
            if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
                if len > max {
                    push(errors, path, format!("String must be at most {} characters", max));
                }
            }
            if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
                match Regex::new(&format!("^(?:{})", pattern)) {
                    Ok(re) if re.is_match(s) => {}
                    Ok(_) => push(
                        errors,
                        path,
                        format!("String does not match pattern '{}'", pattern),
                    ),
                    Err(e) => push(errors, path, format!("Invalid pattern '{}': {}", pattern, e)),
                }
            }
        }
        (Some("number" | "integer"), Value::Number(n)) => {
            let Some(x) = n.as_f64() else { return };
            if let Some(min) = schema.get("minimum").filter(|v| v.is_number()) {
                if min.as_f64().is_some_and(|m| x < m) {
                    push(errors, path, format!("Number must be at least {}", min));
                }
            }
            if let Some(max) = schema.get("maximum").filter(|v| v.is_number()) {
                if max.as_f64().is_some_and(|m| x > m) {
                    push(errors, path, format!("Number must be at most {}", max));
                }
            }
        }
        _ => {}
    }
}

/// 按 JSON Schema 子集校验，路径形如 `$`、`$.field`、`$[0]`
pub fn validate_schema(data: &Value, schema: &Value) -> SchemaValidationResult {
    let mut errors = Vec::new();
    check(data, schema, "$", &mut errors);
    SchemaValidationResult {
        valid: errors.is_empty(),
        errors,
    }
}

/// 以 `{data, schema}` 为输入运行 schema-validator，null 视为缺失
pub fn execute(input: &Value) -> SkillOutput<SchemaValidationResult> {
    let data = input.get("data").filter(|v| !v.is_null());
    let schema = input.get("schema").filter(|v| !v.is_null());
    match (data, schema) {
        (None, _) => SkillOutput::Error {
            message: "Missing 'data' field in input".to_string(),
        },
        (_, None) => SkillOutput::Error {
            message: "Missing 'schema' field in input".to_string(),
        },
        (Some(data), Some(schema)) => SkillOutput::Success {
            result: validate_schema(data, schema),
        },
    }
}

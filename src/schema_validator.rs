//! Schema-level validation of hydrated values.
//!
//! Checks the JSON Schema keywords `schemars` records for a field: numeric
//! ranges, fixed-width integer formats, string lengths, allowed values and URI
//! format. Elements of sequences and mappings are checked against their item
//! schema. Every violation is collected so one failed load reports all of them.

use serde_json::{Map, Value};

use crate::error::Violation;
use crate::schema::{FieldKind, Schema};

/// Formats with a runtime check. Others are accepted unchecked.
const CHECKED_FORMATS: &[&str] = &["uri"];

/// Validate `fields` against `schema`, recursing into nested schemas.
///
/// Absent fields are skipped; missing required fields surface during
/// deserialization instead.
pub fn validate_fields(schema: &Schema, fields: &Map<String, Value>) -> Vec<Violation> {
    let mut violations = Vec::new();
    walk(schema, fields, "", &mut violations);
    violations
}

fn walk(schema: &Schema, fields: &Map<String, Value>, prefix: &str, violations: &mut Vec<Violation>) {
    for node in schema.nodes() {
        let Some(value) = fields.get(&node.name) else {
            continue;
        };
        let path = if prefix.is_empty() {
            node.name.clone()
        } else {
            format!("{}.{}", prefix, node.name)
        };

        if let (FieldKind::Nested(nested), Value::Object(inner)) = (&node.kind, value) {
            walk(nested, inner, &path, violations);
            continue;
        }

        check_value(&node.constraints, value, &path, violations);
    }
}

/// Keyword checks for one value, then its elements against `items` or
/// `additionalProperties`.
fn check_value(constraints: &Map<String, Value>, value: &Value, path: &str, violations: &mut Vec<Violation>) {
    for message in check_keywords(constraints, value) {
        violations.push(Violation {
            path: path.to_string(),
            message,
        });
    }

    match value {
        Value::Array(elements) => {
            // Tuple schemas carry an array of item schemas; those are left to serde.
            if let Some(items) = constraints.get("items").and_then(Value::as_object) {
                for (i, element) in elements.iter().enumerate() {
                    check_element(items, element, &format!("{}[{}]", path, i), violations);
                }
            }
        }
        Value::Object(entries) => {
            if let Some(values) = constraints.get("additionalProperties").and_then(Value::as_object) {
                for (key, element) in entries {
                    check_element(values, element, &format!("{}.{}", path, key), violations);
                }
            }
        }
        _ => {}
    }
}

fn check_element(schema: &Map<String, Value>, value: &Value, path: &str, violations: &mut Vec<Violation>) {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !matches_type(expected, value) {
            violations.push(Violation {
                path: path.to_string(),
                message: format!("expected {}, found {}", expected, value),
            });
            return;
        }
    }
    check_value(schema, value, path, violations);
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// Range of the integer formats `schemars` emits for fixed-width types.
fn integer_range(format: &str) -> Option<(i128, i128)> {
    let range = match format {
        "int8" => (i8::MIN as i128, i8::MAX as i128),
        "uint8" => (0, u8::MAX as i128),
        "int16" => (i16::MIN as i128, i16::MAX as i128),
        "uint16" => (0, u16::MAX as i128),
        "int32" => (i32::MIN as i128, i32::MAX as i128),
        "uint32" => (0, u32::MAX as i128),
        "int64" | "int" => (i64::MIN as i128, i64::MAX as i128),
        "uint64" | "uint" => (0, u64::MAX as i128),
        _ => return None,
    };
    Some(range)
}

fn check_keywords(constraints: &Map<String, Value>, value: &Value) -> Vec<String> {
    let mut messages = Vec::new();

    if let Some(allowed) = constraints.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            messages.push(format!(
                "{} is not one of {}",
                value,
                Value::Array(allowed.clone())
            ));
        }
    }

    let format = constraints.get("format").and_then(Value::as_str);

    if let Some((min, max)) = format.and_then(integer_range) {
        let n = value
            .as_i64()
            .map(i128::from)
            .or_else(|| value.as_u64().map(i128::from));
        if let (Some(n), Some(format)) = (n, format) {
            if n < min || n > max {
                messages.push(format!("{} is out of range for {}", n, format));
            }
        }
    }

    if let Some(n) = value.as_f64() {
        let bound = |key: &str| constraints.get(key).and_then(Value::as_f64);
        if let Some(min) = bound("minimum") {
            if n < min {
                messages.push(format!("{} is less than the minimum of {}", n, min));
            }
        }
        if let Some(max) = bound("maximum") {
            if n > max {
                messages.push(format!("{} is greater than the maximum of {}", n, max));
            }
        }
        if let Some(min) = bound("exclusiveMinimum") {
            if n <= min {
                messages.push(format!("{} must be greater than {}", n, min));
            }
        }
        if let Some(max) = bound("exclusiveMaximum") {
            if n >= max {
                messages.push(format!("{} must be less than {}", n, max));
            }
        }
    }

    if let Some(s) = value.as_str() {
        let len = s.chars().count() as u64;
        if let Some(min) = constraints.get("minLength").and_then(Value::as_u64) {
            if len < min {
                messages.push(format!("length {} is shorter than {}", len, min));
            }
        }
        if let Some(max) = constraints.get("maxLength").and_then(Value::as_u64) {
            if len > max {
                messages.push(format!("length {} is longer than {}", len, max));
            }
        }
        if let Some(format) = format {
            if CHECKED_FORMATS.contains(&format) {
                if let Err(e) = reqwest::Url::parse(s) {
                    messages.push(format!("'{}' is not a valid URI: {}", s, e));
                }
            }
        }
    }

    messages
}

//! Conversion of resolved string values into typed JSON values.
//!
//! Dispatch is a `match` over the closed [`FieldKind`] enum. The result is a
//! `serde_json::Value` shaped so that serde can build the declared Rust type.

use std::collections::HashSet;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde_json::{Number, Value};

use crate::error::CoercionError;
use crate::schema::{FieldKind, KindTag};

const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
const FALSY: [&str; 4] = ["false", "0", "no", "off"];

/// Parse a boolean from the fixed truth table.
///
/// `true`, `1`, `yes`, `on` map to true; `false`, `0`, `no`, `off` to false.
/// Matching ignores case and surrounding whitespace; nothing else is accepted.
pub fn parse_bool(raw: &str) -> Option<bool> {
    let lowered = raw.trim().to_lowercase();
    if TRUTHY.contains(&lowered.as_str()) {
        Some(true)
    } else if FALSY.contains(&lowered.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Coerce `raw` into the value expected for `kind`. `path` only feeds error messages.
pub fn coerce(path: &str, raw: &str, kind: &FieldKind) -> Result<Value, CoercionError> {
    let fail = |reason: String| CoercionError {
        path: path.to_string(),
        raw: raw.to_string(),
        target: kind.tag(),
        reason,
    };

    match kind {
        FieldKind::Text => Ok(Value::String(raw.to_string())),
        FieldKind::Integer => parse_integer(raw.trim()).ok_or_else(|| fail("not an integer".to_string())),
        FieldKind::Float => {
            let parsed = f64::from_str(raw.trim()).map_err(|e| fail(e.to_string()))?;
            Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| fail("not a finite number".to_string()))
        }
        FieldKind::Decimal => {
            let trimmed = raw.trim();
            BigDecimal::from_str(trimmed).map_err(|e| fail(e.to_string()))?;
            Ok(Value::String(trimmed.to_string()))
        }
        FieldKind::Boolean => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| fail("expected one of true/1/yes/on or false/0/no/off".to_string())),
        FieldKind::Mapping => match decode_json(raw).map_err(&fail)? {
            map @ Value::Object(_) => Ok(map),
            other => Err(fail(format!("expected a JSON object, got {}", json_type(&other)))),
        },
        FieldKind::Sequence => match decode_json(raw).map_err(&fail)? {
            list @ Value::Array(_) => Ok(list),
            other => Err(fail(format!("expected a JSON array, got {}", json_type(&other)))),
        },
        FieldKind::Set => match decode_json(raw).map_err(&fail)? {
            Value::Array(items) => Ok(Value::Array(dedup(items))),
            other => Err(fail(format!("expected a JSON array, got {}", json_type(&other)))),
        },
        FieldKind::Nested(_) => Err(fail(format!(
            "{} fields are hydrated from sections, not from a single value",
            KindTag::Nested
        ))),
    }
}

fn parse_integer(raw: &str) -> Option<Value> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::from(n));
    }
    raw.parse::<u64>().ok().map(Value::from)
}

fn decode_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {}", e))
}

/// Keep the first occurrence of every element.
fn dedup(items: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.to_string()))
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

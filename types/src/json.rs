//! Conversion between [`TaggedValue`] and `serde_json::Value`.
//!
//! JSON carries fewer kinds than the tagged model, so the mapping is lossy in
//! both directions: integer widths collapse to `Int64`/`UInt64`, floats to
//! `Float64`, and `Bytes` travel as base64 text.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::value::{TaggedValue, ValueKind};

#[derive(Debug, Error)]
pub enum JsonError {
    #[error("{0} values have no JSON representation")]
    Unrepresentable(ValueKind),
    #[error("non-finite float {0} has no JSON representation")]
    NonFinite(f64),
    #[error("invalid JSON text: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("expected a json_string value, found {0}")]
    NotJsonString(ValueKind),
}

/// Render a tagged value as JSON.
///
/// `JsonString` payloads are parsed and embedded as structured JSON rather than
/// as a quoted string.
pub fn to_json(value: &TaggedValue) -> Result<Value, JsonError> {
    Ok(match value {
        TaggedValue::Null => Value::Null,
        TaggedValue::Bool(b) => Value::Bool(*b),
        TaggedValue::Int8(v) => Value::from(*v),
        TaggedValue::Int16(v) => Value::from(*v),
        TaggedValue::Int32(v) => Value::from(*v),
        TaggedValue::Int64(v) => Value::from(*v),
        TaggedValue::UInt8(v) => Value::from(*v),
        TaggedValue::UInt16(v) => Value::from(*v),
        TaggedValue::UInt32(v) => Value::from(*v),
        TaggedValue::UInt64(v) => Value::from(*v),
        TaggedValue::Float32(v) => float(f64::from(*v))?,
        TaggedValue::Float64(v) => float(*v)?,
        TaggedValue::String(s) => Value::String(s.clone()),
        TaggedValue::Bytes(b) => Value::String(STANDARD.encode(b)),
        TaggedValue::Array(items) => {
            Value::Array(items.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        TaggedValue::Object(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, item) in entries {
                map.insert(key.clone(), to_json(item)?);
            }
            Value::Object(map)
        }
        TaggedValue::Ptr(_) => return Err(JsonError::Unrepresentable(ValueKind::Ptr)),
        TaggedValue::JsonString(text) => serde_json::from_str(text)?,
    })
}

fn float(v: f64) -> Result<Value, JsonError> {
    Number::from_f64(v)
        .map(Value::Number)
        .ok_or(JsonError::NonFinite(v))
}

/// Build a tagged value from JSON.
///
/// Integers become `Int64`, or `UInt64` when above `i64::MAX`. Every other
/// number becomes `Float64`.
#[must_use]
pub fn from_json(value: &Value) -> TaggedValue {
    match value {
        Value::Null => TaggedValue::Null,
        Value::Bool(b) => TaggedValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                TaggedValue::Int64(i)
            } else if let Some(u) = n.as_u64() {
                TaggedValue::UInt64(u)
            } else {
                TaggedValue::Float64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => TaggedValue::String(s.clone()),
        Value::Array(items) => TaggedValue::Array(items.iter().map(from_json).collect()),
        Value::Object(map) => TaggedValue::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), from_json(item)))
                .collect(),
        ),
    }
}

/// Wrap a JSON document as a `JsonString` value.
pub fn to_json_string(value: &Value) -> Result<TaggedValue, JsonError> {
    Ok(TaggedValue::JsonString(serde_json::to_string(value)?))
}

/// Parse the payload of a `JsonString` value.
pub fn parse_json_string(value: &TaggedValue) -> Result<Value, JsonError> {
    match value {
        TaggedValue::JsonString(text) => Ok(serde_json::from_str(text)?),
        other => Err(JsonError::NotJsonString(other.kind())),
    }
}

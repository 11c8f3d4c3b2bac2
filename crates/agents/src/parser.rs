//! Best-effort decoding of structured role output.
//!
//! Roles are instructed to answer in JSON but nothing guarantees it. These
//! functions never fail: anything that is not a JSON object resolves to the
//! caller's fallback, whole and untouched.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A decoded JSON object.
pub type Record = Map<String, Value>;

/// Decode `text` as a JSON object, or return `fallback` unchanged.
///
/// Surrounding whitespace is tolerated; code fences, prose or trailing text
/// are not. A decoded object is returned as is, never merged with the
/// fallback.
pub fn parse_record(text: &str, fallback: Record) -> Record {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(record)) => record,
        Ok(other) => {
            tracing::debug!("Structured output is not an object ({}), using fallback", kind(&other));
            fallback
        }
        Err(e) => {
            tracing::debug!("Structured output did not decode ({}), using fallback", e);
            fallback
        }
    }
}

/// Decode `text` as a JSON object into `T`, or return `default`.
pub fn decode_or_default<T: DeserializeOwned>(text: &str, default: T) -> T {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or(default),
        _ => default,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

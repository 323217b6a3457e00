//! Canonical byte encoding for hashing.
//!
//! Object keys are sorted and buffers are expanded to plain arrays, so two
//! structurally equal values always encode to the same bytes.

use crate::value::Value;
use std::collections::BTreeMap;

/// Encode a value canonically
///
/// # Errors
///
/// Returns error if serialization fails
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&sort_keys(value.to_json()))
}

/// Encode any serializable value canonically
///
/// # Errors
///
/// Returns error if the value cannot be represented as JSON
pub fn canonical_bytes_of<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_value(value)?;
    serde_json::to_vec(&sort_keys(json))
}

fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

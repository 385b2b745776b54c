//! # JSON Module
//!
//! Request body parsing using simd-json; serialization through serde_json.

use crate::error::{Error, Result};
use crate::request::ParsedBody;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse JSON bytes to a typed value using simd-json
///
/// simd-json parses in place, so the buffer is clobbered.
///
/// # Errors
///
/// Returns `Error::InvalidBody` if parsing fails
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::InvalidBody {
        reason: format!("JSON parse error: {e}"),
    })
}

/// Parse a request body that must be a JSON object
///
/// # Errors
///
/// Returns `Error::InvalidBody` if the body is not valid JSON or not an object
pub fn parse_json_object(body: &[u8]) -> Result<ParsedBody> {
    let mut bytes = body.to_vec();
    match parse_json_bytes::<serde_json::Value>(&mut bytes)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(Error::InvalidBody {
            reason: format!("JSON body must be an object, got {}", json_kind(&other)),
        }),
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Serialize a value to JSON string
///
/// # Errors
///
/// Returns `Error::Json` if the value cannot be serialized
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

//! # Parameter Types
//!
//! Typed values for handler parameters and the coercion rules from raw
//! path segments, query strings, form fields and JSON body values.

use crate::database::DbValue;
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Expected type of a handler parameter
///
/// Path placeholders may carry one (`/users/{id:int}`); body and query
/// parameters declare it in their contract. Default is `String`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamType {
    /// String type (default) - no conversion
    #[default]
    String,
    /// Integer type - parses to i64
    Int,
    /// Float type - parses to f64
    Float,
    /// Boolean type - parses "true"/"false" or "1"/"0"
    Bool,
}

impl ParamType {
    /// Parse type specifier from route pattern (e.g., "int" from "{id:int}")
    #[must_use]
    pub fn from_specifier(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "int" | "integer" | "i64" => Self::Int,
            "float" | "f64" | "number" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            _ => Self::String,
        }
    }

    /// Get the type name for error messages
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A bound parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// String value (no conversion performed)
    String(String),
    /// Integer value (i64)
    Int(i64),
    /// Float value (f64)
    Float(f64),
    /// Boolean value
    Bool(bool),
}

impl ParamValue {
    /// Get the value as a string
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }

    /// Borrow if String variant
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64 if Int variant
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if Float variant
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as bool if Bool variant
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<ParamValue> for DbValue {
    fn from(value: ParamValue) -> Self {
        match value {
            ParamValue::String(s) => Self::String(s),
            ParamValue::Int(i) => Self::Int(i),
            ParamValue::Float(f) => Self::Float(f),
            ParamValue::Bool(b) => Self::Bool(b),
        }
    }
}

fn mismatch(raw: &str, param_type: ParamType) -> Error {
    Error::Decode {
        expected: param_type.type_name(),
        found: format!("{raw:?}"),
    }
}

/// Convert raw string to typed value based on `ParamType`
///
/// # Errors
///
/// Returns `Error::Decode` if conversion fails.
pub fn convert_param(raw: &str, param_type: ParamType) -> Result<ParamValue> {
    match param_type {
        ParamType::String => Ok(ParamValue::String(raw.to_string())),
        ParamType::Int => raw
            .trim()
            .parse::<i64>()
            .map(ParamValue::Int)
            .map_err(|_| mismatch(raw, param_type)),
        ParamType::Float => raw
            .trim()
            .parse::<f64>()
            .map(ParamValue::Float)
            .map_err(|_| mismatch(raw, param_type)),
        ParamType::Bool => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(ParamValue::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(ParamValue::Bool(false)),
            _ => Err(mismatch(raw, param_type)),
        },
    }
}

/// Convert a parsed JSON body value
///
/// Returns `Ok(None)` for JSON `null`, which binds like an absent value.
///
/// # Errors
///
/// `Error::Decode` for arrays, objects and unconvertible scalars.
pub fn convert_json(value: &Value, param_type: ParamType) -> Result<Option<ParamValue>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => convert_param(s, param_type).map(Some),
        Value::Bool(b) if param_type == ParamType::Bool => Ok(Some(ParamValue::Bool(*b))),
        Value::Number(n) if param_type == ParamType::Int && n.is_i64() => {
            Ok(n.as_i64().map(ParamValue::Int))
        }
        Value::Number(n) if param_type == ParamType::Float => Ok(n.as_f64().map(ParamValue::Float)),
        Value::Bool(_) | Value::Number(_) => convert_param(&value.to_string(), param_type).map(Some),
        Value::Array(_) | Value::Object(_) => Err(mismatch(&value.to_string(), param_type)),
    }
}

/// Parse a path segment pattern to extract name and type
///
/// Examples:
/// - `{id}` -> ("id", ParamType::String)
/// - `{id:int}` -> ("id", ParamType::Int)
///
/// # Returns
///
/// `Some((name, type))` if pattern is a parameter, `None` if static segment.
#[must_use]
pub fn parse_param_pattern(segment: &str) -> Option<(String, ParamType)> {
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
    if let Some((name, type_spec)) = inner.split_once(':') {
        Some((name.to_string(), ParamType::from_specifier(type_spec)))
    } else {
        Some((inner.to_string(), ParamType::String))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_type_from_specifier() {
        assert_eq!(ParamType::from_specifier("int"), ParamType::Int);
        assert_eq!(ParamType::from_specifier("INT"), ParamType::Int);
        assert_eq!(ParamType::from_specifier("float"), ParamType::Float);
        assert_eq!(ParamType::from_specifier("bool"), ParamType::Bool);
        assert_eq!(ParamType::from_specifier("unknown"), ParamType::String);
    }

    #[test]
    fn test_convert_param() {
        assert_eq!(
            convert_param("hello", ParamType::String).unwrap(),
            ParamValue::String("hello".to_string())
        );
        assert_eq!(convert_param("-456", ParamType::Int).unwrap(), ParamValue::Int(-456));
        assert_eq!(convert_param("0", ParamType::Bool).unwrap(), ParamValue::Bool(false));
        assert!(convert_param("abc", ParamType::Int).is_err());
    }

    #[test]
    fn test_convert_json() {
        assert_eq!(convert_json(&Value::Null, ParamType::String).unwrap(), None);
        assert_eq!(
            convert_json(&json!(2), ParamType::String).unwrap(),
            Some(ParamValue::String("2".to_string()))
        );
        assert_eq!(
            convert_json(&json!(7), ParamType::Int).unwrap(),
            Some(ParamValue::Int(7))
        );
        assert_eq!(
            convert_json(&json!("7"), ParamType::Int).unwrap(),
            Some(ParamValue::Int(7))
        );
        assert_eq!(
            convert_json(&json!(true), ParamType::Bool).unwrap(),
            Some(ParamValue::Bool(true))
        );
        assert!(convert_json(&json!([1]), ParamType::String).is_err());
    }

    #[test]
    fn test_parse_param_pattern() {
        assert_eq!(
            parse_param_pattern("{id}"),
            Some(("id".to_string(), ParamType::String))
        );
        assert_eq!(
            parse_param_pattern("{id:int}"),
            Some(("id".to_string(), ParamType::Int))
        );
        assert_eq!(parse_param_pattern("static"), None);
    }

    #[test]
    fn test_param_value_into_db_value() {
        assert_eq!(DbValue::from(ParamValue::Int(42)), DbValue::Int(42));
        assert_eq!(ParamValue::Bool(true).as_string(), "true");
    }
}

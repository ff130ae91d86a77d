//! Native value model.
//!
//! [`Value`] is the caller-facing representation of a record attribute. It is
//! deliberately small: maps, sequences, strings, bytes, booleans, numbers and
//! null. Anything richer must be flattened into these before it reaches the
//! codec.

use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{AccessError, Result};

/// A record: the top-level attribute map of a table item.
pub type Record = BTreeMap<String, Value>;

/// A native, recursively defined attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Map(BTreeMap<String, Value>),
    List(Vec<Value>),
    String(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Number(Number),
    Null,
}

/// A number that keeps integers and floats apart.
///
/// The integer arm is wide enough for any 38-digit store integer, so integral
/// values survive a read and write back unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i128),
    Float(f64),
}

impl Number {
    /// Parse a decimal string, preferring an integer reading.
    pub fn parse(raw: &str) -> Result<Self> {
        if let Ok(int) = raw.parse::<i128>() {
            return Ok(Number::Int(int));
        }
        match raw.parse::<f64>() {
            Ok(float) if float.is_finite() => Ok(Number::Float(float)),
            _ => Err(AccessError::NumberParse(raw.to_string())),
        }
    }

    /// Render as the decimal string the store expects.
    ///
    /// Floats always carry a decimal point so they parse back as floats.
    pub fn to_decimal(&self) -> Result<String> {
        match *self {
            Number::Int(int) => Ok(int.to_string()),
            Number::Float(float) if !float.is_finite() => Err(AccessError::EncodingType(format!(
                "non-finite number {float}"
            ))),
            Number::Float(float) => {
                let rendered = float.to_string();
                if rendered.contains(['.', 'e', 'E']) {
                    Ok(rendered)
                } else {
                    Ok(format!("{rendered}.0"))
                }
            }
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(int) => int as f64,
            Number::Float(float) => float,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(int) => write!(f, "{int}"),
            Number::Float(float) => write!(f, "{float}"),
        }
    }
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Map(_) => "map",
            Value::List(_) => "list",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Null => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    /// Convert into JSON for display. Bytes become base64 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(bytes) => serde_json::Value::String(STANDARD.encode(bytes)),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(Number::Int(int)) => int_to_json(*int),
            Value::Number(Number::Float(float)) => serde_json::Number::from_f64(*float)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Null => serde_json::Value::Null,
        }
    }
}

// JSON numbers stop at 64 bits; wider integers display as floats.
fn int_to_json(int: i128) -> serde_json::Value {
    if let Ok(small) = i64::try_from(int) {
        serde_json::Value::from(small)
    } else if let Ok(unsigned) = u64::try_from(int) {
        serde_json::Value::from(unsigned)
    } else {
        serde_json::Number::from_f64(int as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Convert a record into a JSON object for display.
pub fn record_to_json(record: &Record) -> serde_json::Value {
    serde_json::Value::Object(
        record
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                let int = n
                    .as_i64()
                    .map(i128::from)
                    .or_else(|| n.as_u64().map(i128::from));
                match int {
                    Some(int) => Value::Number(Number::Int(int)),
                    None => Value::Number(Number::Float(n.as_f64().unwrap_or(f64::NAN))),
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i128> for Value {
    fn from(int: i128) -> Self {
        Value::Number(Number::Int(int))
    }
}

impl From<i64> for Value {
    fn from(int: i64) -> Self {
        Value::Number(Number::Int(int.into()))
    }
}

impl From<u64> for Value {
    fn from(int: u64) -> Self {
        Value::Number(Number::Int(int.into()))
    }
}

impl From<i32> for Value {
    fn from(int: i32) -> Self {
        Value::Number(Number::Int(int.into()))
    }
}

impl From<u32> for Value {
    fn from(int: u32) -> Self {
        Value::Number(Number::Int(int.into()))
    }
}

impl From<f64> for Value {
    fn from(float: f64) -> Self {
        Value::Number(Number::Float(float))
    }
}

impl From<Number> for Value {
    fn from(number: Number) -> Self {
        Value::Number(number)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

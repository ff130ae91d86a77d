//! Conversion between native [`Value`]s and the store's tagged encoding.
//!
//! The store wants every nested value wrapped in a single-key type tag
//! (`{"S": "abc"}`, `{"N": "42"}`, `{"M": {...}}`), but its key and item
//! parameters are plain attribute maps whose members are tagged while the map
//! itself is not. The two shapes get separate functions:
//!
//! - [`encode_value`] / [`decode_value`] for a single tagged value.
//! - [`encode_attribute_map`] / [`decode_attribute_map`] for a bare map of
//!   tagged members (items, keys, continuation keys).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, Result};
use crate::value::{Number, Record, Value};

/// A bare attribute map: untagged at the top, tagged members.
pub type AttributeMap = BTreeMap<String, TaggedValue>;

/// The store's explicit-type wire encoding.
///
/// Serializes to the single-key JSON form, with `B` payloads as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaggedValue {
    M(BTreeMap<String, TaggedValue>),
    L(Vec<TaggedValue>),
    S(String),
    #[serde(with = "base64_bytes")]
    B(Vec<u8>),
    #[serde(rename = "BOOL")]
    Bool(bool),
    N(String),
    #[serde(rename = "NULL")]
    Null(bool),
}

impl TaggedValue {
    /// The wire tag of this value.
    pub fn tag(&self) -> &'static str {
        match self {
            TaggedValue::M(_) => "M",
            TaggedValue::L(_) => "L",
            TaggedValue::S(_) => "S",
            TaggedValue::B(_) => "B",
            TaggedValue::Bool(_) => "BOOL",
            TaggedValue::N(_) => "N",
            TaggedValue::Null(_) => "NULL",
        }
    }

    /// Parse the raw JSON tagged form, rejecting anything that is not a
    /// single-key object with a known tag.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| AccessError::Format(format!("Tagged value must be an object: {json}")))?;

        if object.len() != 1 {
            return Err(AccessError::Format(format!(
                "One key expected for tagged value, but got {}: {json}",
                object.len()
            )));
        }
        let Some((tag, payload)) = object.iter().next() else {
            return Err(AccessError::Format(format!("Empty tagged value: {json}")));
        };

        let mismatch = || AccessError::Format(format!("Invalid payload for tag {tag}: {payload}"));

        match tag.as_str() {
            "M" => {
                let members = payload.as_object().ok_or_else(mismatch)?;
                members
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), TaggedValue::from_json(v)?)))
                    .collect::<Result<_>>()
                    .map(TaggedValue::M)
            }
            "L" => {
                let items = payload.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .map(TaggedValue::from_json)
                    .collect::<Result<_>>()
                    .map(TaggedValue::L)
            }
            "S" => payload
                .as_str()
                .map(|s| TaggedValue::S(s.to_string()))
                .ok_or_else(mismatch),
            "B" => {
                let encoded = payload.as_str().ok_or_else(mismatch)?;
                base64_bytes::decode(encoded)
                    .map(TaggedValue::B)
                    .map_err(|_| mismatch())
            }
            "BOOL" => payload.as_bool().map(TaggedValue::Bool).ok_or_else(mismatch),
            "N" => payload
                .as_str()
                .map(|s| TaggedValue::N(s.to_string()))
                .ok_or_else(mismatch),
            "NULL" => payload.as_bool().map(TaggedValue::Null).ok_or_else(mismatch),
            other => Err(AccessError::Format(format!("Unknown type tag {other:?}"))),
        }
    }

    /// Render in the single-key JSON form.
    pub fn to_json(&self) -> serde_json::Value {
        // Serializing plain strings, maps and vectors cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Encode a single native value in its tagged form.
pub fn encode_value(value: &Value) -> Result<TaggedValue> {
    Ok(match value {
        Value::Map(map) => TaggedValue::M(encode_attribute_map(map)?),
        Value::List(items) => TaggedValue::L(encode_sequence(items)?),
        Value::String(s) => TaggedValue::S(s.clone()),
        Value::Bytes(bytes) => TaggedValue::B(bytes.clone()),
        Value::Bool(b) => TaggedValue::Bool(*b),
        Value::Number(number) => TaggedValue::N(number.to_decimal()?),
        Value::Null => TaggedValue::Null(true),
    })
}

/// Encode a map as a bare attribute map: members are tagged, the map is not.
pub fn encode_attribute_map(map: &BTreeMap<String, Value>) -> Result<AttributeMap> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), encode_value(v)?)))
        .collect()
}

/// Encode a top-level sequence elementwise.
pub fn encode_sequence(items: &[Value]) -> Result<Vec<TaggedValue>> {
    items.iter().map(encode_value).collect()
}

/// Decode a single tagged value.
pub fn decode_value(tagged: &TaggedValue) -> Result<Value> {
    Ok(match tagged {
        TaggedValue::M(members) => Value::Map(decode_attribute_map(members)?),
        TaggedValue::L(items) => Value::List(
            items
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        TaggedValue::S(s) => Value::String(s.clone()),
        TaggedValue::B(bytes) => Value::Bytes(bytes.clone()),
        TaggedValue::Bool(b) => Value::Bool(*b),
        TaggedValue::N(raw) => Value::Number(Number::parse(raw)?),
        TaggedValue::Null(_) => Value::Null,
    })
}

/// Decode a bare attribute map into a record.
pub fn decode_attribute_map(map: &AttributeMap) -> Result<Record> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

/// Decode a raw JSON tagged value.
///
/// Objects must be single-key tagged values, arrays are decoded elementwise
/// and any other JSON scalar is taken as already native.
pub fn decode_json(json: &serde_json::Value) -> Result<Value> {
    match json {
        serde_json::Value::Object(_) => decode_value(&TaggedValue::from_json(json)?),
        serde_json::Value::Array(items) => Ok(Value::List(
            items.iter().map(decode_json).collect::<Result<Vec<_>>>()?,
        )),
        scalar => Ok(Value::from(scalar.clone())),
    }
}

/// Decode a raw JSON bare attribute map (a record as the store returns it).
pub fn decode_json_record(json: &serde_json::Value) -> Result<Record> {
    let object = json
        .as_object()
        .ok_or_else(|| AccessError::Format(format!("Record must be an object: {json}")))?;
    object
        .iter()
        .map(|(k, v)| Ok((k.clone(), decode_json(v)?)))
        .collect()
}

pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        decode(&encoded).map_err(serde::de::Error::custom)
    }

    pub fn decode(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(encoded)
    }
}

//! Opaque pagination cursors.
//!
//! A cursor is the store's continuation key serialized as tagged JSON and
//! wrapped in standard base64.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::codec::{AttributeMap, TaggedValue};
use crate::error::{AccessError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    /// Wraps a continuation key into a cursor.
    pub fn encode(key: &AttributeMap) -> Result<Self> {
        let json = serde_json::to_vec(key)
            .map_err(|e| AccessError::Format(format!("Cannot serialize cursor key: {e}")))?;
        Ok(Self(STANDARD.encode(json)))
    }

    /// Recovers the continuation key from a cursor.
    pub fn decode(&self) -> Result<AttributeMap> {
        let bytes = STANDARD
            .decode(self.0.as_bytes())
            .map_err(|e| AccessError::BadCursor(format!("not base64: {e}")))?;
        let json: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| AccessError::BadCursor(format!("not JSON: {e}")))?;
        let object = json
            .as_object()
            .ok_or_else(|| AccessError::BadCursor("expected a JSON object".to_string()))?;

        object
            .iter()
            .map(|(name, value)| {
                TaggedValue::from_json(value)
                    .map(|tagged| (name.clone(), tagged))
                    .map_err(|e| AccessError::BadCursor(e.to_string()))
            })
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

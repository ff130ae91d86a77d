//! Placeholder bookkeeping and update-clause construction.
//!
//! Every attribute referenced by a generated expression goes through a `#name`
//! placeholder and every value through a `:name` placeholder, so reserved
//! words and unusual attribute names never reach the expression text.

use std::fmt::Write;

use crate::codec::{encode_value, TaggedValue};
use crate::error::{AccessError, Result};
use crate::storage::{ExpressionNames, ExpressionValues};
use crate::value::Value;

pub const DEFAULT_PARTITION_KEY: &str = "pkey";
pub const DEFAULT_SORT_KEY: &str = "skey";

/// Names of the key attributes a call works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNames {
    pub partition: String,
    pub sort: Option<String>,
}

impl Default for KeyNames {
    fn default() -> Self {
        Self {
            partition: DEFAULT_PARTITION_KEY.to_string(),
            sort: Some(DEFAULT_SORT_KEY.to_string()),
        }
    }
}

impl KeyNames {
    pub fn new(partition: impl Into<String>, sort: Option<String>) -> Self {
        Self {
            partition: partition.into(),
            sort,
        }
    }

    /// Whether `attribute` is one of the key attributes.
    pub fn is_key(&self, attribute: &str) -> bool {
        self.partition == attribute || self.sort.as_deref() == Some(attribute)
    }
}

impl From<crate::storage::KeySchema> for KeyNames {
    fn from(schema: crate::storage::KeySchema) -> Self {
        Self::new(schema.partition_key, schema.sort_key)
    }
}

/// A placeholder binding supplied alongside a condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionBinding {
    /// Binds `:placeholder` to a value.
    Value { placeholder: String, value: Value },
    /// Binds `#placeholder` to an attribute name.
    Name {
        placeholder: String,
        attribute: String,
    },
    /// Binds both `#token` and `:token` for an attribute.
    Attribute { name: String, value: Value },
}

impl ConditionBinding {
    pub fn value(placeholder: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Value {
            placeholder: placeholder.into(),
            value: value.into(),
        }
    }

    pub fn name(placeholder: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Name {
            placeholder: placeholder.into(),
            attribute: attribute.into(),
        }
    }

    pub fn attribute(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Reads the sigil form: `:x` binds a value, `#x` binds a name (the value
    /// if it is a string, otherwise `x` itself), anything else binds both.
    pub fn parse(token: &str, value: Value) -> Self {
        if token.starts_with(':') {
            Self::value(token, value)
        } else if let Some(bare) = token.strip_prefix('#') {
            let attribute = match value {
                Value::String(attribute) => attribute,
                _ => bare.to_string(),
            };
            Self::name(token, attribute)
        } else {
            Self::attribute(token, value)
        }
    }
}

const ESCAPED_PREFIX: &str = "x_";

fn is_plain(attribute: &str) -> bool {
    !attribute.is_empty()
        && attribute
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Placeholder token for an attribute name.
///
/// Names made of `[A-Za-z0-9_]` are used as they are. Anything else, and any
/// name that already starts with `x_`, is replaced by `x_` plus a hex
/// rendering of its bytes, so distinct names never share a token.
pub fn placeholder_token(attribute: &str) -> String {
    if is_plain(attribute) && !attribute.starts_with(ESCAPED_PREFIX) {
        return attribute.to_string();
    }

    let mut token = String::from(ESCAPED_PREFIX);
    for byte in attribute.as_bytes() {
        let _ = write!(token, "{byte:02x}");
    }
    token
}

/// Collects expression placeholders, refusing conflicting rebinding.
#[derive(Debug, Default)]
pub(crate) struct Placeholders {
    names: ExpressionNames,
    values: ExpressionValues,
}

impl Placeholders {
    pub(crate) fn bind_name(&mut self, placeholder: &str, attribute: &str) -> Result<()> {
        match self.names.get(placeholder) {
            Some(existing) if existing != attribute => Err(AccessError::InvalidRequest(format!(
                "Placeholder {placeholder} bound to both {existing} and {attribute}"
            ))),
            Some(_) => Ok(()),
            None => {
                self.names
                    .insert(placeholder.to_string(), attribute.to_string());
                Ok(())
            }
        }
    }

    pub(crate) fn bind_value(&mut self, placeholder: &str, value: TaggedValue) -> Result<()> {
        match self.values.get(placeholder) {
            Some(existing) if *existing != value => Err(AccessError::InvalidRequest(format!(
                "Placeholder {placeholder} bound to two different values"
            ))),
            Some(_) => Ok(()),
            None => {
                self.values.insert(placeholder.to_string(), value);
                Ok(())
            }
        }
    }

    /// Binds `#token` and `:token` for `attribute`, returning both.
    pub(crate) fn bind_attribute(
        &mut self,
        attribute: &str,
        value: TaggedValue,
    ) -> Result<(String, String)> {
        self.bind_attribute_as(&placeholder_token(attribute), attribute, value)
    }

    fn bind_attribute_as(
        &mut self,
        token: &str,
        attribute: &str,
        value: TaggedValue,
    ) -> Result<(String, String)> {
        let name = format!("#{token}");
        let value_placeholder = format!(":{token}");
        self.bind_name(&name, attribute)?;
        self.bind_value(&value_placeholder, value)?;
        Ok((name, value_placeholder))
    }

    pub(crate) fn apply(&mut self, binding: &ConditionBinding) -> Result<()> {
        match binding {
            ConditionBinding::Value { placeholder, value } => {
                self.bind_value(placeholder, encode_value(value)?)
            }
            ConditionBinding::Name {
                placeholder,
                attribute,
            } => self.bind_name(placeholder, attribute),
            // Caller-written expressions refer to plain names verbatim.
            ConditionBinding::Attribute { name, value } => {
                let token = if is_plain(name) {
                    name.clone()
                } else {
                    placeholder_token(name)
                };
                self.bind_attribute_as(&token, name, encode_value(value)?)
                    .map(|_| ())
            }
        }
    }

    /// Splits into request fields; empty maps become `None`.
    pub(crate) fn into_parts(self) -> (Option<ExpressionNames>, Option<ExpressionValues>) {
        let names = (!self.names.is_empty()).then_some(self.names);
        let values = (!self.values.is_empty()).then_some(self.values);
        (names, values)
    }
}

/// Joins SET assignments and REMOVE paths into one update expression.
pub(crate) fn update_expression(set: &[String], remove: &[String]) -> Option<String> {
    let mut clauses = Vec::new();
    if !set.is_empty() {
        clauses.push(format!("SET {}", set.join(", ")));
    }
    if !remove.is_empty() {
        clauses.push(format!("REMOVE {}", remove.join(", ")));
    }
    (!clauses.is_empty()).then(|| clauses.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_key_names() {
        let keys = KeyNames::default();
        assert!(keys.is_key("pkey"));
        assert!(keys.is_key("skey"));
        assert!(!keys.is_key("name"));
    }

    #[test]
    fn test_parse_sigil_bindings() {
        assert_eq!(
            ConditionBinding::parse(":min", Value::from(3)),
            ConditionBinding::value(":min", 3)
        );
        assert_eq!(
            ConditionBinding::parse("#s", Value::from("status")),
            ConditionBinding::name("#s", "status")
        );
        assert_eq!(
            ConditionBinding::parse("#status", Value::Null),
            ConditionBinding::name("#status", "status")
        );
        assert_eq!(
            ConditionBinding::parse("version", Value::from(2)),
            ConditionBinding::attribute("version", 2)
        );
    }

    #[test]
    fn test_placeholder_token() {
        assert_eq!(placeholder_token("first_name"), "first_name");
        assert_eq!(placeholder_token("a-b"), "x_612d62");
        assert_eq!(placeholder_token("a-b"), placeholder_token("a-b"));
    }

    #[test]
    fn test_placeholder_token_escapes_prefixed_names() {
        assert_eq!(placeholder_token("x_612d62"), "x_785f363132643632");
        assert_ne!(placeholder_token("x_612d62"), placeholder_token("a-b"));
        assert_eq!(placeholder_token("xray"), "xray");
    }

    #[test]
    fn test_attribute_binding_keeps_plain_prefixed_name() {
        let mut placeholders = Placeholders::default();
        placeholders
            .apply(&ConditionBinding::attribute("x_count", 1))
            .unwrap();

        let (names, _) = placeholders.into_parts();
        assert_eq!(names.unwrap()["#x_count"], "x_count");
    }

    #[test]
    fn test_attribute_binding_promotes_both_placeholders() {
        let mut placeholders = Placeholders::default();
        placeholders
            .apply(&ConditionBinding::attribute("version", 2))
            .unwrap();

        let (names, values) = placeholders.into_parts();
        assert_eq!(names.unwrap()["#version"], "version");
        assert_eq!(values.unwrap()[":version"], TaggedValue::N("2".to_string()));
    }

    #[test]
    fn test_conflicting_value_binding_rejected() {
        let mut placeholders = Placeholders::default();
        placeholders
            .bind_attribute("status", TaggedValue::S("new".to_string()))
            .unwrap();

        let err = placeholders
            .apply(&ConditionBinding::value(":status", "old"))
            .unwrap_err();
        assert!(matches!(err, AccessError::InvalidRequest(_)));

        // Rebinding the same value is fine.
        placeholders
            .apply(&ConditionBinding::value(":status", "new"))
            .unwrap();
    }

    #[test]
    fn test_empty_placeholders_are_not_sent() {
        assert_eq!(Placeholders::default().into_parts(), (None, None));
    }

    #[test]
    fn test_update_expression_clauses() {
        let set = vec!["#a = :a".to_string(), "#b = :b".to_string()];
        let remove = vec!["#c".to_string()];

        assert_eq!(
            update_expression(&set, &remove).as_deref(),
            Some("SET #a = :a, #b = :b REMOVE #c")
        );
        assert_eq!(update_expression(&[], &remove).as_deref(), Some("REMOVE #c"));
        assert_eq!(update_expression(&[], &[]), None);
    }
}

//! DynamoDB attribute conversion functions.
//!
//! Pure functions mapping between the SDK's `AttributeValue` and the tagged
//! values of `dynarec_core`. Testable without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use dynarec_core::codec::{AttributeMap, TaggedValue};
use dynarec_core::storage::{ReturnValues, StoreError, StoreResult};

/// Error code reported for attribute types the tagged form cannot hold.
pub const UNSUPPORTED_TYPE_CODE: &str = "UnsupportedAttributeType";

/// Convert a tagged value to a DynamoDB attribute.
pub fn to_attribute_value(value: &TaggedValue) -> AttributeValue {
    match value {
        TaggedValue::M(map) => AttributeValue::M(to_item(map)),
        TaggedValue::L(items) => AttributeValue::L(items.iter().map(to_attribute_value).collect()),
        TaggedValue::S(s) => AttributeValue::S(s.clone()),
        TaggedValue::B(bytes) => AttributeValue::B(Blob::new(bytes.clone())),
        TaggedValue::Bool(b) => AttributeValue::Bool(*b),
        TaggedValue::N(n) => AttributeValue::N(n.clone()),
        TaggedValue::Null(flag) => AttributeValue::Null(*flag),
    }
}

/// Convert a DynamoDB attribute to a tagged value.
///
/// Set types (`SS`, `NS`, `BS`) have no tagged counterpart and are rejected.
pub fn from_attribute_value(value: AttributeValue) -> StoreResult<TaggedValue> {
    match value {
        AttributeValue::M(map) => Ok(TaggedValue::M(from_item(map)?)),
        AttributeValue::L(items) => Ok(TaggedValue::L(
            items
                .into_iter()
                .map(from_attribute_value)
                .collect::<StoreResult<Vec<_>>>()?,
        )),
        AttributeValue::S(s) => Ok(TaggedValue::S(s)),
        AttributeValue::B(blob) => Ok(TaggedValue::B(blob.into_inner())),
        AttributeValue::Bool(b) => Ok(TaggedValue::Bool(b)),
        AttributeValue::N(n) => Ok(TaggedValue::N(n)),
        AttributeValue::Null(flag) => Ok(TaggedValue::Null(flag)),
        AttributeValue::Ss(_) | AttributeValue::Ns(_) | AttributeValue::Bs(_) => Err(
            StoreError::new(UNSUPPORTED_TYPE_CODE, "Set attribute types are not supported"),
        ),
        other => Err(StoreError::new(
            UNSUPPORTED_TYPE_CODE,
            format!("Unknown attribute type: {other:?}"),
        )),
    }
}

/// Convert an attribute map to a DynamoDB item.
pub fn to_item(map: &AttributeMap) -> HashMap<String, AttributeValue> {
    map.iter()
        .map(|(name, value)| (name.clone(), to_attribute_value(value)))
        .collect()
}

/// Convert a DynamoDB item to an attribute map.
pub fn from_item(item: HashMap<String, AttributeValue>) -> StoreResult<AttributeMap> {
    item.into_iter()
        .map(|(name, value)| from_attribute_value(value).map(|value| (name, value)))
        .collect()
}

pub fn to_return_value(return_values: ReturnValues) -> ReturnValue {
    match return_values {
        ReturnValues::None => ReturnValue::None,
        ReturnValues::AllOld => ReturnValue::AllOld,
        ReturnValues::UpdatedOld => ReturnValue::UpdatedOld,
        ReturnValues::AllNew => ReturnValue::AllNew,
        ReturnValues::UpdatedNew => ReturnValue::UpdatedNew,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> TaggedValue {
        TaggedValue::M(AttributeMap::from([
            (
                "tags".to_string(),
                TaggedValue::L(vec![
                    TaggedValue::S("a".to_string()),
                    TaggedValue::N("1.5".to_string()),
                ]),
            ),
            ("blob".to_string(), TaggedValue::B(vec![0, 1, 2])),
            ("flag".to_string(), TaggedValue::Bool(true)),
            ("none".to_string(), TaggedValue::Null(true)),
        ]))
    }

    #[test]
    fn test_nested_value_survives_sdk_conversion() {
        let attribute = to_attribute_value(&nested());
        assert_eq!(from_attribute_value(attribute).unwrap(), nested());
    }

    #[test]
    fn test_number_stays_a_string() {
        assert_eq!(
            to_attribute_value(&TaggedValue::N("42".to_string())),
            AttributeValue::N("42".to_string())
        );
    }

    #[test]
    fn test_sets_are_rejected() {
        let err = from_attribute_value(AttributeValue::Ss(vec!["a".to_string()])).unwrap_err();
        assert_eq!(err.code.as_deref(), Some(UNSUPPORTED_TYPE_CODE));
    }

    #[test]
    fn test_item_conversion() {
        let map = AttributeMap::from([
            ("pkey".to_string(), TaggedValue::S("a".to_string())),
            ("n".to_string(), TaggedValue::N("1".to_string())),
        ]);

        let item = to_item(&map);
        assert_eq!(item.get("pkey"), Some(&AttributeValue::S("a".to_string())));
        assert_eq!(from_item(item).unwrap(), map);
    }

    #[test]
    fn test_return_value_mapping() {
        assert_eq!(to_return_value(ReturnValues::AllOld), ReturnValue::AllOld);
        assert_eq!(to_return_value(ReturnValues::None), ReturnValue::None);
    }
}

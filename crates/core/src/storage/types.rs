//! Store request and response shapes.
//!
//! Every optional request field is an `Option`; `None` means the field is not
//! sent at all. Stores must never translate `None` into an explicit null.

use std::collections::BTreeMap;
use std::fmt;

use crate::codec::AttributeMap;

/// Placeholder name (`#name`) to attribute name.
pub type ExpressionNames = BTreeMap<String, String>;

/// Placeholder value (`:value`) to tagged value.
pub type ExpressionValues = AttributeMap;

/// Key attribute names of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub partition_key: String,
    pub sort_key: Option<String>,
}

impl KeySchema {
    pub fn new(partition_key: impl Into<String>, sort_key: Option<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key,
        }
    }
}

/// Which attributes a write returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnValues {
    None,
    AllOld,
    UpdatedOld,
    #[default]
    AllNew,
    UpdatedNew,
}

impl ReturnValues {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnValues::None => "NONE",
            ReturnValues::AllOld => "ALL_OLD",
            ReturnValues::UpdatedOld => "UPDATED_OLD",
            ReturnValues::AllNew => "ALL_NEW",
            ReturnValues::UpdatedNew => "UPDATED_NEW",
        }
    }
}

impl fmt::Display for ReturnValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReturnValues {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NONE" => Ok(ReturnValues::None),
            "ALL_OLD" => Ok(ReturnValues::AllOld),
            "UPDATED_OLD" => Ok(ReturnValues::UpdatedOld),
            "ALL_NEW" => Ok(ReturnValues::AllNew),
            "UPDATED_NEW" => Ok(ReturnValues::UpdatedNew),
            _ => Err(format!("Unknown return values mode: {s}")),
        }
    }
}

/// A key-condition query against a table or index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    pub limit: Option<i32>,
    pub consistent_read: Option<bool>,
    pub key_condition_expression: Option<String>,
    pub expression_attribute_names: Option<ExpressionNames>,
    pub expression_attribute_values: Option<ExpressionValues>,
    pub scan_index_forward: Option<bool>,
    pub exclusive_start_key: Option<AttributeMap>,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryOutput {
    pub items: Vec<AttributeMap>,
    pub last_evaluated_key: Option<AttributeMap>,
}

/// A single-item conditional update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateRequest {
    pub table_name: String,
    pub key: AttributeMap,
    pub update_expression: Option<String>,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<ExpressionNames>,
    pub expression_attribute_values: Option<ExpressionValues>,
    pub return_values: Option<ReturnValues>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateOutput {
    pub attributes: Option<AttributeMap>,
}

/// A single-item conditional delete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteRequest {
    pub table_name: String,
    pub key: AttributeMap,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: Option<ExpressionNames>,
    pub expression_attribute_values: Option<ExpressionValues>,
    pub return_values: Option<ReturnValues>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteOutput {
    pub attributes: Option<AttributeMap>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_values_strings() {
        assert_eq!(ReturnValues::AllNew.as_str(), "ALL_NEW");
        assert_eq!(ReturnValues::AllOld.to_string(), "ALL_OLD");
        assert_eq!(ReturnValues::default(), ReturnValues::AllNew);
    }

    #[test]
    fn test_return_values_parse() {
        assert_eq!("all_old".parse::<ReturnValues>(), Ok(ReturnValues::AllOld));
        assert_eq!("NONE".parse::<ReturnValues>(), Ok(ReturnValues::None));
        assert!("everything".parse::<ReturnValues>().is_err());
    }

    #[test]
    fn test_query_request_defaults_send_nothing() {
        let request = QueryRequest::default();
        assert!(request.index_name.is_none());
        assert!(request.exclusive_start_key.is_none());
        assert!(request.limit.is_none());
    }
}

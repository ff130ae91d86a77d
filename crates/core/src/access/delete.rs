use crate::codec::{encode_attribute_map, AttributeMap};
use crate::error::{AccessError, Result};
use crate::storage::{DeleteRequest, ReturnValues, TableStore};
use crate::value::{Record, Value};

use super::expression::{ConditionBinding, KeyNames, Placeholders};
use super::Item;

/// Parameters of a single-record delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteParams {
    pub table_name: String,
    pub partition_value: Value,
    pub sort_value: Option<Value>,
    pub key_names: KeyNames,
    pub condition_expression: Option<String>,
    pub condition_bindings: Vec<ConditionBinding>,
    pub decode: bool,
}

impl DeleteParams {
    pub fn new(table_name: impl Into<String>, partition_value: impl Into<Value>) -> Self {
        Self {
            table_name: table_name.into(),
            partition_value: partition_value.into(),
            sort_value: None,
            key_names: KeyNames::default(),
            condition_expression: None,
            condition_bindings: Vec::new(),
            decode: true,
        }
    }

    pub fn sort_value(mut self, value: impl Into<Value>) -> Self {
        self.sort_value = Some(value.into());
        self
    }

    pub fn key_names(mut self, key_names: KeyNames) -> Self {
        self.key_names = key_names;
        self
    }

    pub fn condition(
        mut self,
        expression: impl Into<String>,
        bindings: Vec<ConditionBinding>,
    ) -> Self {
        self.condition_expression = Some(expression.into());
        self.condition_bindings = bindings;
        self
    }

    pub fn raw(mut self) -> Self {
        self.decode = false;
        self
    }
}

/// Builds the delete request for `params`.
///
/// Empty condition strings and empty placeholder maps are left out of the
/// request. The old item is always requested back.
pub fn build_delete_request(params: &DeleteParams) -> Result<DeleteRequest> {
    let keys = &params.key_names;

    let mut key = Record::new();
    key.insert(keys.partition.clone(), params.partition_value.clone());
    if let Some(sort_value) = params.sort_value.as_ref().filter(|value| !value.is_null()) {
        let sort_key = keys.sort.as_ref().ok_or_else(|| {
            AccessError::InvalidRequest("A sort key value needs a sort key name".to_string())
        })?;
        key.insert(sort_key.clone(), sort_value.clone());
    }
    let key: AttributeMap = encode_attribute_map(&key)?;

    let mut placeholders = Placeholders::default();
    for binding in &params.condition_bindings {
        placeholders.apply(binding)?;
    }
    let (names, values) = placeholders.into_parts();

    let condition_expression = params
        .condition_expression
        .clone()
        .filter(|expression| !expression.is_empty());

    Ok(DeleteRequest {
        table_name: params.table_name.clone(),
        key,
        condition_expression,
        expression_attribute_names: names,
        expression_attribute_values: values,
        return_values: Some(ReturnValues::AllOld),
    })
}

/// Deletes one record and returns what was there, if anything.
pub async fn delete_rec<S: TableStore + ?Sized>(
    store: &S,
    params: &DeleteParams,
) -> Result<Option<Item>> {
    let request = build_delete_request(params)?;
    tracing::debug!(table = %request.table_name, "Deleting record");

    let output = store.delete_item(&request).await?;
    output
        .attributes
        .map(|attributes| Item::from_attributes(attributes, params.decode))
        .transpose()
}

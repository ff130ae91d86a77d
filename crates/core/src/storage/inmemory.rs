//! In-memory table store.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::codec::{AttributeMap, TaggedValue};

use super::expression::{compare, parse_condition, parse_update, Placeholders, UpdateAction};
use super::{
    DeleteOutput, DeleteRequest, ExpressionNames, ExpressionValues, KeySchema, QueryOutput,
    QueryRequest, ReturnValues, StoreError, StoreResult, TableStore, UpdateOutput, UpdateRequest,
};

/// A request as it reached the store, kept for inspection in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuedRequest {
    Query(QueryRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
    DescribeKeySchema(String),
}

#[derive(Debug, Clone)]
struct Table {
    schema: KeySchema,
    items: Vec<AttributeMap>,
}

/// In-memory storage backend for testing.
///
/// Tables live in a `HashMap` wrapped in `Arc<RwLock<_>>`; clones share the
/// same data. Queries are answered per partition in sort-key order, the
/// expression subset is the one the access layer generates plus simple
/// conditions. Errors can be injected to exercise retry paths.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    injected: Arc<Mutex<VecDeque<StoreError>>>,
    issued: Arc<Mutex<Vec<IssuedRequest>>>,
}

impl InMemoryStore {
    /// Creates a new store with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or replaces) an empty table.
    pub async fn create_table(&self, table_name: impl Into<String>, schema: KeySchema) {
        let mut tables = self.tables.write().await;
        tables.insert(
            table_name.into(),
            Table {
                schema,
                items: Vec::new(),
            },
        );
    }

    /// Inserts or replaces a whole item, bypassing expressions.
    pub async fn put_item(&self, table_name: &str, item: AttributeMap) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| StoreError::table_not_found(table_name))?;
        let key = key_of(&table.schema, &item)?;
        match table
            .items
            .iter()
            .position(|existing| same_key(&table.schema, existing, &key))
        {
            Some(index) => table.items[index] = item,
            None => table.items.push(item),
        }
        Ok(())
    }

    /// Fetches an item by key.
    pub async fn get_item(&self, table_name: &str, key: &AttributeMap) -> Option<AttributeMap> {
        let tables = self.tables.read().await;
        let table = tables.get(table_name)?;
        table
            .items
            .iter()
            .find(|item| same_key(&table.schema, item, key))
            .cloned()
    }

    /// Number of items stored in a table.
    pub async fn len(&self, table_name: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table_name).map_or(0, |table| table.items.len())
    }

    /// Makes the next store call fail with `error`. Queued errors are
    /// consumed in order, one per call of any [`TableStore`] method.
    pub async fn fail_next(&self, error: StoreError) {
        self.injected.lock().await.push_back(error);
    }

    /// Every request received so far, in order.
    pub async fn issued_requests(&self) -> Vec<IssuedRequest> {
        self.issued.lock().await.clone()
    }

    async fn record(&self, request: IssuedRequest) -> StoreResult<()> {
        self.issued.lock().await.push(request);
        match self.injected.lock().await.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TableStore for InMemoryStore {
    async fn query(&self, request: &QueryRequest) -> StoreResult<QueryOutput> {
        self.record(IssuedRequest::Query(request.clone())).await?;

        let tables = self.tables.read().await;
        let table = tables
            .get(&request.table_name)
            .ok_or_else(|| StoreError::table_not_found(&request.table_name))?;

        if let Some(index_name) = &request.index_name {
            return Err(StoreError::validation(format!(
                "The table does not have the specified index: {index_name}"
            )));
        }
        check_placeholder_maps(
            &request.expression_attribute_names,
            &request.expression_attribute_values,
        )?;

        let expression = request.key_condition_expression.as_deref().ok_or_else(|| {
            StoreError::validation(
                "Either the KeyConditions or KeyConditionExpression parameter must be specified",
            )
        })?;
        let condition = parse_condition(
            expression,
            Placeholders {
                names: request.expression_attribute_names.as_ref(),
                values: request.expression_attribute_values.as_ref(),
            },
        )?;

        let limit = match request.limit {
            Some(limit) if limit < 1 => {
                return Err(StoreError::validation(
                    "Limit must be greater than or equal to 1",
                ))
            }
            Some(limit) => limit as usize,
            None => usize::MAX,
        };

        let mut matching: Vec<&AttributeMap> = table
            .items
            .iter()
            .filter(|item| condition.eval(item))
            .collect();

        let sort_key = table.schema.sort_key.as_deref();
        if let Some(sort_key) = sort_key {
            matching.sort_by(|a, b| order_by(a.get(sort_key), b.get(sort_key)));
        }
        if request.scan_index_forward == Some(false) {
            matching.reverse();
        }

        let start = match &request.exclusive_start_key {
            None => 0,
            Some(start_key) => {
                key_of(&table.schema, start_key)?;
                match matching
                    .iter()
                    .position(|item| same_key(&table.schema, item, start_key))
                {
                    Some(index) => index + 1,
                    None => {
                        let forward = request.scan_index_forward != Some(false);
                        let start_sort = sort_key.and_then(|name| start_key.get(name));
                        matching
                            .iter()
                            .position(|item| {
                                let ordering =
                                    order_by(sort_key.and_then(|name| item.get(name)), start_sort);
                                if forward {
                                    ordering == Ordering::Greater
                                } else {
                                    ordering == Ordering::Less
                                }
                            })
                            .unwrap_or(matching.len())
                    }
                }
            }
        };

        let remaining = &matching[start.min(matching.len())..];
        let page: Vec<AttributeMap> = remaining.iter().take(limit).map(|item| (*item).clone()).collect();

        let last_evaluated_key = if remaining.len() > page.len() {
            page.last().map(|item| key_of(&table.schema, item)).transpose()?
        } else {
            None
        };

        Ok(QueryOutput {
            items: page,
            last_evaluated_key,
        })
    }

    async fn update_item(&self, request: &UpdateRequest) -> StoreResult<UpdateOutput> {
        self.record(IssuedRequest::Update(request.clone())).await?;

        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(&request.table_name)
            .ok_or_else(|| StoreError::table_not_found(&request.table_name))?;
        validate_key(&table.schema, &request.key)?;
        check_placeholder_maps(
            &request.expression_attribute_names,
            &request.expression_attribute_values,
        )?;

        let placeholders = Placeholders {
            names: request.expression_attribute_names.as_ref(),
            values: request.expression_attribute_values.as_ref(),
        };

        let position = table
            .items
            .iter()
            .position(|item| same_key(&table.schema, item, &request.key));
        let existing = position.map(|index| table.items[index].clone());

        if let Some(expression) = &request.condition_expression {
            let condition = parse_condition(expression, placeholders)?;
            if !condition.eval(existing.as_ref().unwrap_or(&AttributeMap::new())) {
                return Err(StoreError::conditional_check_failed());
            }
        }

        let actions = match &request.update_expression {
            Some(expression) => parse_update(expression, placeholders)?,
            None => Vec::new(),
        };

        let base = existing.clone().unwrap_or_else(|| request.key.clone());
        let mut updated = base.clone();
        let mut touched = Vec::new();
        for action in &actions {
            let name = match action {
                UpdateAction::Set(name, _) | UpdateAction::Remove(name) => name,
            };
            if is_key_attribute(&table.schema, name) {
                return Err(StoreError::validation(format!(
                    "Cannot update attribute {name}. This attribute is part of the key"
                )));
            }
            match action {
                UpdateAction::Set(name, operand) => {
                    let value = operand.resolve(&base).ok_or_else(|| {
                        StoreError::validation(
                            "The provided expression refers to an attribute that does not exist in the item",
                        )
                    })?;
                    updated.insert(name.clone(), value);
                }
                UpdateAction::Remove(name) => {
                    updated.remove(name);
                }
            }
            touched.push(name.clone());
        }

        match position {
            Some(index) => table.items[index] = updated.clone(),
            None => table.items.push(updated.clone()),
        }

        let attributes = match request.return_values.unwrap_or(ReturnValues::None) {
            ReturnValues::None => None,
            ReturnValues::AllNew => Some(updated),
            ReturnValues::AllOld => existing,
            ReturnValues::UpdatedNew => non_empty(only(&updated, &touched)),
            ReturnValues::UpdatedOld => existing.and_then(|old| non_empty(only(&old, &touched))),
        };

        Ok(UpdateOutput { attributes })
    }

    async fn delete_item(&self, request: &DeleteRequest) -> StoreResult<DeleteOutput> {
        self.record(IssuedRequest::Delete(request.clone())).await?;

        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(&request.table_name)
            .ok_or_else(|| StoreError::table_not_found(&request.table_name))?;
        validate_key(&table.schema, &request.key)?;
        check_placeholder_maps(
            &request.expression_attribute_names,
            &request.expression_attribute_values,
        )?;

        let return_values = request.return_values.unwrap_or(ReturnValues::None);
        if !matches!(return_values, ReturnValues::None | ReturnValues::AllOld) {
            return Err(StoreError::validation(format!(
                "Return values set to invalid value: {return_values}"
            )));
        }

        let position = table
            .items
            .iter()
            .position(|item| same_key(&table.schema, item, &request.key));

        if let Some(expression) = &request.condition_expression {
            let condition = parse_condition(
                expression,
                Placeholders {
                    names: request.expression_attribute_names.as_ref(),
                    values: request.expression_attribute_values.as_ref(),
                },
            )?;
            let current = position.map(|index| &table.items[index]);
            if !condition.eval(current.unwrap_or(&AttributeMap::new())) {
                return Err(StoreError::conditional_check_failed());
            }
        }

        let removed = position.map(|index| table.items.remove(index));
        let attributes = match return_values {
            ReturnValues::AllOld => removed,
            _ => None,
        };

        Ok(DeleteOutput { attributes })
    }

    async fn describe_key_schema(&self, table_name: &str) -> StoreResult<KeySchema> {
        self.record(IssuedRequest::DescribeKeySchema(table_name.to_string()))
            .await?;

        let tables = self.tables.read().await;
        tables
            .get(table_name)
            .map(|table| table.schema.clone())
            .ok_or_else(|| StoreError::table_not_found(table_name))
    }
}

fn is_key_attribute(schema: &KeySchema, name: &str) -> bool {
    schema.partition_key == name || schema.sort_key.as_deref() == Some(name)
}

/// Extract the key attributes of an item, validating their types.
fn key_of(schema: &KeySchema, item: &AttributeMap) -> StoreResult<AttributeMap> {
    let mut key = AttributeMap::new();
    let names = std::iter::once(schema.partition_key.as_str()).chain(schema.sort_key.as_deref());
    for name in names {
        let value = item.get(name).ok_or_else(|| {
            StoreError::validation(format!("Missing the key {name} in the item"))
        })?;
        if !matches!(
            value,
            TaggedValue::S(_) | TaggedValue::N(_) | TaggedValue::B(_)
        ) {
            return Err(StoreError::validation(format!(
                "Invalid attribute value type for key {name}: {}",
                value.tag()
            )));
        }
        key.insert(name.to_string(), value.clone());
    }
    Ok(key)
}

fn validate_key(schema: &KeySchema, key: &AttributeMap) -> StoreResult<()> {
    let extracted = key_of(schema, key)?;
    if extracted.len() != key.len() {
        return Err(StoreError::validation(
            "The provided key element does not match the schema",
        ));
    }
    Ok(())
}

fn same_key(schema: &KeySchema, item: &AttributeMap, key: &AttributeMap) -> bool {
    let names = std::iter::once(schema.partition_key.as_str()).chain(schema.sort_key.as_deref());
    names.into_iter().all(|name| match (item.get(name), key.get(name)) {
        (Some(a), Some(b)) => compare(a, b) == Some(Ordering::Equal),
        _ => false,
    })
}

fn order_by(a: Option<&TaggedValue>, b: Option<&TaggedValue>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare(a, b).unwrap_or(Ordering::Equal),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn check_placeholder_maps(
    names: &Option<ExpressionNames>,
    values: &Option<ExpressionValues>,
) -> StoreResult<()> {
    if names.as_ref().is_some_and(|names| names.is_empty()) {
        return Err(StoreError::validation(
            "ExpressionAttributeNames must not be empty",
        ));
    }
    if values.as_ref().is_some_and(|values| values.is_empty()) {
        return Err(StoreError::validation(
            "ExpressionAttributeValues must not be empty",
        ));
    }
    Ok(())
}

fn only(item: &AttributeMap, names: &[String]) -> AttributeMap {
    item.iter()
        .filter(|(name, _)| names.contains(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn non_empty(item: AttributeMap) -> Option<AttributeMap> {
    (!item.is_empty()).then_some(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str) -> TaggedValue {
        TaggedValue::S(value.to_string())
    }

    fn item(pkey: &str, skey: &str, extra: &[(&str, TaggedValue)]) -> AttributeMap {
        let mut item = AttributeMap::from([
            ("pkey".to_string(), s(pkey)),
            ("skey".to_string(), s(skey)),
        ]);
        for (k, v) in extra {
            item.insert(k.to_string(), v.clone());
        }
        item
    }

    async fn store_with_items() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .create_table("t", KeySchema::new("pkey", Some("skey".to_string())))
            .await;
        for skey in ["c", "a", "b"] {
            store.put_item("t", item("p", skey, &[])).await.unwrap();
        }
        store.put_item("t", item("other", "a", &[])).await.unwrap();
        store
    }

    fn partition_query(limit: Option<i32>) -> QueryRequest {
        QueryRequest {
            table_name: "t".to_string(),
            limit,
            key_condition_expression: Some("#pkey = :pkey".to_string()),
            expression_attribute_names: Some(ExpressionNames::from([(
                "#pkey".to_string(),
                "pkey".to_string(),
            )])),
            expression_attribute_values: Some(AttributeMap::from([(":pkey".to_string(), s("p"))])),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_sort_key() {
        let store = store_with_items().await;

        let output = store.query(&partition_query(None)).await.unwrap();

        let skeys: Vec<_> = output.items.iter().map(|i| i["skey"].clone()).collect();
        assert_eq!(skeys, vec![s("a"), s("b"), s("c")]);
        assert!(output.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_query_pages_with_start_key() {
        let store = store_with_items().await;

        let first = store.query(&partition_query(Some(2))).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let last_key = first.last_evaluated_key.clone().unwrap();
        assert_eq!(last_key["skey"], s("b"));

        let mut next = partition_query(Some(2));
        next.exclusive_start_key = Some(last_key);
        let second = store.query(&next).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0]["skey"], s("c"));
        assert!(second.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_query_descending() {
        let store = store_with_items().await;
        let mut request = partition_query(None);
        request.scan_index_forward = Some(false);

        let output = store.query(&request).await.unwrap();

        assert_eq!(output.items[0]["skey"], s("c"));
    }

    #[tokio::test]
    async fn test_query_unknown_table() {
        let store = InMemoryStore::new();
        let err = store.query(&partition_query(None)).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ResourceNotFoundException"));
    }

    #[tokio::test]
    async fn test_update_rejects_key_attribute() {
        let store = store_with_items().await;
        let request = UpdateRequest {
            table_name: "t".to_string(),
            key: item("p", "a", &[]),
            update_expression: Some("SET skey = :v".to_string()),
            expression_attribute_values: Some(AttributeMap::from([(":v".to_string(), s("z"))])),
            ..Default::default()
        };

        let err = store.update_item(&request).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ValidationException"));
    }

    #[tokio::test]
    async fn test_update_condition_failure() {
        let store = store_with_items().await;
        let request = UpdateRequest {
            table_name: "t".to_string(),
            key: item("p", "a", &[]),
            update_expression: Some("SET x = :v".to_string()),
            condition_expression: Some("attribute_not_exists(pkey)".to_string()),
            expression_attribute_values: Some(AttributeMap::from([(":v".to_string(), s("z"))])),
            ..Default::default()
        };

        let err = store.update_item(&request).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ConditionalCheckFailedException"));
    }

    #[tokio::test]
    async fn test_update_returns_updated_new() {
        let store = store_with_items().await;
        let request = UpdateRequest {
            table_name: "t".to_string(),
            key: item("p", "a", &[]),
            update_expression: Some("SET x = :v".to_string()),
            expression_attribute_values: Some(AttributeMap::from([(":v".to_string(), s("z"))])),
            return_values: Some(ReturnValues::UpdatedNew),
            ..Default::default()
        };

        let output = store.update_item(&request).await.unwrap();
        assert_eq!(
            output.attributes,
            Some(AttributeMap::from([("x".to_string(), s("z"))]))
        );
    }

    #[tokio::test]
    async fn test_empty_placeholder_maps_rejected() {
        let store = store_with_items().await;
        let request = DeleteRequest {
            table_name: "t".to_string(),
            key: item("p", "a", &[]),
            expression_attribute_names: Some(ExpressionNames::new()),
            ..Default::default()
        };

        let err = store.delete_item(&request).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ValidationException"));
    }

    #[tokio::test]
    async fn test_delete_returns_old_item() {
        let store = store_with_items().await;
        let request = DeleteRequest {
            table_name: "t".to_string(),
            key: item("p", "b", &[]),
            return_values: Some(ReturnValues::AllOld),
            ..Default::default()
        };

        let output = store.delete_item(&request).await.unwrap();

        assert_eq!(output.attributes, Some(item("p", "b", &[])));
        assert_eq!(store.len("t").await, 3);
    }

    #[tokio::test]
    async fn test_injected_errors_are_consumed_in_order() {
        let store = store_with_items().await;
        store
            .fail_next(StoreError::new("InternalServerError", "boom"))
            .await;

        let err = store.query(&partition_query(None)).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("InternalServerError"));
        assert!(store.query(&partition_query(None)).await.is_ok());
        assert_eq!(store.issued_requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_describe_key_schema_is_logged_and_can_fail() {
        let store = store_with_items().await;
        store
            .fail_next(StoreError::new("InternalServerError", "boom"))
            .await;

        assert!(store.describe_key_schema("t").await.is_err());
        let schema = store.describe_key_schema("t").await.unwrap();
        assert_eq!(schema.partition_key, "pkey");
        assert_eq!(
            store.issued_requests().await,
            vec![
                IssuedRequest::DescribeKeySchema("t".to_string()),
                IssuedRequest::DescribeKeySchema("t".to_string()),
            ]
        );
    }
}

//! DynamoDB table store.
//!
//! Implements `TableStore` from `dynarec_core::storage`. Optional request
//! fields go through the SDK's `set_*` builders so that `None` is never sent.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::KeyType;
use aws_sdk_dynamodb::Client;

use dynarec_core::storage::{
    DeleteOutput, DeleteRequest, KeySchema, QueryOutput, QueryRequest, StoreError, StoreResult,
    TableStore, UpdateOutput, UpdateRequest,
};

use super::conversions::{from_item, to_item, to_return_value};
use super::error::map_sdk_error;

/// DynamoDB-backed table store.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TableStore for DynamoDbStore {
    async fn query(&self, request: &QueryRequest) -> StoreResult<QueryOutput> {
        let result = self
            .client
            .query()
            .table_name(&request.table_name)
            .set_index_name(request.index_name.clone())
            .set_limit(request.limit)
            .set_consistent_read(request.consistent_read)
            .set_key_condition_expression(request.key_condition_expression.clone())
            .set_expression_attribute_names(
                request
                    .expression_attribute_names
                    .as_ref()
                    .map(|names| names.clone().into_iter().collect()),
            )
            .set_expression_attribute_values(
                request.expression_attribute_values.as_ref().map(to_item),
            )
            .set_scan_index_forward(request.scan_index_forward)
            .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(to_item))
            .send()
            .await
            .map_err(map_sdk_error)?;

        let items = result
            .items
            .unwrap_or_default()
            .into_iter()
            .map(from_item)
            .collect::<StoreResult<Vec<_>>>()?;
        let last_evaluated_key = result.last_evaluated_key.map(from_item).transpose()?;

        Ok(QueryOutput {
            items,
            last_evaluated_key,
        })
    }

    async fn update_item(&self, request: &UpdateRequest) -> StoreResult<UpdateOutput> {
        let result = self
            .client
            .update_item()
            .table_name(&request.table_name)
            .set_key(Some(to_item(&request.key)))
            .set_update_expression(request.update_expression.clone())
            .set_condition_expression(request.condition_expression.clone())
            .set_expression_attribute_names(
                request
                    .expression_attribute_names
                    .as_ref()
                    .map(|names| names.clone().into_iter().collect()),
            )
            .set_expression_attribute_values(
                request.expression_attribute_values.as_ref().map(to_item),
            )
            .set_return_values(request.return_values.map(to_return_value))
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(UpdateOutput {
            attributes: result.attributes.map(from_item).transpose()?,
        })
    }

    async fn delete_item(&self, request: &DeleteRequest) -> StoreResult<DeleteOutput> {
        let result = self
            .client
            .delete_item()
            .table_name(&request.table_name)
            .set_key(Some(to_item(&request.key)))
            .set_condition_expression(request.condition_expression.clone())
            .set_expression_attribute_names(
                request
                    .expression_attribute_names
                    .as_ref()
                    .map(|names| names.clone().into_iter().collect()),
            )
            .set_expression_attribute_values(
                request.expression_attribute_values.as_ref().map(to_item),
            )
            .set_return_values(request.return_values.map(to_return_value))
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(DeleteOutput {
            attributes: result.attributes.map(from_item).transpose()?,
        })
    }

    async fn describe_key_schema(&self, table_name: &str) -> StoreResult<KeySchema> {
        let result = self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let table = result
            .table()
            .ok_or_else(|| StoreError::table_not_found(table_name))?;
        let key_name = |key_type: KeyType| {
            table
                .key_schema()
                .iter()
                .find(|element| *element.key_type() == key_type)
                .map(|element| element.attribute_name().to_string())
        };

        let partition_key = key_name(KeyType::Hash).ok_or_else(|| {
            StoreError::without_code(format!("Table {table_name} has no HASH key"))
        })?;
        tracing::debug!(table = %table_name, partition_key = %partition_key, "Described table");

        Ok(KeySchema::new(partition_key, key_name(KeyType::Range)))
    }
}

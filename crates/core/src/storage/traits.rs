use async_trait::async_trait;

use super::{
    DeleteOutput, DeleteRequest, KeySchema, QueryOutput, QueryRequest, StoreResult, UpdateOutput,
    UpdateRequest,
};

/// A key/value table store with range keys.
///
/// Implementations issue exactly one store call per method and report failures
/// with the store's own error code; classification and retries happen above
/// this trait.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Runs a key-condition query and returns one page.
    async fn query(&self, request: &QueryRequest) -> StoreResult<QueryOutput>;

    /// Applies a conditional single-item update, creating the item if needed.
    async fn update_item(&self, request: &UpdateRequest) -> StoreResult<UpdateOutput>;

    /// Deletes a single item, optionally under a condition.
    async fn delete_item(&self, request: &DeleteRequest) -> StoreResult<DeleteOutput>;

    /// Looks up the partition and sort key names of a table.
    async fn describe_key_schema(&self, table_name: &str) -> StoreResult<KeySchema>;
}

//! Record access on top of a [`TableStore`].
//!
//! Free functions take the store explicitly; [`TableAccess`] bundles a store
//! with a retry policy and sleeper for callers that want a handle.

mod delete;
mod expression;
mod query;
mod upsert;
mod write;

use std::sync::Arc;

pub use delete::{build_delete_request, delete_rec, DeleteParams};
pub use expression::{
    placeholder_token, ConditionBinding, KeyNames, DEFAULT_PARTITION_KEY, DEFAULT_SORT_KEY,
};
pub use query::{build_query_request, get_rec, get_recs_and_token, QueryParams, DEFAULT_PAGE_SIZE};
pub use upsert::{build_update_request, upsert_rec, upsert_rec_robust, UpsertParams};
pub use write::{write_recs, WriteFailure, WriteReport};

use crate::codec::{decode_attribute_map, AttributeMap, TaggedValue};
use crate::cursor::Cursor;
use crate::error::Result;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::storage::TableStore;
use crate::value::{record_to_json, Record};

/// A single item, decoded or left in the tagged form.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Decoded(Record),
    Raw(AttributeMap),
}

impl Item {
    pub(crate) fn from_attributes(attributes: AttributeMap, decode: bool) -> Result<Self> {
        if decode {
            Ok(Item::Decoded(decode_attribute_map(&attributes)?))
        } else {
            Ok(Item::Raw(attributes))
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Item::Decoded(record) => Some(record),
            Item::Raw(_) => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Item::Decoded(record) => Some(record),
            Item::Raw(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Item::Decoded(record) => record_to_json(record),
            Item::Raw(attributes) => raw_to_json(attributes),
        }
    }
}

/// The items of one page.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordSet {
    Decoded(Vec<Record>),
    Raw(Vec<AttributeMap>),
}

impl RecordSet {
    pub(crate) fn from_items(items: Vec<AttributeMap>, decode: bool) -> Result<Self> {
        if decode {
            let records = items
                .iter()
                .map(decode_attribute_map)
                .collect::<Result<Vec<_>>>()?;
            Ok(RecordSet::Decoded(records))
        } else {
            Ok(RecordSet::Raw(items))
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RecordSet::Decoded(records) => records.len(),
            RecordSet::Raw(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the first item, if any.
    pub fn into_first(self) -> Option<Item> {
        match self {
            RecordSet::Decoded(records) => records.into_iter().next().map(Item::Decoded),
            RecordSet::Raw(items) => items.into_iter().next().map(Item::Raw),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RecordSet::Decoded(records) => records.iter().map(record_to_json).collect(),
            RecordSet::Raw(items) => items.iter().map(raw_to_json).collect(),
        }
    }
}

/// One page of query results and the cursor for the next, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: RecordSet,
    pub cursor: Option<Cursor>,
}

fn raw_to_json(attributes: &AttributeMap) -> serde_json::Value {
    attributes
        .iter()
        .map(|(name, value)| (name.clone(), TaggedValue::to_json(value)))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

/// A store bundled with the retry settings used by robust writes.
#[derive(Clone)]
pub struct TableAccess<S: TableStore> {
    store: S,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl<S: TableStore> TableAccess<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn get_recs_and_token(&self, params: &QueryParams) -> Result<Page> {
        get_recs_and_token(&self.store, params).await
    }

    pub async fn get_rec(&self, params: &QueryParams) -> Result<Option<Item>> {
        get_rec(&self.store, params).await
    }

    pub async fn upsert_rec(&self, params: &UpsertParams) -> Result<Option<Item>> {
        upsert_rec(&self.store, params).await
    }

    pub async fn upsert_rec_robust(&self, params: &UpsertParams) -> Result<Option<Item>> {
        upsert_rec_robust(&self.store, params, &self.policy, self.sleeper.as_ref()).await
    }

    pub async fn delete_rec(&self, params: &DeleteParams) -> Result<Option<Item>> {
        delete_rec(&self.store, params).await
    }

    pub async fn write_recs(&self, table_name: &str, items: &[Record]) -> Result<WriteReport> {
        write_recs(
            &self.store,
            table_name,
            items,
            &self.policy,
            self.sleeper.as_ref(),
        )
        .await
    }
}

impl<S: TableStore + std::fmt::Debug> std::fmt::Debug for TableAccess<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableAccess")
            .field("store", &self.store)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

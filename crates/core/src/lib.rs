//! Record access for DynamoDB-style tables.
//!
//! Pure building blocks: the native [`value::Value`] model, the tagged wire
//! [`codec`], opaque pagination [`cursor`]s, the [`storage::TableStore`]
//! seam with an in-memory implementation, and the [`access`] operations on
//! top of them.

pub mod access;
pub mod codec;
pub mod cursor;
pub mod error;
pub mod retry;
pub mod storage;
pub mod value;

pub use access::{
    delete_rec, get_rec, get_recs_and_token, upsert_rec, upsert_rec_robust, write_recs,
    ConditionBinding, DeleteParams, Item, KeyNames, Page, QueryParams, RecordSet, TableAccess,
    UpsertParams, WriteFailure, WriteReport,
};
pub use codec::{AttributeMap, TaggedValue};
pub use cursor::Cursor;
pub use error::{AccessError, Result};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use value::{Number, Record, Value};

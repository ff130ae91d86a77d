mod error;
mod expression;
mod inmemory;
mod traits;
mod types;

pub use error::{StoreError, StoreResult};
pub use inmemory::{InMemoryStore, IssuedRequest};
pub use traits::TableStore;
pub use types::{
    DeleteOutput, DeleteRequest, ExpressionNames, ExpressionValues, KeySchema, QueryOutput,
    QueryRequest, ReturnValues, UpdateOutput, UpdateRequest,
};

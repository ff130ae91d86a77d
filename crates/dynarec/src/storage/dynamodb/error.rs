//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StoreError` from `dynarec_core::storage`, keeping
//! the service error code so the access layer can tell transient failures
//! apart.

use std::error::Error;
use std::fmt::Debug;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use dynarec_core::storage::StoreError;

/// Map any SDK operation error to a `StoreError`.
///
/// Service errors keep their code (`ConditionalCheckFailedException`,
/// `RequestLimitExceeded`, ...). Dispatch, timeout and response errors carry
/// no code.
pub fn map_sdk_error<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    match err.code() {
        Some(code) => {
            let message = err
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
            StoreError::new(code, message)
        }
        None => StoreError::without_code(DisplayErrorContext(&err).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::error::ErrorMetadata;
    use aws_sdk_dynamodb::operation::update_item::UpdateItemError;

    fn service_error(code: &str, message: &str) -> SdkError<UpdateItemError, ()> {
        let meta = ErrorMetadata::builder().code(code).message(message).build();
        SdkError::service_error(UpdateItemError::generic(meta), ())
    }

    #[test]
    fn test_service_error_keeps_code() {
        let err = map_sdk_error(service_error(
            "ConditionalCheckFailedException",
            "The conditional request failed",
        ));

        assert_eq!(err.code.as_deref(), Some("ConditionalCheckFailedException"));
        assert_eq!(err.message, "The conditional request failed");
    }

    #[test]
    fn test_throttling_is_transient_after_classification() {
        let err = map_sdk_error(service_error("RequestLimitExceeded", "Too many requests"));
        assert!(dynarec_core::retry::classify(err).is_transient());
    }

    #[test]
    fn test_timeout_has_no_code() {
        let err: SdkError<UpdateItemError, ()> = SdkError::timeout_error("deadline elapsed");
        let err = map_sdk_error(err);
        assert!(err.code.is_none());
    }
}

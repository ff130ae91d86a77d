use thiserror::Error;

/// A failure reported by a table store.
///
/// `code` carries the store's machine-readable error code when it has one
/// (`ConditionalCheckFailedException`, `RequestLimitExceeded`, ...).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreError {
    pub code: Option<String>,
    pub message: String,
}

impl StoreError {
    /// Creates an error with a store error code.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Creates an error the store did not attach a code to.
    pub fn without_code(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("ValidationException", message)
    }

    pub fn conditional_check_failed() -> Self {
        Self::new(
            "ConditionalCheckFailedException",
            "The conditional request failed",
        )
    }

    pub fn table_not_found(table_name: &str) -> Self {
        Self::new(
            "ResourceNotFoundException",
            format!("Requested resource not found: Table: {table_name} not found"),
        )
    }
}

/// Result type for store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let error = StoreError::new("RequestLimitExceeded", "Too many requests");
        assert_eq!(error.to_string(), "Too many requests");
        assert_eq!(error.code.as_deref(), Some("RequestLimitExceeded"));
    }

    #[test]
    fn test_table_not_found() {
        let error = StoreError::table_not_found("orders");
        assert_eq!(error.code.as_deref(), Some("ResourceNotFoundException"));
        assert!(error.message.contains("orders"));
    }
}

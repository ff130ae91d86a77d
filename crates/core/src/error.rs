use thiserror::Error;

use crate::storage::StoreError;

/// Errors that can occur while encoding values or accessing a table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Unsupported type for encoding: {0}")]
    EncodingType(String),
    #[error("Improper format: {0}")]
    Format(String),
    #[error("Invalid number: {0:?}")]
    NumberParse(String),
    #[error("Bad cursor: {0}")]
    BadCursor(String),
    #[error("Transient store error {code}: {message}")]
    TransientStore { code: String, message: String },
    #[error("Store error {}: {message}", code.as_deref().unwrap_or("Unknown"))]
    Store {
        code: Option<String>,
        message: String,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AccessError {
    /// The error code reported by the store, if this error came from it.
    pub fn code(&self) -> Option<&str> {
        match self {
            AccessError::TransientStore { code, .. } => Some(code),
            AccessError::Store { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether the error is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, AccessError::TransientStore { .. })
    }
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        crate::retry::classify(err)
    }
}

/// Result type for codec and access operations.
pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_display() {
        let error = AccessError::Format("One key expected, but got 2".to_string());
        assert_eq!(
            error.to_string(),
            "Improper format: One key expected, but got 2"
        );
    }

    #[test]
    fn test_number_parse_error_display() {
        let error = AccessError::NumberParse("abc".to_string());
        assert_eq!(error.to_string(), "Invalid number: \"abc\"");
    }

    #[test]
    fn test_store_error_display_without_code() {
        let error = AccessError::Store {
            code: None,
            message: "dispatch failure".to_string(),
        };
        assert_eq!(error.to_string(), "Store error Unknown: dispatch failure");
        assert_eq!(error.code(), None);
    }

    #[test]
    fn test_transient_error_carries_code() {
        let error = AccessError::TransientStore {
            code: "RequestLimitExceeded".to_string(),
            message: "slow down".to_string(),
        };
        assert!(error.is_transient());
        assert_eq!(error.code(), Some("RequestLimitExceeded"));
    }
}

use std::{env, time::Duration};

use dynarec_core::access::DEFAULT_PAGE_SIZE;
use dynarec_core::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Custom endpoint URL, for local DynamoDB (default: none)
    pub endpoint_url: Option<String>,
    /// AWS region (default: "us-east-1")
    pub region: String,
    /// Query page size (default: 20)
    pub page_size: i32,
    /// Wait between retries of transient errors, in milliseconds (default: 300)
    pub retry_interval_ms: u64,
    /// Attempts before giving up on a transient error (default: 100)
    pub retry_max_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AWS_ENDPOINT_URL` - Custom DynamoDB endpoint
    /// - `AWS_REGION` - AWS region (default: "us-east-1")
    /// - `DYNAREC_PAGE_SIZE` - Query page size (default: 20)
    /// - `DYNAREC_RETRY_INTERVAL_MS` - Retry interval in ms (default: 300)
    /// - `DYNAREC_RETRY_MAX_ATTEMPTS` - Retry attempt cap (default: 100)
    pub fn from_env() -> Self {
        Self {
            endpoint_url: env::var("AWS_ENDPOINT_URL").ok(),
            region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            page_size: env::var("DYNAREC_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PAGE_SIZE),
            retry_interval_ms: env::var("DYNAREC_RETRY_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            retry_max_attempts: env::var("DYNAREC_RETRY_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
        }
    }

    /// Get the retry settings as a policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.retry_interval_ms),
            self.retry_max_attempts,
        )
    }

    /// Returns a display string for the target environment.
    pub fn target_display(&self) -> String {
        match &self.endpoint_url {
            Some(url) => format!("Local DynamoDB ({})", url),
            None => format!("AWS DynamoDB (region: {})", self.region),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

//! Retry policy for transient store errors.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AccessError, Result};
use crate::storage::{StoreError, StoreResult};

/// Store error codes worth retrying.
pub const TRANSIENT_ERROR_CODES: [&str; 3] = [
    "RequestLimitExceeded",
    "InternalServerError",
    "TransactionConflictException",
];

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(300);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

/// Sorts a store failure into transient or permanent.
pub fn classify(err: StoreError) -> AccessError {
    match err.code {
        Some(code) if TRANSIENT_ERROR_CODES.contains(&code.as_str()) => {
            AccessError::TransientStore {
                code,
                message: err.message,
            }
        }
        code => AccessError::Store {
            code,
            message: err.message,
        },
    }
}

/// Waits between retry attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed-interval retry with an attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RETRY_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Never retries.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, 1)
    }

    /// Runs `operation` until it succeeds, fails permanently, or the attempt
    /// cap is reached. On exhaustion the last transient error is returned.
    pub async fn run<T, F, Fut>(&self, sleeper: &dyn Sleeper, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = StoreResult<T>> + Send,
    {
        let mut attempt = 1;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => classify(err),
            };

            if !err.is_transient() || attempt >= self.max_attempts {
                return Err(err);
            }

            tracing::warn!(
                code = err.code().unwrap_or_default(),
                attempt,
                max_attempts = self.max_attempts,
                "Transient store error, retrying in {:?}",
                self.interval
            );
            sleeper.sleep(self.interval).await;
            attempt += 1;
        }
    }
}

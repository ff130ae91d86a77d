use crate::error::{AccessError, Result};
use crate::retry::{RetryPolicy, Sleeper};
use crate::storage::{ReturnValues, TableStore};
use crate::value::Record;

use super::expression::KeyNames;
use super::upsert::{upsert_rec_robust, UpsertParams};

/// A record that could not be written.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteFailure {
    /// Position of the record in the input.
    pub index: usize,
    pub error: AccessError,
    /// Percentage of the batch reached when the failure happened.
    pub progress: u32,
}

/// Outcome of a batch write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteReport {
    pub written: usize,
    pub failures: Vec<WriteFailure>,
}

impl WriteReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

fn progress(index: usize, total: usize) -> u32 {
    (100 * (index + 1) / (total + 1)) as u32
}

/// Upserts each record in turn, using the table's own key names.
///
/// A failing record is reported and the remaining records are still written.
/// Only a failure to look up the key schema aborts the batch.
pub async fn write_recs<S: TableStore + ?Sized>(
    store: &S,
    table_name: &str,
    items: &[Record],
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
) -> Result<WriteReport> {
    let mut report = WriteReport::default();
    if items.is_empty() {
        tracing::info!(table = %table_name, "No records to write");
        return Ok(report);
    }

    let key_names = KeyNames::from(store.describe_key_schema(table_name).await?);
    tracing::debug!(
        table = %table_name,
        partition_key = %key_names.partition,
        sort_key = key_names.sort.as_deref().unwrap_or_default(),
        "Resolved key schema"
    );

    for (index, item) in items.iter().enumerate() {
        let params = UpsertParams::new(table_name, item.clone())
            .key_names(key_names.clone())
            .return_values(ReturnValues::None);

        match upsert_rec_robust(store, &params, policy, sleeper).await {
            Ok(_) => report.written += 1,
            Err(error) => {
                let progress = progress(index, items.len());
                tracing::error!(table = %table_name, index, progress, "Error writing record: {error}");
                report.failures.push(WriteFailure {
                    index,
                    error,
                    progress,
                });
            }
        }
    }

    if report.is_success() {
        tracing::info!(table = %table_name, "Wrote {} records", report.written);
    } else {
        tracing::warn!(
            table = %table_name,
            written = report.written,
            failed = report.failures.len(),
            "Batch write finished with failures"
        );
    }

    Ok(report)
}

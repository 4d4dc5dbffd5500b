//! Batched, conflict-ignoring table loads
//!
//! One call loads one record type into its table. Records are split into
//! fixed-size batches, each inserted atomically by the warehouse store. The
//! first failing batch aborts the load and is reported as
//! [`MeridianError::BatchInsert`]; batches before it stay committed.

use crate::adapters::database::WarehouseStore;
use crate::domain::{MeridianError, Result, TableRecord};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of loading one table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadResult {
    /// Records handed to the loader
    pub attempted: u64,
    /// Rows actually written
    pub inserted: u64,
    /// Rows skipped because their primary key already existed
    pub duplicates_ignored: u64,
    /// Number of batches sent
    pub batches: usize,
}

/// Loads records into the warehouse in batches
pub struct BatchLoader {
    store: Arc<dyn WarehouseStore>,
    batch_size: usize,
}

impl BatchLoader {
    /// Create a loader; a zero batch size is treated as one
    pub fn new(store: Arc<dyn WarehouseStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Insert `records` into `R::TABLE`
    ///
    /// # Errors
    ///
    /// Returns [`MeridianError::BatchInsert`] naming the table and failing batch.
    pub async fn load<R: TableRecord>(&self, records: &[R]) -> Result<LoadResult> {
        let table = R::TABLE;
        let mut result = LoadResult {
            attempted: records.len() as u64,
            ..LoadResult::default()
        };

        if records.is_empty() {
            tracing::debug!(table = %table, "No records to load");
            return Ok(result);
        }

        let total_batches = records.len().div_ceil(self.batch_size);
        for (index, chunk) in records.chunks(self.batch_size).enumerate() {
            let batch = index + 1;
            let rows = chunk.iter().map(TableRecord::to_values).collect();

            let outcome = self
                .store
                .insert_batch(table, R::COLUMNS, rows)
                .await
                .map_err(|e| {
                    crate::log_error_with_context!(&e, "Batch insert failed");
                    MeridianError::BatchInsert {
                        table: table.to_string(),
                        batch,
                        total: total_batches,
                        message: e.to_string(),
                    }
                })?;

            result.inserted += outcome.inserted;
            result.duplicates_ignored += outcome.duplicates_ignored;
            result.batches = batch;
            crate::log_batch_progress!(table, batch, total_batches, chunk.len());
        }

        tracing::info!(
            table = %table,
            attempted = result.attempted,
            inserted = result.inserted,
            duplicates_ignored = result.duplicates_ignored,
            batches = result.batches,
            "Table load complete"
        );
        Ok(result)
    }
}

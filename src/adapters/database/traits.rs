//! Warehouse storage abstraction
//!
//! Every component that touches the warehouse receives an explicit
//! `Arc<dyn WarehouseStore>`; there is no process-wide storage handle.

use crate::domain::{EncounterId, PatientId, Result, SqlValue, Table};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of inserting one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchInsertOutcome {
    /// Rows actually written
    pub inserted: u64,

    /// Rows skipped because their primary key already existed
    pub duplicates_ignored: u64,
}

/// A persisted encounter reduced to its reconciliation key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncounterIndexEntry {
    pub encounter_id: EncounterId,
    pub patient_id: PatientId,
    pub encounter_date: NaiveDate,
}

/// Tabular result of an analytical query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Storage operations required by the pipeline
#[async_trait]
pub trait WarehouseStore: Send + Sync {
    /// Short backend name for logs and reports
    fn backend_name(&self) -> &'static str;

    /// Test the storage connection
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::MeridianError::Connection`] if storage is unreachable.
    async fn test_connection(&self) -> Result<()>;

    /// Create tables and the integrity function if they do not exist
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert one batch into `table`, ignoring rows whose primary key exists
    ///
    /// The batch is atomic: on error nothing from it is persisted.
    ///
    /// # Arguments
    ///
    /// * `table` - Target table
    /// * `columns` - Column names shared by every row
    /// * `rows` - Values in `columns` order
    async fn insert_batch(
        &self,
        table: Table,
        columns: &[&str],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<BatchInsertOutcome>;

    /// All persisted encounters keyed by calendar date, in a deterministic order
    async fn encounter_index(&self) -> Result<Vec<EncounterIndexEntry>>;

    /// Run the referential integrity check: orphan count per table
    ///
    /// An empty map means the check produced no result at all.
    async fn referential_integrity(&self) -> Result<BTreeMap<String, i64>>;

    /// Row count per warehouse table
    async fn table_stats(&self) -> Result<BTreeMap<String, i64>>;

    /// Execute a read-only analytical query
    async fn run_query(&self, sql: &str) -> Result<QueryResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_result_row_count() {
        let result = QueryResult {
            columns: vec!["n".to_string()],
            rows: vec![vec![serde_json::json!(1)], vec![serde_json::json!(2)]],
        };
        assert_eq!(result.row_count(), 2);
    }
}

//! PostgreSQL adapter implementing [`WarehouseStore`]

use crate::adapters::database::traits::{
    BatchInsertOutcome, EncounterIndexEntry, QueryResult, WarehouseStore,
};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{cell_to_json, insert_statement, param_refs, to_params};
use crate::domain::{EncounterId, MeridianError, PatientId, Result, SqlValue, Table};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

const ENCOUNTER_INDEX_SQL: &str = "SELECT encounter_id, patient_id, encounter_date::date \
     FROM encounters WHERE encounter_date IS NOT NULL \
     ORDER BY encounter_date, encounter_id";

const INTEGRITY_SQL: &str =
    "SELECT table_name::text, issue_count::bigint FROM check_referential_integrity()";

const LIST_TABLES_SQL: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = 'public' AND table_type = 'BASE TABLE' ORDER BY table_name";

/// PostgreSQL implementation of the warehouse store
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

fn db_error(context: &str, e: tokio_postgres::Error) -> MeridianError {
    MeridianError::Database(format!("{context}: {e}"))
}

#[async_trait]
impl WarehouseStore for PostgreSQLAdapter {
    fn backend_name(&self) -> &'static str {
        "postgresql"
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_schema().await
    }

    async fn insert_batch(
        &self,
        table: Table,
        columns: &[&str],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<BatchInsertOutcome> {
        if rows.is_empty() {
            return Ok(BatchInsertOutcome::default());
        }

        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let statement = tx
            .prepare(&insert_statement(table, columns))
            .await
            .map_err(|e| db_error("Failed to prepare insert", e))?;

        let mut inserted = 0u64;
        for row in &rows {
            if row.len() != columns.len() {
                return Err(MeridianError::Validation(format!(
                    "Row has {} values but {} columns were given for '{}'",
                    row.len(),
                    columns.len(),
                    table
                )));
            }
            let params = to_params(row);
            inserted += tx
                .execute(&statement, &param_refs(&params))
                .await
                .map_err(|e| db_error("Insert failed", e))?;
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit batch", e))?;

        let total = rows.len() as u64;
        Ok(BatchInsertOutcome {
            inserted,
            duplicates_ignored: total.saturating_sub(inserted),
        })
    }

    async fn encounter_index(&self) -> Result<Vec<EncounterIndexEntry>> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(ENCOUNTER_INDEX_SQL, &[])
            .await
            .map_err(|e| db_error("Failed to read encounters", e))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let encounter_id: String = row
                .try_get(0)
                .map_err(|e| db_error("Invalid encounter_id", e))?;
            let patient_id: Option<String> = row
                .try_get(1)
                .map_err(|e| db_error("Invalid patient_id", e))?;
            let encounter_date: NaiveDate = row
                .try_get(2)
                .map_err(|e| db_error("Invalid encounter_date", e))?;

            let (Some(encounter_id), Some(patient_id)) = (
                EncounterId::new(encounter_id).ok(),
                patient_id.and_then(|p| PatientId::new(p).ok()),
            ) else {
                continue;
            };

            entries.push(EncounterIndexEntry {
                encounter_id,
                patient_id,
                encounter_date,
            });
        }

        tracing::debug!(count = entries.len(), "Read persisted encounter index");
        Ok(entries)
    }

    async fn referential_integrity(&self) -> Result<BTreeMap<String, i64>> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(INTEGRITY_SQL, &[])
            .await
            .map_err(|e| MeridianError::Integrity(format!("Integrity check failed: {e}")))?;

        let mut issues = BTreeMap::new();
        for row in rows {
            let table: String = row
                .try_get(0)
                .map_err(|e| db_error("Invalid integrity row", e))?;
            let count: i64 = row
                .try_get(1)
                .map_err(|e| db_error("Invalid integrity row", e))?;
            issues.insert(table, count);
        }
        Ok(issues)
    }

    async fn table_stats(&self) -> Result<BTreeMap<String, i64>> {
        let conn = self.client.get_connection().await?;
        let tables = conn
            .query(LIST_TABLES_SQL, &[])
            .await
            .map_err(|e| db_error("Failed to list tables", e))?;

        let mut stats = BTreeMap::new();
        for row in tables {
            let name: String = row
                .try_get(0)
                .map_err(|e| db_error("Invalid table name", e))?;
            let count_sql = format!("SELECT COUNT(*) FROM \"{}\"", name.replace('"', "\"\""));
            let count: i64 = conn
                .query_one(&count_sql, &[])
                .await
                .and_then(|r| r.try_get(0))
                .map_err(|e| db_error(&format!("Failed to count '{name}'"), e))?;
            stats.insert(name, count);
        }
        Ok(stats)
    }

    async fn run_query(&self, sql: &str) -> Result<QueryResult> {
        let conn = self.client.get_connection().await?;
        let statement = conn
            .prepare(sql)
            .await
            .map_err(|e| MeridianError::Query(e.to_string()))?;

        let columns = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect::<Vec<_>>();

        let rows = conn
            .query(&statement, &[])
            .await
            .map_err(|e| MeridianError::Query(e.to_string()))?;

        let rows = rows
            .iter()
            .map(|row| (0..columns.len()).map(|i| cell_to_json(row, i)).collect())
            .collect();

        Ok(QueryResult { columns, rows })
    }
}

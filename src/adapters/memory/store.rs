//! In-memory warehouse store
//!
//! Keeps every table as an ordered list of rows behind one mutex. Primary
//! keys are enforced with ignore-on-conflict semantics. `NOT NULL` columns
//! present in a batch and foreign keys are checked per batch, the latter
//! unless disabled, mirroring the PostgreSQL constraints.

use crate::adapters::database::traits::{
    BatchInsertOutcome, EncounterIndexEntry, QueryResult, WarehouseStore,
};
use crate::domain::{EncounterId, MeridianError, PatientId, Result, SqlValue, Table};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct TableData {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    keys: HashSet<String>,
}

impl TableData {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn text_at<'a>(&self, row: &'a [SqlValue], column: &str) -> Option<&'a str> {
        self.column_index(column)
            .and_then(|i| row.get(i))
            .and_then(SqlValue::as_text)
    }
}

/// Warehouse backend used for dry runs and tests
pub struct MemoryStore {
    tables: Mutex<HashMap<Table, TableData>>,
    enforce_foreign_keys: bool,
    integrity_available: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            enforce_foreign_keys: true,
            integrity_available: true,
        }
    }

    /// Accept rows whose foreign keys do not resolve
    pub fn without_foreign_keys(mut self) -> Self {
        self.enforce_foreign_keys = false;
        self
    }

    /// Make the integrity check return an empty result, as when the stored
    /// function is missing
    pub fn without_integrity_check(mut self) -> Self {
        self.integrity_available = false;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Table, TableData>>> {
        self.tables
            .lock()
            .map_err(|_| MeridianError::Database("In-memory store lock poisoned".to_string()))
    }

    /// Number of rows stored in `table`
    pub fn row_count(&self, table: Table) -> usize {
        self.lock()
            .map(|t| t.get(&table).map_or(0, |d| d.rows.len()))
            .unwrap_or(0)
    }

    /// Rows of `table` as column-name maps, in insertion order
    pub fn rows(&self, table: Table) -> Vec<BTreeMap<String, SqlValue>> {
        let Ok(tables) = self.lock() else {
            return Vec::new();
        };
        let Some(data) = tables.get(&table) else {
            return Vec::new();
        };
        data.rows
            .iter()
            .map(|row| {
                data.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    fn orphan_count(tables: &HashMap<Table, TableData>, table: Table) -> i64 {
        let Some(data) = tables.get(&table) else {
            return 0;
        };
        data.rows
            .iter()
            .filter(|row| {
                table.foreign_keys().iter().any(|(column, parent)| {
                    data.text_at(row, column).is_some_and(|value| {
                        !tables
                            .get(parent)
                            .is_some_and(|p| p.keys.contains(value))
                    })
                })
            })
            .count() as i64
    }
}

#[async_trait]
impl WarehouseStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn test_connection(&self) -> Result<()> {
        self.lock().map(|_| ())
    }

    async fn ensure_schema(&self) -> Result<()> {
        let mut tables = self.lock()?;
        for table in Table::LOAD_ORDER {
            tables.entry(table).or_default();
        }
        Ok(())
    }

    async fn insert_batch(
        &self,
        table: Table,
        columns: &[&str],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<BatchInsertOutcome> {
        let mut tables = self.lock()?;

        let pk_index = columns
            .iter()
            .position(|c| *c == table.primary_key())
            .ok_or_else(|| {
                MeridianError::Validation(format!(
                    "Primary key column '{}' missing for '{}'",
                    table.primary_key(),
                    table
                ))
            })?;

        // Validate the whole batch before touching storage
        let submitted = rows.len() as u64;
        let mut batch_keys = HashSet::new();
        let mut accepted = Vec::with_capacity(rows.len());
        let existing = tables.get(&table);
        for row in rows {
            if row.len() != columns.len() {
                return Err(MeridianError::Validation(format!(
                    "Row has {} values but {} columns were given for '{}'",
                    row.len(),
                    columns.len(),
                    table
                )));
            }
            let key = row[pk_index].as_text().map(str::to_string).ok_or_else(|| {
                MeridianError::Database(format!(
                    "null value in column \"{}\" of relation \"{}\"",
                    table.primary_key(),
                    table
                ))
            })?;

            for column in table.required_columns() {
                let is_null = columns
                    .iter()
                    .position(|c| c == column)
                    .is_some_and(|i| row[i].is_null());
                if is_null {
                    return Err(MeridianError::Database(format!(
                        "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                        column, table
                    )));
                }
            }

            if self.enforce_foreign_keys {
                for (column, parent) in table.foreign_keys() {
                    let Some(value) = columns
                        .iter()
                        .position(|c| c == column)
                        .and_then(|i| row[i].as_text())
                    else {
                        continue;
                    };
                    let resolves = tables.get(parent).is_some_and(|p| p.keys.contains(value));
                    if !resolves {
                        return Err(MeridianError::Database(format!(
                            "insert on table \"{}\" violates foreign key on \"{}\": key ({})=({}) is not present in \"{}\"",
                            table, column, column, value, parent
                        )));
                    }
                }
            }

            let duplicate = existing.is_some_and(|d| d.keys.contains(&key))
                || !batch_keys.insert(key.clone());
            if !duplicate {
                accepted.push((key, row));
            }
        }

        let data = tables.entry(table).or_default();
        if data.columns.is_empty() {
            data.columns = columns.iter().map(|c| c.to_string()).collect();
        }

        let mut outcome = BatchInsertOutcome {
            inserted: 0,
            duplicates_ignored: submitted - accepted.len() as u64,
        };
        for (key, row) in accepted {
            data.keys.insert(key);
            data.rows.push(row);
            outcome.inserted += 1;
        }
        Ok(outcome)
    }

    async fn encounter_index(&self) -> Result<Vec<EncounterIndexEntry>> {
        let tables = self.lock()?;
        let Some(data) = tables.get(&Table::Encounters) else {
            return Ok(Vec::new());
        };
        let date_index = data.column_index("encounter_date");

        let mut entries = Vec::with_capacity(data.rows.len());
        for row in &data.rows {
            let encounter_date = match date_index.and_then(|i| row.get(i)) {
                Some(SqlValue::Timestamp(Some(ts))) => ts.date(),
                Some(SqlValue::Date(Some(d))) => *d,
                _ => continue,
            };
            let encounter_id = data
                .text_at(row, "encounter_id")
                .and_then(|v| EncounterId::new(v).ok());
            let patient_id = data
                .text_at(row, "patient_id")
                .and_then(|v| PatientId::new(v).ok());
            if let (Some(encounter_id), Some(patient_id)) = (encounter_id, patient_id) {
                entries.push(EncounterIndexEntry {
                    encounter_id,
                    patient_id,
                    encounter_date,
                });
            }
        }
        Ok(entries)
    }

    async fn referential_integrity(&self) -> Result<BTreeMap<String, i64>> {
        if !self.integrity_available {
            return Ok(BTreeMap::new());
        }
        let tables = self.lock()?;
        Ok(Table::LOAD_ORDER
            .iter()
            .filter(|t| !t.foreign_keys().is_empty())
            .map(|t| (t.as_str().to_string(), Self::orphan_count(&tables, *t)))
            .collect())
    }

    async fn table_stats(&self) -> Result<BTreeMap<String, i64>> {
        let tables = self.lock()?;
        Ok(tables
            .iter()
            .map(|(t, d)| (t.as_str().to_string(), d.rows.len() as i64))
            .collect())
    }

    async fn run_query(&self, _sql: &str) -> Result<QueryResult> {
        Err(MeridianError::Query(
            "SQL queries are not supported by the in-memory store".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(id: &str) -> Vec<SqlValue> {
        vec![SqlValue::text(id)]
    }

    fn encounter(id: &str, patient: &str) -> Vec<SqlValue> {
        vec![
            SqlValue::text(id),
            SqlValue::text(patient),
            SqlValue::Timestamp(chrono::NaiveDate::from_ymd_opt(2023, 5, 1)
                .and_then(|d| d.and_hms_opt(9, 30, 0))),
        ]
    }

    const ENCOUNTER_COLUMNS: &[&str] = &["encounter_id", "patient_id", "encounter_date"];

    #[tokio::test]
    async fn test_duplicate_keys_are_ignored() {
        let store = MemoryStore::new();
        let first = store
            .insert_batch(Table::Patients, &["patient_id"], vec![patient("P1"), patient("P1")])
            .await
            .unwrap();
        assert_eq!(first.inserted, 1);

        let second = store
            .insert_batch(Table::Patients, &["patient_id"], vec![patient("P1")])
            .await
            .unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(store.row_count(Table::Patients), 1);
    }

    #[tokio::test]
    async fn test_foreign_key_violation_rejects_whole_batch() {
        let store = MemoryStore::new();
        store
            .insert_batch(Table::Patients, &["patient_id"], vec![patient("P1")])
            .await
            .unwrap();

        let result = store
            .insert_batch(
                Table::Encounters,
                ENCOUNTER_COLUMNS,
                vec![encounter("E1", "P1"), encounter("E2", "P404")],
            )
            .await;
        assert!(matches!(result, Err(MeridianError::Database(_))));
        assert_eq!(store.row_count(Table::Encounters), 0);
    }

    #[tokio::test]
    async fn test_null_required_column_rejects_whole_batch() {
        let store = MemoryStore::new();
        let birth = SqlValue::Date(chrono::NaiveDate::from_ymd_opt(1975, 12, 10));

        let result = store
            .insert_batch(
                Table::Patients,
                &["patient_id", "date_of_birth"],
                vec![
                    vec![SqlValue::text("P1"), birth],
                    vec![SqlValue::text("P2"), SqlValue::Date(None)],
                ],
            )
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("date_of_birth"));
        assert_eq!(store.row_count(Table::Patients), 0);
    }

    #[tokio::test]
    async fn test_integrity_counts_orphans_when_unenforced() {
        let store = MemoryStore::new().without_foreign_keys();
        store
            .insert_batch(Table::Encounters, ENCOUNTER_COLUMNS, vec![encounter("E1", "P404")])
            .await
            .unwrap();

        let issues = store.referential_integrity().await.unwrap();
        assert_eq!(issues.get("encounters"), Some(&1));
        assert_eq!(issues.get("observations"), Some(&0));
    }

    #[tokio::test]
    async fn test_integrity_unavailable_returns_empty() {
        let store = MemoryStore::new().without_integrity_check();
        assert!(store.referential_integrity().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_encounter_index_truncates_to_date() {
        let store = MemoryStore::new().without_foreign_keys();
        store
            .insert_batch(Table::Encounters, ENCOUNTER_COLUMNS, vec![encounter("E1", "P1")])
            .await
            .unwrap();

        let index = store.encounter_index().await.unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].encounter_id.as_str(), "E1");
        assert_eq!(index[0].encounter_date.to_string(), "2023-05-01");
    }

    #[tokio::test]
    async fn test_run_query_is_unsupported() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.run_query("SELECT 1").await,
            Err(MeridianError::Query(_))
        ));
    }
}

//! Referential integrity outcomes against the in-memory warehouse

use chrono::NaiveDate;
use meridian::adapters::database::WarehouseStore;
use meridian::adapters::memory::MemoryStore;
use meridian::core::verification::{IntegrityStatus, IntegrityValidator};
use meridian::domain::{MeridianError, SqlValue, Table};
use std::sync::Arc;

const ENCOUNTER_COLUMNS: &[&str] = &["encounter_id", "patient_id", "encounter_date"];
const DIAGNOSIS_COLUMNS: &[&str] = &["diagnosis_id", "encounter_id", "patient_id"];

fn visit_time() -> SqlValue {
    SqlValue::Timestamp(
        NaiveDate::from_ymd_opt(2023, 5, 1).and_then(|d| d.and_hms_opt(9, 0, 0)),
    )
}

async fn seed(store: &MemoryStore) {
    store.ensure_schema().await.unwrap();
    store
        .insert_batch(Table::Patients, &["patient_id"], vec![vec![SqlValue::text("P1")]])
        .await
        .unwrap();
    store
        .insert_batch(
            Table::Encounters,
            ENCOUNTER_COLUMNS,
            vec![vec![SqlValue::text("E1"), SqlValue::text("P1"), visit_time()]],
        )
        .await
        .unwrap();
}

fn diagnosis(id: &str, encounter: &str) -> Vec<SqlValue> {
    vec![SqlValue::text(id), SqlValue::text(encounter), SqlValue::text("P1")]
}

#[tokio::test]
async fn test_linked_rows_pass() {
    let store = Arc::new(MemoryStore::new());
    seed(&store).await;
    store
        .insert_batch(Table::Diagnoses, DIAGNOSIS_COLUMNS, vec![diagnosis("D1", "E1")])
        .await
        .unwrap();

    let report = IntegrityValidator::new(store).validate().await;
    assert_eq!(report.status, IntegrityStatus::Passed);
    assert_eq!(report.total_orphans, 0);
}

#[tokio::test]
async fn test_orphans_produce_warning() {
    let store = Arc::new(MemoryStore::new().without_foreign_keys());
    seed(&store).await;
    store
        .insert_batch(
            Table::Diagnoses,
            DIAGNOSIS_COLUMNS,
            vec![diagnosis("D1", "E1"), diagnosis("D2", "E404"), diagnosis("D3", "E405")],
        )
        .await
        .unwrap();

    let report = IntegrityValidator::new(store).validate().await;
    assert_eq!(report.status, IntegrityStatus::Warning);
    assert_eq!(report.total_orphans, 2);
    assert_eq!(
        report.orphaned_tables().collect::<Vec<_>>(),
        vec![("diagnoses", 2)]
    );
}

#[tokio::test]
async fn test_missing_integrity_function_fails() {
    let store = Arc::new(MemoryStore::new().without_integrity_check());
    seed(&store).await;

    let report = IntegrityValidator::new(store).validate().await;
    assert_eq!(report.status, IntegrityStatus::Failed);
    assert!(report.failure_reason.is_some());
}

#[tokio::test]
async fn test_foreign_key_violation_rejects_whole_batch() {
    let store = MemoryStore::new();
    seed(&store).await;

    let err = store
        .insert_batch(
            Table::Diagnoses,
            DIAGNOSIS_COLUMNS,
            vec![diagnosis("D1", "E1"), diagnosis("D2", "E404")],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MeridianError::Database(_)));
    assert_eq!(store.row_count(Table::Diagnoses), 0);
}

#[tokio::test]
async fn test_duplicate_keys_are_ignored() {
    let store = MemoryStore::new();
    seed(&store).await;

    let first = store
        .insert_batch(Table::Diagnoses, DIAGNOSIS_COLUMNS, vec![diagnosis("D1", "E1")])
        .await
        .unwrap();
    let second = store
        .insert_batch(
            Table::Diagnoses,
            DIAGNOSIS_COLUMNS,
            vec![diagnosis("D1", "E1"), diagnosis("D2", "E1")],
        )
        .await
        .unwrap();

    assert_eq!(first.inserted, 1);
    assert_eq!(second.inserted, 1);
    assert_eq!(second.duplicates_ignored, 1);
    assert_eq!(store.row_count(Table::Diagnoses), 2);
}

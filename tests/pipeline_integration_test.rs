//! End-to-end pipeline tests against the in-memory warehouse
//!
//! Each test lays out raw source files in a temporary directory and runs the
//! pipeline the way `meridian run --dry-run` does.

use meridian::adapters::database::WarehouseStore;
use meridian::adapters::files::{export_cleaned_to_sqlite, EXPORT_DATABASE_FILE};
use meridian::adapters::memory::MemoryStore;
use meridian::config::MeridianConfig;
use meridian::core::analysis::{HealthStatus, RunAnalyzer};
use meridian::core::pipeline::{Pipeline, Step, StepSelection};
use meridian::core::verification::IntegrityStatus;
use meridian::domain::Table;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const PATIENTS: &str = "\
patient_id,first_name,last_name,date_of_birth,gender,address,city,state,zip_code,phone_number
P1,ada,LOVELACE,12/10/1975,Female,1 Analytical Way,London,MA,2134,555.010.1234
P2,Grace,Hopper,1960-12-09,Female,2 Compiler Ct,Arlington,VA,22201,(555) 010-9876
P3,No,Birthday,,Male,,,,,
";

const OBSERVATIONS: &str = "\
observation_id,patient_id,observation_code,observation_description,observation_datetime,value_numeric,value_text,units
O1,P1,2345-7,Glucose,2023-05-01T14:30:00,,142 mg/dL,mg/dL
O2,P2,4548-4,Hemoglobin A1c,2023-06-01 08:00:00,6.2,,%
O3,P2,8867-4,Heart rate,2023-07-15T08:00:00,72,,bpm
";

const PROCEDURES: &str = "\
procedure_id,patient_id,procedure_code,procedure_description,date_performed,provider_id
X1,P1,99213,Office visit,2023-05-01T11:00:00,DR1
X2,P2,80053,Metabolic panel,2023-06-01T09:15:00,
";

const DIAGNOSES: &str = r#"[
    {"diagnosis_id": "D1", "patient_id": "P1", "diagnosis_code": "E11.9",
     "diagnosis_description": " Type 2 diabetes ", "date_recorded": "2023-05-01T09:00:00"},
    {"diagnosis_id": "D2", "patient_id": "P1", "diagnosis_code": "I10",
     "diagnosis_description": "Hypertension", "date_recorded": "05/01/2023"}
]"#;

const MEDICATIONS: &str = r#"[
    {"medication_order_id": "M1", "patient_id": "P1", "drug_name": "Metformin",
     "dosage": "500 mg", "start_date": "2023-05-01", "end_date": null},
    {"medication_order_id": "M2", "patient_id": "P2", "drug_name": "Lisinopril",
     "start_date": "2024-01-01"}
]"#;

const QUERIES: &str = "\
-- Query 1: Patient Count
SELECT COUNT(*) AS total_patients FROM patients;
";

fn write(dir: &Path, name: &str, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

fn seed_raw(root: &TempDir) {
    let raw = root.path().join("raw");
    write(&raw, "patients.csv", PATIENTS);
    write(&raw, "observations.csv", OBSERVATIONS);
    write(&raw, "procedures.csv", PROCEDURES);
    write(&raw, "diagnoses.json", DIAGNOSES);
    write(&raw, "medications.json", MEDICATIONS);
    write(root.path(), "queries.sql", QUERIES);
}

fn config(root: &TempDir) -> MeridianConfig {
    let mut config = MeridianConfig::default();
    config.application.dry_run = true;
    config.paths.raw_data = root.path().join("raw");
    config.paths.processed_data = root.path().join("processed");
    config.paths.reports = root.path().join("reports");
    config.paths.output = root.path().join("output");
    config.paths.queries_file = root.path().join("queries.sql");
    config.loading.batch_size = 2;
    config
}

fn files_with_prefix(dir: &Path, prefix: &str) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(prefix))
        .collect()
}

#[tokio::test]
async fn test_full_pipeline_derives_one_encounter_per_patient_day() {
    let root = TempDir::new().unwrap();
    seed_raw(&root);
    let store = Arc::new(MemoryStore::new());

    let report = Pipeline::new(config(&root), store.clone())
        .run(StepSelection::All, false)
        .await;

    assert!(report.is_successful(), "pipeline failed: {:?}", report.failed_step());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.steps.len(), Step::ALL.len());
    assert_eq!(report.integrity, Some(IntegrityStatus::Passed));

    // P3 has no date of birth and never reaches the warehouse
    assert_eq!(store.row_count(Table::Patients), 2);

    // P1 on 2023-05-01 and P2 on 2023-06-01
    assert_eq!(store.row_count(Table::Encounters), 2);
    let encounters = store.rows(Table::Encounters);
    let p1_encounter = encounters
        .iter()
        .find(|row| row["patient_id"].as_text() == Some("P1"))
        .and_then(|row| row["encounter_id"].as_text())
        .unwrap()
        .to_string();

    // Both diagnoses and the procedure share P1's single encounter
    let diagnoses = store.rows(Table::Diagnoses);
    assert_eq!(diagnoses.len(), 2);
    for diagnosis in &diagnoses {
        assert_eq!(diagnosis["encounter_id"].as_text(), Some(p1_encounter.as_str()));
    }
    let procedures = store.rows(Table::Procedures);
    let x1 = procedures
        .iter()
        .find(|row| row["procedure_id"].as_text() == Some("X1"))
        .unwrap();
    assert_eq!(x1["encounter_id"].as_text(), Some(p1_encounter.as_str()));

    // M2 and O3 fall on days without an encounter
    assert_eq!(store.row_count(Table::Medications), 1);
    assert_eq!(store.row_count(Table::Observations), 2);

    let output = root.path().join("output");
    let final_report = fs::read_to_string(output.join("final_report.md")).unwrap();
    assert!(final_report.contains("- **encounters**: 2 records"));
    assert!(final_report.contains("Referential integrity: PASSED"));
    assert_eq!(files_with_prefix(&output, "query_results_").len(), 1);

    let reports = root.path().join("reports");
    assert_eq!(files_with_prefix(&reports, "data_quality_report_").len(), 1);
    assert_eq!(files_with_prefix(&reports, "load_report_").len(), 1);
}

#[tokio::test]
async fn test_rerun_does_not_duplicate_rows() {
    let root = TempDir::new().unwrap();
    seed_raw(&root);
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(config(&root), store.clone());

    assert!(pipeline.run(StepSelection::All, false).await.is_successful());
    let first = store.table_stats().await.unwrap();

    assert!(pipeline.run(StepSelection::All, false).await.is_successful());
    let second = store.table_stats().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second["encounters"], 2);
}

#[tokio::test]
async fn test_snapshot_encounters_take_precedence() {
    let root = TempDir::new().unwrap();
    seed_raw(&root);

    let snapshot = root.path().join("raw").join("ehr_journeys_database.sqlite");
    let conn = rusqlite::Connection::open(&snapshot).unwrap();
    conn.execute_batch(
        "CREATE TABLE encounters (encounter_id TEXT, patient_id TEXT, encounter_date TEXT,
                                  encounter_type TEXT, provider_id TEXT);
         INSERT INTO encounters VALUES ('E100', 'P1', '2023-05-01 08:00:00', 'Outpatient', 'DR1');
         INSERT INTO encounters VALUES ('E200', 'P2', '2023-06-01 07:30:00', 'Lab', 'DR2');",
    )
    .unwrap();
    drop(conn);

    let store = Arc::new(MemoryStore::new());
    let report = Pipeline::new(config(&root), store.clone())
        .run(StepSelection::All, false)
        .await;
    assert!(report.is_successful(), "pipeline failed: {:?}", report.failed_step());

    assert!(root
        .path()
        .join("processed")
        .join("sqlite_encounters.csv")
        .is_file());

    let encounter_ids: Vec<String> = store
        .rows(Table::Encounters)
        .iter()
        .filter_map(|row| row["encounter_id"].as_text().map(str::to_string))
        .collect();
    assert_eq!(encounter_ids, vec!["E100".to_string(), "E200".to_string()]);

    for diagnosis in store.rows(Table::Diagnoses) {
        assert_eq!(diagnosis["encounter_id"].as_text(), Some("E100"));
    }
}

#[tokio::test]
async fn test_steps_can_run_separately() {
    let root = TempDir::new().unwrap();
    seed_raw(&root);
    let store = Arc::new(MemoryStore::new());
    store.ensure_schema().await.unwrap();
    let pipeline = Pipeline::new(config(&root), store.clone());

    let cleaning = pipeline.run(StepSelection::Cleaning, false).await;
    assert!(cleaning.is_successful());
    assert_eq!(
        cleaning.steps.iter().map(|s| s.step).collect::<Vec<_>>(),
        vec![Step::Prerequisites, Step::Cleaning]
    );
    assert_eq!(store.row_count(Table::Patients), 0);

    let loading = pipeline.run(StepSelection::Loading, true).await;
    assert!(loading.is_successful());
    assert_eq!(loading.integrity, Some(IntegrityStatus::Passed));
    assert_eq!(store.row_count(Table::Patients), 2);
}

#[tokio::test]
async fn test_loading_without_cleaned_files_fails() {
    let root = TempDir::new().unwrap();
    seed_raw(&root);

    let report = Pipeline::new(config(&root), Arc::new(MemoryStore::new()))
        .run(StepSelection::Loading, true)
        .await;

    let failed = report.failed_step().unwrap();
    assert_eq!(failed.step, Step::Loading);
    assert!(failed.error.as_deref().unwrap().contains("patients_cleaned.csv"));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_completed_run_can_be_analyzed_and_exported() {
    let root = TempDir::new().unwrap();
    seed_raw(&root);
    let mut config = config(&root);
    config.logging.local_enabled = false;
    let report = Pipeline::new(config.clone(), Arc::new(MemoryStore::new()))
        .run(StepSelection::All, false)
        .await;
    assert!(report.is_successful());

    let analysis = RunAnalyzer::from_config(&config).analyze();
    assert!(analysis.issues.is_empty(), "issues: {:?}", analysis.issues);
    // The in-memory warehouse cannot run SQL, so the one query fails
    assert_eq!(analysis.status, HealthStatus::Warning);
    assert_eq!(analysis.recommendations, vec!["1 queries failed".to_string()]);
    assert_eq!(analysis.completeness["patients"], 2);
    let load = analysis.load.as_ref().unwrap();
    assert_eq!(load.integrity_status.as_deref(), Some("PASSED"));
    assert_eq!(load.encounter_source.as_deref(), Some("derived"));
    assert!(analysis.quality.as_ref().unwrap().overall_score > 0.0);

    let processed = root.path().join("processed");
    let database = processed.join(EXPORT_DATABASE_FILE);
    let export = export_cleaned_to_sqlite(&processed, &database).unwrap();
    assert_eq!(export.tables.len(), 5);
    let conn = rusqlite::Connection::open(&database).unwrap();
    let patients: i64 = conn
        .query_row("SELECT COUNT(*) FROM patients", [], |r| r.get(0))
        .unwrap();
    assert_eq!(patients, 2);
}

//! Integration tests for the cleaning step

use chrono::NaiveDate;
use meridian::core::cleaning::DataCleaner;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

fn seed_raw(raw: &Path) {
    write(
        raw,
        "patients.csv",
        "patient_id,first_name,last_name,date_of_birth,gender,zip_code,phone_number\n\
         8c4a1f57-2f7b-4d8e-9a51-0f3c2b6e7d10,maria,GARCIA,1984-03-22,female,7030,201-555-0143\n\
         P2,Sam,Lee,2090-01-01,Male,10001,\n",
    );
    write(
        raw,
        "observations.csv",
        "observation_id,patient_id,observation_description,observation_datetime,value_numeric,value_text\n\
         O1,P1,Serum Creatinine,2023-02-01,,1.4 mg/dL\n\
         O2,P1,Glucose,2023-02-01,,\n",
    );
    write(
        raw,
        "procedures.csv",
        "procedure_id,patient_id,procedure_description,date_performed\nX1,P1,Chest X-ray,20230201\n",
    );
    write(
        raw,
        "diagnoses.json",
        r#"[{"diagnosis_id": "D1", "patient_id": "P1", "date_recorded": "2023-02-01"}]"#,
    );
    write(raw, "medications.json", "[]");
}

fn cleaner(root: &TempDir) -> DataCleaner {
    let raw = root.path().join("raw");
    DataCleaner::new(
        &raw,
        root.path().join("processed"),
        root.path().join("reports"),
        raw.join("ehr_journeys_database.sqlite"),
    )
    .with_reference_date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
}

#[test]
fn test_run_writes_cleaned_files_and_quality_report() {
    let root = TempDir::new().unwrap();
    seed_raw(&root.path().join("raw"));

    let outcome = cleaner(&root).run().unwrap();

    let processed = root.path().join("processed");
    for name in [
        "patients_cleaned.csv",
        "observations_cleaned.csv",
        "procedures_cleaned.csv",
        "diagnoses_cleaned.json",
        "medications_cleaned.json",
    ] {
        assert!(processed.join(name).is_file(), "missing {name}");
    }
    assert!(outcome.snapshot.is_none());

    let report: Value =
        serde_json::from_str(&fs::read_to_string(&outcome.report_path).unwrap()).unwrap();
    assert_eq!(report["patients"]["initial_count"], 2);
    assert_eq!(report["patients"]["final_count"], 1);
    assert_eq!(report["medications"]["data_quality_score"], 100.0);
    assert_eq!(report["overall"]["total_datasets_processed"], 5);
    assert!(report["overall"]["processing_timestamp"].is_string());

    let patients = fs::read_to_string(processed.join("patients_cleaned.csv")).unwrap();
    assert!(patients.contains("Maria,Garcia,1984-03-22,Female,07030,(201) 555-0143"));

    let observations = fs::read_to_string(processed.join("observations_cleaned.csv")).unwrap();
    assert!(observations.contains("1.4"));
}

#[test]
fn test_snapshot_tables_are_exported() {
    let root = TempDir::new().unwrap();
    let raw = root.path().join("raw");
    seed_raw(&raw);

    let conn = rusqlite::Connection::open(raw.join("ehr_journeys_database.sqlite")).unwrap();
    conn.execute_batch(
        "CREATE TABLE visits (visit_id TEXT, patient_id TEXT, visit_date TEXT);
         INSERT INTO visits VALUES ('V1', 'P1', '2023-02-01 10:00:00');
         INSERT INTO visits VALUES ('V2', 'P1', '2023-03-01 10:00:00');
         CREATE TABLE providers (provider_id TEXT, name TEXT);",
    )
    .unwrap();
    drop(conn);

    let outcome = cleaner(&root).run().unwrap();
    let snapshot = outcome.snapshot.unwrap();
    assert_eq!(snapshot.tables.len(), 2);
    assert_eq!(snapshot.table_data["visits"].row_count, 2);
    assert_eq!(snapshot.table_data["providers"].row_count, 0);

    let processed = root.path().join("processed");
    assert!(processed.join("sqlite_visits.csv").is_file());
    assert!(processed.join("sqlite_database_info.json").is_file());
}

#[test]
fn test_missing_raw_file_aborts_cleaning() {
    let root = TempDir::new().unwrap();
    let raw = root.path().join("raw");
    seed_raw(&raw);
    fs::remove_file(raw.join("medications.json")).unwrap();

    let err = cleaner(&root).run().unwrap_err();
    assert!(err.to_string().contains("medications.json"));
}

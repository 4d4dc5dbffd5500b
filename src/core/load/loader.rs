//! The load step
//!
//! Reads the cleaned files, loads patients, resolves encounters, links and
//! loads the dependent tables in foreign-key order, then checks integrity
//! and writes `load_report_<ts>.json`.

use crate::adapters::database::WarehouseStore;
use crate::adapters::files::layout::{self, REQUIRED_CLEANED_FILES};
use crate::adapters::files::{read_csv, read_json_rows, write_json};
use crate::config::MeridianConfig;
use crate::core::load::summary::{LoadReport, LoadSummary, TableLoadStats};
use crate::core::load::BatchLoader;
use crate::core::reconcile::{
    DependentRecord, EncounterResolver, EncounterSource, ReferentialLinker,
};
use crate::core::verification::{IntegrityReport, IntegrityValidator};
use crate::domain::{
    Diagnosis, Medication, MeridianError, Observation, Patient, PatientId, Procedure, Result,
    SourceRow, Table, TableRecord,
};
use crate::logging::timed;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// What a completed load produced
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub summary: LoadSummary,
    pub integrity: IntegrityReport,
    pub report_path: PathBuf,
}

/// Loads the cleaned files into the warehouse
pub struct DataLoader {
    store: Arc<dyn WarehouseStore>,
    loader: BatchLoader,
    processed_dir: PathBuf,
    reports_dir: PathBuf,
}

impl DataLoader {
    pub fn new(
        store: Arc<dyn WarehouseStore>,
        processed_dir: impl Into<PathBuf>,
        reports_dir: impl Into<PathBuf>,
        batch_size: usize,
    ) -> Self {
        Self {
            loader: BatchLoader::new(store.clone(), batch_size),
            store,
            processed_dir: processed_dir.into(),
            reports_dir: reports_dir.into(),
        }
    }

    pub fn from_config(store: Arc<dyn WarehouseStore>, config: &MeridianConfig) -> Self {
        Self::new(
            store,
            &config.paths.processed_data,
            &config.paths.reports,
            config.loading.batch_size,
        )
    }

    fn processed(&self, name: &str) -> PathBuf {
        self.processed_dir.join(name)
    }

    /// Check that every cleaned file exists and that patients is non-empty
    pub fn validate_processed_files(&self) -> Result<()> {
        let missing: Vec<String> = REQUIRED_CLEANED_FILES
            .iter()
            .map(|name| self.processed(name))
            .filter(|path| !path.is_file())
            .map(|path| path.display().to_string())
            .collect();

        if !missing.is_empty() {
            tracing::error!(files = ?missing, "Missing processed files");
            return Err(MeridianError::MissingFile {
                path: missing.join(", "),
            });
        }

        if read_csv(&self.processed(layout::PATIENTS_CLEANED))?.is_empty() {
            return Err(MeridianError::Validation("Patients file is empty".to_string()));
        }

        tracing::info!("Processed file validation passed");
        Ok(())
    }

    /// Run the whole load
    ///
    /// # Errors
    ///
    /// Missing or unreadable cleaned files and failed table loads abort the
    /// run. Integrity problems do not.
    pub async fn load_all(&self) -> Result<LoadOutcome> {
        let started = Instant::now();
        tracing::info!(processed_dir = %self.processed_dir.display(), "Starting data load");

        self.validate_processed_files()?;
        let mut summary = LoadSummary::new();

        // Patients
        let rows = read_csv(&self.processed(layout::PATIENTS_CLEANED))?.rows;
        let (patients, invalid) = parse_records(&rows, Patient::from_row);
        let known_patients: HashSet<PatientId> =
            patients.iter().map(|p| p.patient_id.clone()).collect();
        let result = self.load_table(&patients, &mut summary).await?;
        summary.record(
            Table::Patients,
            TableLoadStats::read(rows.len(), invalid).with_load(&result),
        );

        // Dependent records are read up front; the derived encounter source needs them
        let diagnoses = read_json_rows(&self.processed(layout::DIAGNOSES_CLEANED))?;
        let medications = read_json_rows(&self.processed(layout::MEDICATIONS_CLEANED))?;
        let procedures = read_csv(&self.processed(layout::PROCEDURES_CLEANED))?.rows;
        let observations = read_csv(&self.processed(layout::OBSERVATIONS_CLEANED))?.rows;

        let (diagnosis_records, diagnosis_invalid) = parse_records(&diagnoses, Diagnosis::from_row);
        let (medication_records, medication_invalid) =
            parse_records(&medications, Medication::from_row);
        let (procedure_records, procedure_invalid) = parse_records(&procedures, Procedure::from_row);
        let (observation_records, observation_invalid) =
            parse_records(&observations, Observation::from_row);

        // Encounters
        let source = self.encounter_source(&diagnosis_records, &procedure_records)?;
        summary.encounter_source = Some(source.kind().to_string());
        let resolution = timed(
            "load_encounters",
            EncounterResolver::new(self.store.clone(), self.loader.batch_size())
                .resolve(source, &known_patients),
        )
        .await
        .map_err(|e| {
            summary.record_failure(Table::Encounters, e.to_string());
            e
        })?;

        let stats = resolution.stats;
        summary.resolution = Some(stats);
        summary.record(
            Table::Encounters,
            TableLoadStats {
                read: stats.considered,
                dropped_missing_date: stats.skipped_missing_date,
                dropped_unlinked: stats.skipped_unknown_patient,
                ..TableLoadStats::default()
            }
            .with_load(&resolution.load),
        );

        // Dependents, in foreign-key order
        let linker = ReferentialLinker::new(&resolution.map, &known_patients);
        self.load_dependent(&linker, diagnosis_records, diagnoses.len(), diagnosis_invalid, &mut summary)
            .await?;
        self.load_dependent(&linker, medication_records, medications.len(), medication_invalid, &mut summary)
            .await?;
        self.load_dependent(&linker, procedure_records, procedures.len(), procedure_invalid, &mut summary)
            .await?;
        self.load_dependent(
            &linker,
            observation_records,
            observations.len(),
            observation_invalid,
            &mut summary,
        )
        .await?;

        let integrity = IntegrityValidator::new(self.store.clone()).validate().await;

        let database_stats = match self.store.table_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "Could not get database stats");
                Default::default()
            }
        };

        summary.duration = started.elapsed();
        summary.log_summary();

        let report = LoadReport::new(&summary, database_stats, Some(integrity.clone()));
        let report_path =
            layout::timestamped(&self.reports_dir, "load_report", &chrono::Local::now(), "json");
        write_json(&report_path, &report)?;
        tracing::info!(path = %report_path.display(), "Load report saved");

        Ok(LoadOutcome {
            summary,
            integrity,
            report_path,
        })
    }

    fn encounter_source(
        &self,
        diagnoses: &[Diagnosis],
        procedures: &[Procedure],
    ) -> Result<EncounterSource> {
        if let Some(path) = layout::find_encounter_export(&self.processed_dir)? {
            tracing::info!(path = %path.display(), "Using snapshot encounters");
            return Ok(EncounterSource::Snapshot(read_csv(&path)?.rows));
        }

        tracing::warn!("No snapshot encounter data found, deriving encounters");
        let pairs = diagnoses
            .iter()
            .map(|d| (d.patient_id.clone(), d.relevant_date()))
            .chain(
                procedures
                    .iter()
                    .map(|p| (p.patient_id.clone(), p.relevant_date())),
            );
        Ok(EncounterSource::derived(pairs))
    }

    async fn load_table<R: TableRecord>(
        &self,
        records: &[R],
        summary: &mut LoadSummary,
    ) -> Result<crate::core::load::LoadResult> {
        let operation = format!("load_{}", R::TABLE);
        timed(&operation, self.loader.load(records))
            .await
            .map_err(|e| {
                summary.record_failure(R::TABLE, e.to_string());
                e
            })
    }

    async fn load_dependent<R: DependentRecord>(
        &self,
        linker: &ReferentialLinker<'_>,
        records: Vec<R>,
        read: usize,
        invalid: usize,
        summary: &mut LoadSummary,
    ) -> Result<()> {
        tracing::info!(table = %R::TABLE, records = records.len(), "Loading");
        let linked = linker.link(records);
        let result = self.load_table(&linked.records, summary).await?;
        summary.record(
            R::TABLE,
            TableLoadStats::read(read, invalid)
                .with_link(&linked.stats)
                .with_load(&result),
        );
        Ok(())
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }
}

/// Build records from rows; rows missing required fields are skipped
fn parse_records<R: TableRecord>(
    rows: &[SourceRow],
    parse: fn(&SourceRow) -> std::result::Result<R, String>,
) -> (Vec<R>, usize) {
    let mut records = Vec::with_capacity(rows.len());
    let mut invalid = 0;
    for row in rows {
        match parse(row) {
            Ok(record) => records.push(record),
            Err(reason) => {
                tracing::debug!(table = %R::TABLE, reason = %reason, "Skipping invalid record");
                invalid += 1;
            }
        }
    }
    if invalid > 0 {
        tracing::warn!(table = %R::TABLE, count = invalid, "Skipped records missing required fields");
    }
    (records, invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn seed_processed(dir: &Path) {
        write(
            dir,
            layout::PATIENTS_CLEANED,
            "patient_id,first_name,date_of_birth\nP1,Ada,1975-12-10\nP2,Grace,1960-12-09\n",
        );
        write(
            dir,
            layout::DIAGNOSES_CLEANED,
            r#"[
                {"diagnosis_id": "D1", "patient_id": "P1", "date_recorded": "2023-05-01T09:00:00"},
                {"diagnosis_id": "D2", "patient_id": "P1", "date_recorded": null}
            ]"#,
        );
        write(
            dir,
            layout::MEDICATIONS_CLEANED,
            r#"[{"medication_order_id": "M1", "patient_id": "P1", "start_date": "2023-05-01"}]"#,
        );
        write(
            dir,
            layout::PROCEDURES_CLEANED,
            "procedure_id,patient_id,procedure_description,date_performed\nX1,P2,Biopsy,2023-06-01T10:00:00\n",
        );
        write(
            dir,
            layout::OBSERVATIONS_CLEANED,
            "observation_id,patient_id,observation_datetime,value_numeric\nO1,P2,2023-06-01T11:00:00,5.5\nO2,P2,2023-07-01T11:00:00,\n",
        );
    }

    #[tokio::test]
    async fn test_missing_files_are_reported() {
        let dir = TempDir::new().unwrap();
        let loader = DataLoader::new(Arc::new(MemoryStore::new()), dir.path(), dir.path(), 100);
        assert!(matches!(
            loader.validate_processed_files(),
            Err(MeridianError::MissingFile { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_patients_rejected() {
        let dir = TempDir::new().unwrap();
        seed_processed(dir.path());
        write(dir.path(), layout::PATIENTS_CLEANED, "patient_id,first_name\n");
        let loader = DataLoader::new(Arc::new(MemoryStore::new()), dir.path(), dir.path(), 100);
        assert!(matches!(
            loader.validate_processed_files(),
            Err(MeridianError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_load_all_derives_encounters() {
        let dir = TempDir::new().unwrap();
        seed_processed(dir.path());
        let reports = dir.path().join("reports");
        let store = Arc::new(MemoryStore::new());

        let outcome = DataLoader::new(store.clone(), dir.path(), &reports, 100)
            .load_all()
            .await
            .unwrap();

        assert_eq!(outcome.summary.encounter_source.as_deref(), Some("derived"));
        assert_eq!(store.row_count(Table::Encounters), 2);
        assert_eq!(store.row_count(Table::Diagnoses), 1);
        assert_eq!(store.row_count(Table::Medications), 1);
        assert_eq!(store.row_count(Table::Procedures), 1);
        assert_eq!(store.row_count(Table::Observations), 1);

        let diagnoses = outcome.summary.tables[&Table::Diagnoses];
        assert_eq!(diagnoses.dropped_missing_date, 1);
        let observations = outcome.summary.tables[&Table::Observations];
        assert_eq!(observations.dropped_unlinked, 1);

        assert!(outcome.integrity.is_passed());
        assert!(outcome.report_path.is_file());
    }

    #[tokio::test]
    async fn test_load_all_uses_snapshot_export() {
        let dir = TempDir::new().unwrap();
        seed_processed(dir.path());
        write(
            dir.path(),
            "sqlite_encounters.csv",
            "encounter_id,patient_id,encounter_date\nE1,P1,2023-05-01 08:00:00\n",
        );
        let store = Arc::new(MemoryStore::new());

        let outcome = DataLoader::new(store.clone(), dir.path(), dir.path(), 100)
            .load_all()
            .await
            .unwrap();

        assert_eq!(outcome.summary.encounter_source.as_deref(), Some("snapshot"));
        assert_eq!(store.row_count(Table::Encounters), 1);
        assert_eq!(store.row_count(Table::Diagnoses), 1);
        assert_eq!(store.row_count(Table::Procedures), 0);
        let diagnosis = &store.rows(Table::Diagnoses)[0];
        assert_eq!(diagnosis["encounter_id"].as_text(), Some("E1"));
    }

    #[tokio::test]
    async fn test_stale_encounter_reference_is_dropped_not_fatal() {
        let dir = TempDir::new().unwrap();
        seed_processed(dir.path());
        write(
            dir.path(),
            layout::DIAGNOSES_CLEANED,
            r#"[
                {"diagnosis_id": "D1", "patient_id": "P1", "encounter_id": "E-STALE",
                 "date_recorded": "2023-05-01T09:00:00"},
                {"diagnosis_id": "D2", "patient_id": "P1", "date_recorded": "2023-05-01T10:00:00"}
            ]"#,
        );
        let store = Arc::new(MemoryStore::new());

        let outcome = DataLoader::new(store.clone(), dir.path(), dir.path(), 100)
            .load_all()
            .await
            .unwrap();

        let stored = store.rows(Table::Diagnoses);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["diagnosis_id"].as_text(), Some("D2"));
        let diagnoses = outcome.summary.tables[&Table::Diagnoses];
        assert_eq!(diagnoses.dropped_unresolved_reference, 1);
        assert!(outcome.integrity.is_passed());
    }

    #[tokio::test]
    async fn test_patient_without_birth_date_is_skipped() {
        let dir = TempDir::new().unwrap();
        seed_processed(dir.path());
        write(
            dir.path(),
            layout::PATIENTS_CLEANED,
            "patient_id,first_name,date_of_birth\nP1,Ada,1975-12-10\nP2,Grace,\n",
        );
        let store = Arc::new(MemoryStore::new());

        let outcome = DataLoader::new(store.clone(), dir.path(), dir.path(), 100)
            .load_all()
            .await
            .unwrap();

        assert_eq!(store.row_count(Table::Patients), 1);
        let patients = outcome.summary.tables[&Table::Patients];
        assert_eq!(patients.skipped_invalid, 1);
        // P2's procedure and observations have no patient to attach to
        assert_eq!(store.row_count(Table::Procedures), 0);
        assert_eq!(store.row_count(Table::Observations), 0);
    }
}

//! The cleaning step
//!
//! Reads the raw source files, standardizes them field by field and writes
//! the `<entity>_cleaned` counterparts, exports the relational snapshot and
//! writes `data_quality_report_<ts>.json`.

use crate::adapters::files::layout::{self, REQUIRED_RAW_FILES};
use crate::adapters::files::{export_snapshot, read_csv, read_json_records, write_csv, write_json, SnapshotInfo};
use crate::config::MeridianConfig;
use crate::core::cleaning::normalize;
use crate::core::cleaning::quality::{percentage, DatasetQuality, QualityReport};
use crate::domain::dates::{format_date, format_iso, parse_datetime};
use crate::domain::{MeridianError, PatientId, Result, SourceRow};
use crate::logging::OperationTimer;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Date fields standardized in the JSON sources
pub const JSON_DATE_FIELDS: &[&str] = &["date_recorded", "start_date", "end_date"];

/// What a completed cleaning run produced
#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub quality: QualityReport,
    pub report_path: PathBuf,
    pub snapshot: Option<SnapshotInfo>,
}

/// Produces the cleaned files from the raw sources
pub struct DataCleaner {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
    reports_dir: PathBuf,
    snapshot_path: PathBuf,
    today: NaiveDate,
}

impl DataCleaner {
    pub fn new(
        raw_dir: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
        reports_dir: impl Into<PathBuf>,
        snapshot_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
            reports_dir: reports_dir.into(),
            snapshot_path: snapshot_path.into(),
            today: chrono::Local::now().date_naive(),
        }
    }

    pub fn from_config(config: &MeridianConfig) -> Self {
        Self::new(
            &config.paths.raw_data,
            &config.paths.processed_data,
            &config.paths.reports,
            config.paths.snapshot_path(),
        )
    }

    /// Date patient ages are computed against
    pub fn with_reference_date(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn raw(&self, name: &str) -> PathBuf {
        self.raw_dir.join(name)
    }

    fn processed(&self, name: &str) -> PathBuf {
        self.processed_dir.join(name)
    }

    /// Raw files that are not present
    pub fn missing_raw_files(&self) -> Vec<PathBuf> {
        REQUIRED_RAW_FILES
            .iter()
            .map(|name| self.raw(name))
            .filter(|path| !path.is_file())
            .collect()
    }

    /// Run every cleaning operation and write the quality report
    ///
    /// # Errors
    ///
    /// A missing or unreadable raw file fails the run. A missing or
    /// unreadable snapshot does not.
    pub fn run(&self) -> Result<CleaningOutcome> {
        tracing::info!(raw_dir = %self.raw_dir.display(), "Starting data cleaning");

        let missing = self.missing_raw_files();
        if !missing.is_empty() {
            let paths: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            return Err(MeridianError::MissingFile {
                path: paths.join(", "),
            });
        }

        let mut datasets = BTreeMap::new();
        datasets.insert("patients".to_string(), timed("clean_patients", || self.clean_patients())?);
        datasets.insert(
            "observations".to_string(),
            timed("clean_observations", || self.clean_observations())?,
        );
        datasets.insert(
            "procedures".to_string(),
            timed("clean_procedures", || self.clean_procedures())?,
        );
        datasets.insert(
            "diagnoses".to_string(),
            timed("clean_diagnoses", || {
                self.clean_json(layout::DIAGNOSES_RAW, layout::DIAGNOSES_CLEANED)
            })?,
        );
        datasets.insert(
            "medications".to_string(),
            timed("clean_medications", || {
                self.clean_json(layout::MEDICATIONS_RAW, layout::MEDICATIONS_CLEANED)
            })?,
        );

        let snapshot = self.export_snapshot();

        let quality = QualityReport::new(datasets);
        let report_path = layout::timestamped(
            &self.reports_dir,
            "data_quality_report",
            &chrono::Local::now(),
            "json",
        );
        write_json(&report_path, &quality)?;
        quality.log();
        tracing::info!(path = %report_path.display(), "Data quality report saved");

        Ok(CleaningOutcome {
            quality,
            report_path,
            snapshot,
        })
    }

    /// Clean `patients.csv`
    pub fn clean_patients(&self) -> Result<DatasetQuality> {
        let mut table = read_csv(&self.raw(layout::PATIENTS_RAW))?;
        let initial = table.len();
        for column in ["date_of_birth", "zip_code", "phone_number"] {
            table.ensure_column(column);
        }

        let invalid_ids = table
            .rows
            .iter()
            .filter_map(|row| row.text("patient_id"))
            .filter(|id| !PatientId::new(*id).map(|p| p.is_uuid()).unwrap_or(false))
            .count();
        if invalid_ids > 0 {
            tracing::warn!(count = invalid_ids, "Found invalid patient UUIDs");
        }

        let mut missing_dob = 0;
        let mut unrealistic_age = 0;
        let mut cleaned = Vec::with_capacity(initial);
        for mut row in table.rows {
            let Some(birth) = row.datetime("date_of_birth").map(|dt| dt.date()) else {
                missing_dob += 1;
                continue;
            };
            if !normalize::is_plausible_age(normalize::age_in_years(birth, self.today)) {
                unrealistic_age += 1;
                continue;
            }

            row.set("date_of_birth", Some(format_date(&birth)));
            let zip = row.text("zip_code").and_then(normalize::standardize_zip);
            row.set("zip_code", zip);
            let phone = row.text("phone_number").map(normalize::standardize_phone);
            row.set("phone_number", phone);
            for field in ["first_name", "last_name", "gender"] {
                let value = row.text(field).map(normalize::title_case);
                row.set(field, value);
            }
            cleaned.push(row);
        }

        if unrealistic_age > 0 {
            tracing::warn!(count = unrealistic_age, "Removed patients with unrealistic ages");
        }

        let quality = DatasetQuality::new(initial, cleaned.len())
            .with_counter("missing_dob", missing_dob)
            .with_counter("unrealistic_age", unrealistic_age)
            .with_counter("invalid_patient_ids", invalid_ids)
            .with_counter("missing_zip", count_missing(&cleaned, "zip_code"))
            .with_counter("missing_phone", count_missing(&cleaned, "phone_number"));

        write_csv(&self.processed(layout::PATIENTS_CLEANED), &table.headers, &cleaned)?;
        tracing::info!(records = cleaned.len(), "Processed patient records");
        Ok(quality)
    }

    /// Clean `observations.csv`
    pub fn clean_observations(&self) -> Result<DatasetQuality> {
        let mut table = read_csv(&self.raw(layout::OBSERVATIONS_RAW))?;
        let initial = table.len();
        for column in ["observation_datetime", "value_numeric", "is_abnormal"] {
            table.ensure_column(column);
        }

        let mut out_of_range: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut abnormal = 0;
        for row in &mut table.rows {
            standardize_datetime(row, "observation_datetime");

            let description = row.owned("observation_description").unwrap_or_default();
            let mut value = row.float("value_numeric");
            if value.is_none() && normalize::is_numeric_lab(&description) {
                value = row.text("value_text").and_then(normalize::extract_number);
            }

            if let Some(v) = value {
                let rejected = normalize::out_of_range_labs(&description, v);
                for keyword in &rejected {
                    *out_of_range.entry(keyword).or_default() += 1;
                }
                if !rejected.is_empty() {
                    value = None;
                }
            }

            let is_abnormal = value.is_some_and(|v| normalize::is_abnormal(&description, v));
            if is_abnormal {
                abnormal += 1;
            }
            row.set("value_numeric", value.map(|v| v.to_string()));
            row.set("is_abnormal", Some(is_abnormal.to_string()));
        }

        for (keyword, count) in &out_of_range {
            tracing::warn!(test = keyword, count = count, "Values out of range, cleared for review");
        }

        let missing_both = table
            .rows
            .iter()
            .filter(|row| row.text("value_text").is_none() && row.text("value_numeric").is_none())
            .count();
        let final_count = table.len();
        let quality = DatasetQuality::new(initial, final_count)
            .with_counter("missing_value_text", count_missing(&table.rows, "value_text"))
            .with_counter("missing_value_numeric", count_missing(&table.rows, "value_numeric"))
            .with_counter("missing_both_values", missing_both)
            .with_counter("abnormal_results", abnormal)
            .with_score(percentage(final_count - missing_both, initial));

        write_csv(&self.processed(layout::OBSERVATIONS_CLEANED), &table.headers, &table.rows)?;
        tracing::info!(records = final_count, "Processed observation records");
        Ok(quality)
    }

    /// Clean `procedures.csv`
    pub fn clean_procedures(&self) -> Result<DatasetQuality> {
        let mut table = read_csv(&self.raw(layout::PROCEDURES_RAW))?;
        let initial = table.len();
        table.ensure_column("date_performed");

        let mut cleaned = Vec::with_capacity(initial);
        for mut row in table.rows {
            let performed = standardize_datetime(&mut row, "date_performed");
            for field in ["procedure_code", "procedure_description"] {
                let value = row.owned(field);
                row.set(field, value);
            }
            if performed.is_none() || row.text("procedure_description").is_none() {
                continue;
            }
            cleaned.push(row);
        }

        let quality = DatasetQuality::new(initial, cleaned.len())
            .with_counter("missing_date", initial - cleaned.len());

        write_csv(&self.processed(layout::PROCEDURES_CLEANED), &table.headers, &cleaned)?;
        tracing::info!(records = cleaned.len(), "Processed procedure records");
        Ok(quality)
    }

    /// Clean a JSON source: ISO dates, trimmed strings, other values untouched
    pub fn clean_json(&self, raw_name: &str, cleaned_name: &str) -> Result<DatasetQuality> {
        let mut records = read_json_records(&self.raw(raw_name))?;
        for record in &mut records {
            if let Value::Object(object) = record {
                clean_json_object(object);
            }
        }

        write_json(&self.processed(cleaned_name), &records)?;
        tracing::info!(file = raw_name, records = records.len(), "Processed JSON records");
        Ok(DatasetQuality::new(records.len(), records.len()).with_counter("record_count", records.len()))
    }

    /// Export the relational snapshot, if there is one
    pub fn export_snapshot(&self) -> Option<SnapshotInfo> {
        match export_snapshot(&self.snapshot_path, &self.processed_dir) {
            Ok(info) => {
                tracing::info!(tables = info.tables.len(), "Snapshot exported");
                Some(info)
            }
            Err(MeridianError::MissingFile { path }) => {
                tracing::warn!(path = %path, "Snapshot database not found");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Error exploring snapshot database");
                None
            }
        }
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }
}

fn timed<T>(operation: &str, step: impl FnOnce() -> Result<T>) -> Result<T> {
    let timer = OperationTimer::start(operation);
    let result = step();
    timer.finish(&result);
    result
}

fn count_missing(rows: &[SourceRow], field: &str) -> usize {
    rows.iter().filter(|row| row.text(field).is_none()).count()
}

/// Rewrites `field` in ISO form; unparsable values become missing
fn standardize_datetime(row: &mut SourceRow, field: &str) -> Option<NaiveDateTime> {
    let parsed = row.datetime(field);
    row.set(field, parsed.as_ref().map(format_iso));
    parsed
}

fn clean_json_object(object: &mut serde_json::Map<String, Value>) {
    for field in JSON_DATE_FIELDS {
        let Some(value) = object.get_mut(*field) else {
            continue;
        };
        let raw = match &*value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        *value = match parse_datetime(&raw) {
            Some(dt) => Value::String(format_iso(&dt)),
            None => {
                tracing::warn!(field = *field, value = %raw, "Could not parse date");
                Value::Null
            }
        };
    }

    for value in object.values_mut() {
        if let Value::String(s) = value {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
    }
}

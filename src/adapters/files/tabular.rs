//! CSV and JSON source files
//!
//! Whole files are read into memory. A missing input is reported as
//! [`MeridianError::MissingFile`] so callers can fail the step.

use crate::domain::{MeridianError, Result, SourceRow};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// A CSV file read into rows, keeping the original column order
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<SourceRow>,
}

impl CsvTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends `column` to the header list if it is not there yet
    pub fn ensure_column(&mut self, column: &str) {
        if !self.headers.iter().any(|h| h == column) {
            self.headers.push(column.to_string());
        }
    }
}

fn require(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MeridianError::MissingFile {
            path: path.display().to_string(),
        })
    }
}

/// Read a CSV file with a header row
pub fn read_csv(path: &Path) -> Result<CsvTable> {
    require(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers: csv::StringRecord = reader.headers()?.iter().map(str::trim).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(SourceRow::from_csv(&headers, &record?));
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "Read CSV file");
    Ok(CsvTable {
        headers: headers.iter().map(str::to_string).collect(),
        rows,
    })
}

/// Write rows as CSV in `headers` order; missing fields are written empty
pub fn write_csv(path: &Path, headers: &[String], rows: &[SourceRow]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(headers.iter().map(|h| row.text(h).unwrap_or("")))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a JSON file holding an array of objects
pub fn read_json_records(path: &Path) -> Result<Vec<Value>> {
    require(path)?;
    let content = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&content)? {
        Value::Array(items) => Ok(items),
        _ => Err(MeridianError::Validation(format!(
            "{} must contain a JSON array of records",
            path.display()
        ))),
    }
}

/// Read a JSON array of objects into rows; non-object entries are skipped
pub fn read_json_rows(path: &Path) -> Result<Vec<SourceRow>> {
    let records = read_json_records(path)?;
    let total = records.len();
    let rows: Vec<SourceRow> = records
        .iter()
        .filter_map(Value::as_object)
        .map(SourceRow::from_json)
        .collect();

    if rows.len() < total {
        tracing::warn!(
            path = %path.display(),
            skipped = total - rows.len(),
            "Skipped JSON entries that are not objects"
        );
    }
    Ok(rows)
}

/// Write any serializable value as pretty JSON
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_csv_round_trip_keeps_column_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("patients.csv");
        fs::write(&path, "patient_id,last_name,first_name\nP1,Doe,\n").unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.headers, vec!["patient_id", "last_name", "first_name"]);
        assert_eq!(table.rows[0].text("first_name"), None);

        let out = dir.path().join("out/patients_cleaned.csv");
        write_csv(&out, &table.headers, &table.rows).unwrap();
        let written = fs::read_to_string(&out).unwrap();
        assert_eq!(written, "patient_id,last_name,first_name\nP1,Doe,\n");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let result = read_csv(&dir.path().join("nope.csv"));
        assert!(matches!(result, Err(MeridianError::MissingFile { .. })));
    }

    #[test]
    fn test_json_rows_require_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("diagnoses.json");
        fs::write(&path, r#"{"diagnosis_id": "D1"}"#).unwrap();
        assert!(matches!(
            read_json_rows(&path),
            Err(MeridianError::Validation(_))
        ));

        fs::write(&path, r#"[{"diagnosis_id": "D1", "patient_id": 7}, 3]"#).unwrap();
        let rows = read_json_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("patient_id"), Some("7"));
    }
}

//! Cleaned datasets as a single SQLite database
//!
//! Each cleaned file found in the processed directory becomes one table of
//! `ehr_journeys_database.sqlite`, alongside the exported snapshot
//! encounters when present. Columns are stored as text in file order; JSON
//! datasets use the union of their object keys. Absent inputs are skipped.
//! An existing database at the target path is replaced.

use crate::adapters::files::layout;
use crate::adapters::files::snapshot::exported_table_path;
use crate::adapters::files::tabular::{read_csv, read_json_rows};
use crate::domain::{MeridianError, Result, SourceRow};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// File name of the exported database
pub const EXPORT_DATABASE_FILE: &str = "ehr_journeys_database.sqlite";

/// One table written to the export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedTable {
    pub table: String,
    pub source: String,
    pub columns: usize,
    pub rows: usize,
}

/// Everything an export wrote
#[derive(Debug, Clone, Serialize)]
pub struct SqliteExport {
    pub path: PathBuf,
    pub tables: Vec<ExportedTable>,
    /// Inputs that were not found
    pub skipped: Vec<String>,
}

impl SqliteExport {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

enum Format {
    Csv,
    Json,
}

/// Export the cleaned files under `processed_dir` into `database_path`
///
/// # Errors
///
/// Fails if none of the inputs exist, if an existing input cannot be read,
/// or if the database cannot be written.
pub fn export_cleaned_to_sqlite(processed_dir: &Path, database_path: &Path) -> Result<SqliteExport> {
    let sources = [
        ("patients", processed_dir.join(layout::PATIENTS_CLEANED), Format::Csv),
        ("diagnoses", processed_dir.join(layout::DIAGNOSES_CLEANED), Format::Json),
        ("medications", processed_dir.join(layout::MEDICATIONS_CLEANED), Format::Json),
        ("procedures", processed_dir.join(layout::PROCEDURES_CLEANED), Format::Csv),
        ("observations", processed_dir.join(layout::OBSERVATIONS_CLEANED), Format::Csv),
        ("encounters", exported_table_path(processed_dir, "encounters"), Format::Csv),
    ];

    let mut datasets = Vec::new();
    let mut skipped = Vec::new();
    for (table, path, format) in sources {
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "Export input not found, skipping");
            skipped.push(path.display().to_string());
            continue;
        }
        let (columns, rows) = match format {
            Format::Csv => {
                let csv = read_csv(&path)?;
                (csv.headers, csv.rows)
            }
            Format::Json => {
                let rows = read_json_rows(&path)?;
                (union_columns(&rows), rows)
            }
        };
        datasets.push((table, path, columns, rows));
    }

    if datasets.is_empty() {
        return Err(MeridianError::MissingFile {
            path: format!("cleaned files in {}", processed_dir.display()),
        });
    }

    if database_path.exists() {
        std::fs::remove_file(database_path)?;
    }
    if let Some(parent) = database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut conn = Connection::open(database_path)?;
    let tx = conn.transaction()?;
    let mut tables = Vec::with_capacity(datasets.len());
    for (table, path, columns, rows) in &datasets {
        write_table(&tx, table, columns, rows)?;
        tracing::info!(table = %table, rows = rows.len(), "Exported cleaned dataset");
        tables.push(ExportedTable {
            table: table.to_string(),
            source: path.display().to_string(),
            columns: columns.len(),
            rows: rows.len(),
        });
    }
    tx.commit()?;

    Ok(SqliteExport {
        path: database_path.to_path_buf(),
        tables,
        skipped,
    })
}

fn union_columns(rows: &[SourceRow]) -> Vec<String> {
    let names: BTreeSet<&str> = rows.iter().flat_map(SourceRow::field_names).collect();
    names.into_iter().map(str::to_string).collect()
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn write_table(
    conn: &Connection,
    table: &str,
    columns: &[String],
    rows: &[SourceRow],
) -> Result<()> {
    if columns.is_empty() {
        return Err(MeridianError::Validation(format!(
            "Cannot export '{table}' without columns"
        )));
    }

    let definitions: Vec<String> = columns.iter().map(|c| format!("{} TEXT", quote(c))).collect();
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {name}; CREATE TABLE {name} ({defs});",
        name = quote(table),
        defs = definitions.join(", ")
    ))?;

    let placeholders = vec!["?"; columns.len()].join(", ");
    let names: Vec<String> = columns.iter().map(|c| quote(c)).collect();
    let mut insert = conn.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        names.join(", "),
        placeholders
    ))?;
    for row in rows {
        insert.execute(params_from_iter(columns.iter().map(|c| row.text(c))))?;
    }
    Ok(())
}

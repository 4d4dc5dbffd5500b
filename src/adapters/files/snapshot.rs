//! Relational snapshot extraction
//!
//! Every table of the SQLite snapshot is exported to `sqlite_<table>.csv`
//! and its structure described in `sqlite_database_info.json`. A table that
//! cannot be read is logged and left out; it does not fail the export.

use crate::adapters::files::tabular::write_json;
use crate::domain::{MeridianError, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the snapshot structure description
pub const SNAPSHOT_INFO_FILE: &str = "sqlite_database_info.json";

const SAMPLE_ROWS: usize = 5;

/// Structure of one exported table
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotTableInfo {
    pub row_count: usize,
    pub columns: Vec<String>,
    pub sample_data: Vec<Map<String, Value>>,
}

/// Structure of the whole snapshot, as written to [`SNAPSHOT_INFO_FILE`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotInfo {
    pub tables: Vec<String>,
    pub table_data: BTreeMap<String, SnapshotTableInfo>,
}

/// Path of the CSV a snapshot table is exported to
pub fn exported_table_path(output_dir: &Path, table: &str) -> PathBuf {
    output_dir.join(format!("sqlite_{table}.csv"))
}

/// Export every table of the snapshot at `sqlite_path` into `output_dir`
///
/// # Errors
///
/// Returns [`MeridianError::MissingFile`] if the snapshot does not exist and
/// [`MeridianError::Snapshot`] if it cannot be opened or listed.
pub fn export_snapshot(sqlite_path: &Path, output_dir: &Path) -> Result<SnapshotInfo> {
    if !sqlite_path.is_file() {
        return Err(MeridianError::MissingFile {
            path: sqlite_path.display().to_string(),
        });
    }

    let conn = Connection::open_with_flags(sqlite_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let tables = list_tables(&conn)?;
    std::fs::create_dir_all(output_dir)?;

    let mut info = SnapshotInfo {
        tables: tables.clone(),
        table_data: BTreeMap::new(),
    };

    for table in &tables {
        match export_table(&conn, table, &exported_table_path(output_dir, table)) {
            Ok(table_info) => {
                tracing::info!(
                    table = %table,
                    rows = table_info.row_count,
                    "Exported snapshot table"
                );
                info.table_data.insert(table.clone(), table_info);
            }
            Err(e) => {
                tracing::error!(table = %table, error = %e, "Error reading snapshot table");
            }
        }
    }

    write_json(&output_dir.join(SNAPSHOT_INFO_FILE), &info)?;
    Ok(info)
}

fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<usize, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

fn export_table(conn: &Connection, table: &str, csv_path: &Path) -> Result<SnapshotTableInfo> {
    let sql = format!("SELECT * FROM \"{}\"", table.replace('"', "\"\""));
    let mut stmt = conn.prepare(&sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut writer = csv::Writer::from_path(csv_path)?;
    writer.write_record(&columns)?;

    let mut row_count = 0;
    let mut sample_data = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(columns.len());
        let mut sample = Map::new();
        for (idx, column) in columns.iter().enumerate() {
            let value = json_value(row.get_ref(idx)?);
            cells.push(match &value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            if sample_data.len() < SAMPLE_ROWS {
                sample.insert(column.clone(), value);
            }
        }
        writer.write_record(&cells)?;
        if sample_data.len() < SAMPLE_ROWS {
            sample_data.push(sample);
        }
        row_count += 1;
    }
    writer.flush()?;

    Ok(SnapshotTableInfo {
        row_count,
        columns,
        sample_data,
    })
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

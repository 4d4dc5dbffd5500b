//! Source and intermediate files
//!
//! - [`tabular`] - CSV/JSON readers and writers
//! - [`snapshot`] - SQLite snapshot export
//! - [`sqlite_export`] - cleaned datasets written back out as SQLite
//! - [`layout`] - file names under the raw and processed roots

pub mod layout;
pub mod snapshot;
pub mod sqlite_export;
pub mod tabular;

pub use snapshot::{export_snapshot, SnapshotInfo};
pub use sqlite_export::{export_cleaned_to_sqlite, SqliteExport, EXPORT_DATABASE_FILE};
pub use tabular::{read_csv, read_json_records, read_json_rows, write_csv, write_json, CsvTable};

//! Export-sqlite command implementation
//!
//! This module implements the `export-sqlite` command, which writes the
//! cleaned datasets into a single SQLite database.

use crate::adapters::files::{export_cleaned_to_sqlite, EXPORT_DATABASE_FILE};
use crate::config::read_config;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the export-sqlite command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Override the processed data directory to read from
    #[arg(long)]
    pub processed_dir: Option<PathBuf>,

    /// Database file to write (default: <processed>/ehr_journeys_database.sqlite)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ExportArgs {
    /// Execute the export-sqlite command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match read_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let processed = self
            .processed_dir
            .clone()
            .unwrap_or(config.paths.processed_data);
        let database = self
            .output
            .clone()
            .unwrap_or_else(|| processed.join(EXPORT_DATABASE_FILE));
        tracing::info!(
            processed_dir = %processed.display(),
            database = %database.display(),
            "Exporting cleaned data to SQLite"
        );

        let export = match export_cleaned_to_sqlite(&processed, &database) {
            Ok(export) => export,
            Err(e) => {
                tracing::error!(error = %e, "SQLite export failed");
                println!("Export failed");
                println!("   Error: {e}");
                return Ok(1);
            }
        };

        println!("{:<20} {:>12}", "Table", "Rows");
        println!("{}", "-".repeat(33));
        for table in &export.tables {
            println!("{:<20} {:>12}", table.table, table.rows);
        }
        println!("{}", "-".repeat(33));
        println!("{:<20} {:>12}", "Total", export.total_rows());
        for skipped in &export.skipped {
            println!("Skipped (not found): {skipped}");
        }
        println!();
        println!("Exported cleaned data to {}", export.path.display());
        Ok(0)
    }
}

//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "meridian.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("Initializing Meridian configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Create a .env file setting MERIDIAN_DATABASE_URL");
                println!("  3. Place the raw source files under data/raw");
                println!("  4. Validate configuration: meridian validate-config");
                println!("  5. Run the pipeline: meridian run");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Meridian Configuration File

[application]
log_level = "info"
dry_run = false

[paths]
raw_data = "data/raw"
processed_data = "data/processed"
reports = "data/quality_reports"
output = "output"
snapshot_file = "ehr_journeys_database.sqlite"
queries_file = "sql/queries.sql"

[loading]
batch_size = 1000

[postgresql]
connection_string = "${MERIDIAN_DATABASE_URL}"
max_connections = 5
ssl_mode = "prefer"

[logging]
local_enabled = true
local_path = "logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Meridian Configuration File
# Healthcare data ETL pipeline
#
# Cleans the raw source files, loads them into PostgreSQL and runs the
# analytical queries. Every value can be overridden with an environment
# variable named MERIDIAN_<SECTION>_<KEY>, e.g. MERIDIAN_LOADING_BATCH_SIZE.

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Dry run mode: load into an in-memory warehouse, nothing reaches PostgreSQL.
# The [postgresql] section is optional when this is enabled.
dry_run = false

# ============================================================================
# File Locations
# ============================================================================
[paths]
# Raw sources: patients.csv, observations.csv, procedures.csv,
# diagnoses.json, medications.json
raw_data = "data/raw"

# Cleaned files and the snapshot export (sqlite_<table>.csv)
processed_data = "data/processed"

# data_quality_report_<ts>.json and load_report_<ts>.json
reports = "data/quality_reports"

# query_results_<ts>.txt and final_report.md
output = "output"

# Relational snapshot, relative to raw_data (optional)
snapshot_file = "ehr_journeys_database.sqlite"

# Analytical queries, each introduced by a "-- Query N: Title" marker
queries_file = "sql/queries.sql"

# ============================================================================
# Loading
# ============================================================================
[loading]
# Rows per insert batch (1-10000). BATCH_SIZE is honoured as well.
batch_size = 1000

# ============================================================================
# PostgreSQL Warehouse
# ============================================================================
[postgresql]
# Connection string format: postgresql://[user[:password]@][host][:port][/dbname]
# Keep credentials out of this file; they are never written to the logs.
connection_string = "${MERIDIAN_DATABASE_URL}"

# Connection pool settings
max_connections = 5                 # Maximum connections in pool (1-100)
connection_timeout_seconds = 30     # Timeout for acquiring a connection
statement_timeout_seconds = 60      # Timeout for SQL statement execution

# SSL/TLS mode: disable | allow | prefer | require | verify-ca | verify-full
ssl_mode = "prefer"

# ============================================================================
# Logging Configuration
# ============================================================================
[logging]
# Enable JSON file logging next to the console output
local_enabled = true

# Log directory
local_path = "logs"

# Log rotation: daily | hourly | never
local_rotation = "daily"
"#
        .to_string()
    }
}

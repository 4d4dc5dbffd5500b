//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Meridian configuration file.

use crate::config::load_config;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        // Loading validates as well
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        println!("Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  Raw Data: {}", config.paths.raw_data.display());
        println!("  Processed Data: {}", config.paths.processed_data.display());
        println!("  Reports: {}", config.paths.reports.display());
        println!("  Output: {}", config.paths.output.display());
        println!("  Snapshot: {}", config.paths.snapshot_path().display());
        println!("  Queries: {}", config.paths.queries_file.display());
        println!("  Batch Size: {}", config.loading.batch_size);

        match config.postgresql {
            Some(ref pg) => {
                println!(
                    "  PostgreSQL: {}",
                    pg.connection_string.expose_secret().redacted_dsn()
                );
                println!("  Max Connections: {}", pg.max_connections);
                println!("  SSL Mode: {}", pg.ssl_mode);
            }
            None => println!("  PostgreSQL: not configured (in-memory warehouse)"),
        }

        if config.logging.local_enabled {
            println!(
                "  File Logging: {} ({})",
                config.logging.local_path, config.logging.local_rotation
            );
        } else {
            println!("  File Logging: disabled");
        }
        println!();
        Ok(0)
    }
}

//! Run command implementation
//!
//! This module implements the `run` command: the whole pipeline or one step.

use crate::adapters::database::create_warehouse_store;
use crate::config::{read_config, MeridianConfig};
use crate::core::pipeline::{Pipeline, PipelineReport, StepSelection};
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// Pipeline step selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunStep {
    All,
    Cleaning,
    Loading,
    Queries,
}

impl From<RunStep> for StepSelection {
    fn from(step: RunStep) -> Self {
        match step {
            RunStep::All => StepSelection::All,
            RunStep::Cleaning => StepSelection::Cleaning,
            RunStep::Loading => StepSelection::Loading,
            RunStep::Queries => StepSelection::Queries,
        }
    }
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Step to run
    #[arg(long, value_enum, default_value_t = RunStep::All)]
    pub step: RunStep,

    /// Override the raw data directory
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// Override the output directory for query results and the final report
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Skip the prerequisites check when running a single step
    #[arg(long)]
    pub skip_prerequisites: bool,

    /// Load into an in-memory warehouse instead of PostgreSQL
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Apply command line overrides to `config`
    pub fn apply_overrides(&self, config: &mut MeridianConfig) {
        if let Some(path) = &self.data_path {
            tracing::info!(path = %path.display(), "Overriding raw data path from CLI");
            config.paths.raw_data = path.clone();
        }
        if let Some(dir) = &self.output_dir {
            tracing::info!(path = %dir.display(), "Overriding output directory from CLI");
            config.paths.output = dir.clone();
        }
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }
    }

    /// Execute the run command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(step = ?self.step, "Starting run command");

        let mut config = match read_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };
        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2); // Configuration error exit code
        }

        if config.application.dry_run {
            println!("DRY RUN MODE - nothing will be written to PostgreSQL");
            println!();
        }

        let store = match create_warehouse_store(&config) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create warehouse store");
                eprintln!("Failed to initialize warehouse: {e}");
                return Ok(2);
            }
        };

        let paths = config.paths.clone();
        let report = Pipeline::new(config, store)
            .run(self.step.into(), self.skip_prerequisites)
            .await;

        print_summary(&report);
        if report.is_successful() {
            println!();
            println!("Processed files: {}", paths.processed_data.display());
            println!("Quality reports: {}", paths.reports.display());
            println!("Output:          {}", paths.output.display());
        }
        Ok(report.exit_code())
    }
}

fn print_summary(report: &PipelineReport) {
    println!();
    println!("{}", "=".repeat(60));
    println!("MERIDIAN PIPELINE SUMMARY");
    println!("{}", "=".repeat(60));

    for step in &report.steps {
        match &step.error {
            None => println!(
                "  [ok]     {:<22} {:>8.2}s  {}",
                step.step.name(),
                step.duration.as_secs_f64(),
                step.detail
            ),
            Some(error) => println!(
                "  [failed] {:<22} {:>8.2}s  {}",
                step.step.name(),
                step.duration.as_secs_f64(),
                error
            ),
        }
    }

    if !report.database_stats.is_empty() {
        println!();
        println!("Database Statistics:");
        let mut total = 0;
        for (table, rows) in &report.database_stats {
            if *rows > 0 {
                println!("  {table:<14} {rows:>10} records");
                total += rows;
            }
        }
        println!();
        println!("Total Records: {total}");
    }

    println!();
    if report.is_successful() {
        println!("Pipeline completed in {:.2}s", report.duration.as_secs_f64());
    } else {
        println!("Pipeline failed");
    }
}

//! Pipeline orchestration
//!
//! Runs the steps in order and stops at the first failure:
//!
//! 1. **Prerequisites Check**: raw directory, raw files, storage connection
//! 2. **Database Setup**: tables and the integrity function
//! 3. **Data Cleaning**: cleaned files and quality report
//! 4. **Data Loading**: warehouse load and load report
//! 5. **Query Execution**: analytical queries and results file
//! 6. **Final Report**: `final_report.md`
//!
//! A single step runs on its own, preceded by the prerequisites check unless
//! that is skipped.

use crate::adapters::database::WarehouseStore;
use crate::adapters::files::layout;
use crate::config::MeridianConfig;
use crate::core::cleaning::DataCleaner;
use crate::core::load::DataLoader;
use crate::core::queries::QueryRunner;
use crate::core::verification::IntegrityStatus;
use crate::domain::{MeridianError, Result};
use crate::logging::OperationTimer;
use chrono::Local;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which part of the pipeline to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSelection {
    All,
    Cleaning,
    Loading,
    Queries,
}

impl fmt::Display for StepSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepSelection::All => "all",
            StepSelection::Cleaning => "cleaning",
            StepSelection::Loading => "loading",
            StepSelection::Queries => "queries",
        };
        f.write_str(s)
    }
}

/// Pipeline steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Prerequisites,
    DatabaseSetup,
    Cleaning,
    Loading,
    Queries,
    FinalReport,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Prerequisites,
        Step::DatabaseSetup,
        Step::Cleaning,
        Step::Loading,
        Step::Queries,
        Step::FinalReport,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::Prerequisites => "Prerequisites Check",
            Step::DatabaseSetup => "Database Setup",
            Step::Cleaning => "Data Cleaning",
            Step::Loading => "Data Loading",
            Step::Queries => "Query Execution",
            Step::FinalReport => "Final Report",
        }
    }

    fn operation(&self) -> &'static str {
        match self {
            Step::Prerequisites => "prerequisites",
            Step::DatabaseSetup => "database_setup",
            Step::Cleaning => "cleaning",
            Step::Loading => "loading",
            Step::Queries => "queries",
            Step::FinalReport => "final_report",
        }
    }
}

/// Result of one executed step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: Step,
    pub duration: Duration,
    pub detail: String,
    pub error: Option<String>,
    /// The failure was the storage being unreachable
    pub connection_failure: bool,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything a pipeline run produced
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub steps: Vec<StepOutcome>,
    pub duration: Duration,
    pub integrity: Option<IntegrityStatus>,
    pub database_stats: BTreeMap<String, i64>,
    pub final_report: Option<PathBuf>,
}

impl PipelineReport {
    pub fn is_successful(&self) -> bool {
        self.steps.iter().all(StepOutcome::is_success)
    }

    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| !s.is_success())
    }

    /// 0 on success, 4 when storage was unreachable, 1 for any other failure
    pub fn exit_code(&self) -> i32 {
        match self.failed_step() {
            None => 0,
            Some(step) if step.connection_failure => 4,
            Some(_) => 1,
        }
    }
}

/// Runs the pipeline against one warehouse
pub struct Pipeline {
    config: MeridianConfig,
    store: Arc<dyn WarehouseStore>,
}

impl Pipeline {
    pub fn new(config: MeridianConfig, store: Arc<dyn WarehouseStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &MeridianConfig {
        &self.config
    }

    /// Run the selected steps
    pub async fn run(&self, selection: StepSelection, skip_prerequisites: bool) -> PipelineReport {
        let started = Instant::now();
        tracing::info!(
            step = %selection,
            backend = self.store.backend_name(),
            raw_data = %self.config.paths.raw_data.display(),
            "Starting pipeline"
        );

        let steps: Vec<Step> = match selection {
            StepSelection::All => Step::ALL.to_vec(),
            single => {
                let step = match single {
                    StepSelection::Cleaning => Step::Cleaning,
                    StepSelection::Loading => Step::Loading,
                    _ => Step::Queries,
                };
                if skip_prerequisites {
                    vec![step]
                } else {
                    vec![Step::Prerequisites, step]
                }
            }
        };

        let mut report = PipelineReport::default();
        for step in steps {
            tracing::info!(step = step.name(), "Executing step");
            let timer = OperationTimer::start(step.operation());
            let result = self.execute(step, &mut report).await;
            let duration = timer.finish(&result);

            let outcome = match result {
                Ok(detail) => {
                    tracing::info!(step = step.name(), detail = %detail, "Completed step");
                    StepOutcome {
                        step,
                        duration,
                        detail,
                        error: None,
                        connection_failure: false,
                    }
                }
                Err(e) => {
                    tracing::error!(step = step.name(), error = %e, "Pipeline failed at step");
                    StepOutcome {
                        step,
                        duration,
                        detail: String::new(),
                        error: Some(e.to_string()),
                        connection_failure: e.is_connection(),
                    }
                }
            };

            let failed = !outcome.is_success();
            report.steps.push(outcome);
            if failed {
                break;
            }
        }

        report.duration = started.elapsed();
        if report.is_successful() {
            tracing::info!(duration_secs = report.duration.as_secs(), "Pipeline completed successfully");
        }
        report
    }

    async fn execute(&self, step: Step, report: &mut PipelineReport) -> Result<String> {
        match step {
            Step::Prerequisites => {
                self.check_prerequisites().await?;
                Ok("all prerequisites met".to_string())
            }
            Step::DatabaseSetup => {
                self.store.ensure_schema().await?;
                Ok(format!("schema ready on {}", self.store.backend_name()))
            }
            Step::Cleaning => {
                let outcome = DataCleaner::from_config(&self.config).run()?;
                Ok(format!(
                    "overall quality {:.2}%, report {}",
                    outcome.quality.overall.overall_quality_score,
                    outcome.report_path.display()
                ))
            }
            Step::Loading => {
                let outcome = DataLoader::from_config(self.store.clone(), &self.config)
                    .load_all()
                    .await?;
                report.integrity = Some(outcome.integrity.status);
                Ok(format!(
                    "{} rows loaded, integrity {}",
                    outcome.summary.total_loaded(),
                    outcome.integrity.status
                ))
            }
            Step::Queries => {
                let outcome = QueryRunner::from_config(self.store.clone(), &self.config)
                    .run_all()
                    .await?;
                Ok(format!(
                    "{} queries, {} failed, results {}",
                    outcome.executions.len(),
                    outcome.failed(),
                    outcome.results_path.display()
                ))
            }
            Step::FinalReport => {
                report.database_stats = self.store.table_stats().await?;
                let path = self.write_final_report(report)?;
                let detail = path.display().to_string();
                report.final_report = Some(path);
                Ok(detail)
            }
        }
    }

    /// Raw directory and files present, storage reachable
    pub async fn check_prerequisites(&self) -> Result<()> {
        let raw_dir = &self.config.paths.raw_data;
        if !raw_dir.is_dir() {
            return Err(MeridianError::MissingFile {
                path: raw_dir.display().to_string(),
            });
        }

        let missing: Vec<&str> = layout::REQUIRED_RAW_FILES
            .iter()
            .copied()
            .filter(|name| !raw_dir.join(name).is_file())
            .collect();
        if !missing.is_empty() {
            tracing::error!(files = ?missing, "Missing required data files");
            return Err(MeridianError::MissingFile {
                path: missing
                    .iter()
                    .map(|name| raw_dir.join(name).display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        self.store.test_connection().await?;
        tracing::info!("All prerequisites met");
        Ok(())
    }

    fn write_final_report(&self, report: &PipelineReport) -> Result<PathBuf> {
        let path = self.config.paths.output.join(layout::FINAL_REPORT);
        std::fs::create_dir_all(&self.config.paths.output)?;
        std::fs::write(&path, render_final_report(report))?;
        tracing::info!(path = %path.display(), "Final report generated");
        Ok(path)
    }
}

/// Markdown summary of a pipeline run
pub fn render_final_report(report: &PipelineReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Meridian - Final Report\n");
    let _ = writeln!(out, "Generated: {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"));

    let _ = writeln!(out, "## Database Statistics\n");
    for (table, rows) in &report.database_stats {
        let _ = writeln!(out, "- **{table}**: {rows} records");
    }
    let total: i64 = report.database_stats.values().sum();
    let _ = writeln!(out, "\nTotal records: {total}");

    let _ = writeln!(out, "\n## Steps\n");
    for step in &report.steps {
        let status = if step.is_success() { "Completed" } else { "Failed" };
        let _ = writeln!(
            out,
            "- {}: {} ({:.2}s)",
            step.step.name(),
            status,
            step.duration.as_secs_f64()
        );
    }

    let integrity = report
        .integrity
        .map(|s| s.to_string())
        .unwrap_or_else(|| "Not checked".to_string());
    let _ = writeln!(out, "\n## Data Quality Summary\n");
    let _ = writeln!(out, "- Referential integrity: {integrity}");
    out
}

//! Run analysis results and their text rendering

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

/// Queries slower than this are flagged
pub const SLOW_QUERY_SECONDS: f64 = 1.0;

/// Messages kept per log level
pub const MAX_LOG_MESSAGES: usize = 20;

/// Overall verdict of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Passed,
    Warning,
    Failed,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Passed => "PASSED",
            HealthStatus::Warning => "WARNING",
            HealthStatus::Failed => "FAILED",
        })
    }
}

/// What the JSON log files say about past runs
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogAnalysis {
    pub files: usize,
    pub latest: Option<String>,
    /// `COMPLETED` durations in milliseconds, per operation
    pub operations: BTreeMap<String, Vec<u64>>,
    pub error_count: usize,
    pub warning_count: usize,
    /// First [`MAX_LOG_MESSAGES`] errors
    pub errors: Vec<String>,
    /// First [`MAX_LOG_MESSAGES`] warnings
    pub warnings: Vec<String>,
    /// Lines that were not JSON log records
    pub unparsed_lines: usize,
}

impl LogAnalysis {
    pub fn average_ms(&self, operation: &str) -> Option<f64> {
        let durations = self.operations.get(operation)?;
        if durations.is_empty() {
            return None;
        }
        Some(durations.iter().sum::<u64>() as f64 / durations.len() as f64)
    }
}

/// Summary of the latest data quality report
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityAnalysis {
    pub report_file: String,
    pub overall_score: f64,
    pub table_scores: BTreeMap<String, f64>,
    /// Non-zero `*missing*` counters, per dataset
    pub missing_data: BTreeMap<String, BTreeMap<String, u64>>,
    /// Cleaning checks reported as not applied
    pub validation_issues: Vec<String>,
}

/// Summary of the latest load report
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadAnalysis {
    pub report_file: String,
    pub total_records_loaded: u64,
    pub success_rate: f64,
    pub integrity_status: Option<String>,
    pub encounter_source: Option<String>,
    pub errors: Vec<String>,
}

/// One query from the latest results file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryTiming {
    pub title: String,
    /// `None` when the query failed
    pub seconds: Option<f64>,
}

impl QueryTiming {
    pub fn is_slow(&self) -> bool {
        self.seconds.is_some_and(|s| s > SLOW_QUERY_SECONDS)
    }
}

/// Summary of the latest query results file
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryAnalysis {
    pub output_file: String,
    pub queries: Vec<QueryTiming>,
}

impl QueryAnalysis {
    pub fn executed(&self) -> usize {
        self.queries.iter().filter(|q| q.seconds.is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.queries.len() - self.executed()
    }

    pub fn slow(&self) -> impl Iterator<Item = &QueryTiming> {
        self.queries.iter().filter(|q| q.is_slow())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    Ok,
    Warning,
    Missing,
}

/// Presence of one expected output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCheck {
    pub description: String,
    pub count: usize,
    pub empty: usize,
    pub status: FileStatus,
}

/// Everything one analysis found
#[derive(Debug, Clone, Serialize)]
pub struct RunAnalysis {
    pub generated_at: String,
    pub status: HealthStatus,
    pub logs: Option<LogAnalysis>,
    pub quality: Option<QualityAnalysis>,
    pub load: Option<LoadAnalysis>,
    pub queries: Option<QueryAnalysis>,
    pub files: Vec<FileCheck>,
    /// Record counts of the cleaned datasets
    pub completeness: BTreeMap<String, usize>,
    /// Problems that fail the analysis
    pub issues: Vec<String>,
    /// Problems worth a look that do not fail it
    pub recommendations: Vec<String>,
}

impl RunAnalysis {
    pub(crate) fn new(generated: &DateTime<Local>) -> Self {
        Self {
            generated_at: generated.format("%Y-%m-%d %H:%M:%S").to_string(),
            status: HealthStatus::Passed,
            logs: None,
            quality: None,
            load: None,
            queries: None,
            files: Vec::new(),
            completeness: BTreeMap::new(),
            issues: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    /// Failed with any issue, warning with any recommendation
    pub(crate) fn settle(&mut self) {
        self.status = if !self.issues.is_empty() {
            HealthStatus::Failed
        } else if !self.recommendations.is_empty() {
            HealthStatus::Warning
        } else {
            HealthStatus::Passed
        };
    }

    /// Exit code for the `analyze` command
    pub fn exit_code(&self) -> i32 {
        match self.status {
            HealthStatus::Failed => 1,
            HealthStatus::Passed | HealthStatus::Warning => 0,
        }
    }

    /// Plain-text report
    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(72);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "MERIDIAN RUN ANALYSIS");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Generated: {}", self.generated_at);
        let _ = writeln!(out, "Status: {}", self.status);
        let _ = writeln!(out);

        section(&mut out, "PIPELINE LOGS");
        match &self.logs {
            Some(logs) => {
                let _ = writeln!(out, "Log files analyzed: {}", logs.files);
                let _ = writeln!(out, "Latest log: {}", logs.latest.as_deref().unwrap_or("N/A"));
                let _ = writeln!(out, "Errors: {}  Warnings: {}", logs.error_count, logs.warning_count);
                if !logs.operations.is_empty() {
                    let _ = writeln!(out, "\nOperation durations:");
                    for operation in logs.operations.keys() {
                        if let Some(avg) = logs.average_ms(operation) {
                            let _ = writeln!(out, "  {operation}: {:.3}s average", avg / 1000.0);
                        }
                    }
                }
            }
            None => {
                let _ = writeln!(out, "File logging disabled");
            }
        }
        let _ = writeln!(out);

        section(&mut out, "DATA QUALITY");
        if let Some(quality) = &self.quality {
            let _ = writeln!(out, "Overall quality score: {:.2}%", quality.overall_score);
            let _ = writeln!(out, "Quality report: {}", quality.report_file);
            if !quality.table_scores.is_empty() {
                let _ = writeln!(out, "\nDataset scores:");
                for (dataset, score) in &quality.table_scores {
                    let _ = writeln!(out, "  {dataset}: {score:.2}%");
                }
            }
            for (dataset, counters) in &quality.missing_data {
                for (counter, value) in counters {
                    let _ = writeln!(out, "  {dataset}.{counter}: {value}");
                }
            }
        }
        let _ = writeln!(out);

        section(&mut out, "LOAD");
        if let Some(load) = &self.load {
            let _ = writeln!(out, "Load report: {}", load.report_file);
            let _ = writeln!(out, "Records loaded: {}", load.total_records_loaded);
            let _ = writeln!(out, "Success rate: {:.2}%", load.success_rate);
            if let Some(source) = &load.encounter_source {
                let _ = writeln!(out, "Encounter source: {source}");
            }
            let _ = writeln!(
                out,
                "Referential integrity: {}",
                load.integrity_status.as_deref().unwrap_or("N/A")
            );
        }
        let _ = writeln!(out);

        section(&mut out, "QUERY PERFORMANCE");
        if let Some(queries) = &self.queries {
            let _ = writeln!(out, "Queries executed: {}", queries.executed());
            let _ = writeln!(out, "Queries failed: {}", queries.failed());
            let _ = writeln!(out, "Output file: {}", queries.output_file);
            if !queries.queries.is_empty() {
                let _ = writeln!(out, "\nExecution times:");
                for query in &queries.queries {
                    match query.seconds {
                        Some(seconds) => {
                            let flag = if query.is_slow() { "SLOW" } else { "OK" };
                            let _ = writeln!(out, "  {}: {seconds:.3}s ({flag})", query.title);
                        }
                        None => {
                            let _ = writeln!(out, "  {}: ERROR", query.title);
                        }
                    }
                }
            }
        }
        let _ = writeln!(out);

        section(&mut out, "SYSTEM HEALTH");
        if !self.completeness.is_empty() {
            let total: usize = self.completeness.values().sum();
            let _ = writeln!(out, "Total records: {total}");
            for (dataset, count) in &self.completeness {
                let _ = writeln!(out, "  - {dataset}: {count}");
            }
        }
        if !self.files.is_empty() {
            let _ = writeln!(out, "\nExpected outputs:");
            for file in &self.files {
                let label = match file.status {
                    FileStatus::Ok => "OK",
                    FileStatus::Warning => "WARNING",
                    FileStatus::Missing => "MISSING",
                };
                let _ = writeln!(out, "  {label} {}: {} files", file.description, file.count);
            }
        }
        let _ = writeln!(out);

        if self.issues.is_empty() && self.recommendations.is_empty() {
            let _ = writeln!(out, "No issues detected");
        } else {
            section(&mut out, "ISSUES AND RECOMMENDATIONS");
            for issue in &self.issues {
                let _ = writeln!(out, "ERROR: {issue}");
            }
            for recommendation in &self.recommendations {
                let _ = writeln!(out, "RECOMMENDATION: {recommendation}");
            }
        }
        let _ = writeln!(out, "{rule}");
        out
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "-".repeat(40));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn analysis() -> RunAnalysis {
        RunAnalysis::new(&Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
    }

    #[test]
    fn test_status_follows_issues_then_recommendations() {
        let mut run = analysis();
        run.settle();
        assert_eq!(run.status, HealthStatus::Passed);

        run.recommendations.push("Missing Query results".to_string());
        run.settle();
        assert_eq!(run.status, HealthStatus::Warning);
        assert_eq!(run.exit_code(), 0);

        run.issues.push("No load reports found".to_string());
        run.settle();
        assert_eq!(run.status, HealthStatus::Failed);
        assert_eq!(run.exit_code(), 1);
    }

    #[test]
    fn test_render_flags_slow_and_failed_queries() {
        let mut run = analysis();
        run.queries = Some(QueryAnalysis {
            output_file: "query_results_20240102_030405.txt".to_string(),
            queries: vec![
                QueryTiming {
                    title: "Query 1: Demographics".to_string(),
                    seconds: Some(0.25),
                },
                QueryTiming {
                    title: "Query 2: Providers".to_string(),
                    seconds: Some(2.5),
                },
                QueryTiming {
                    title: "Query 3: Labs".to_string(),
                    seconds: None,
                },
            ],
        });
        run.settle();

        let text = run.render();
        assert!(text.contains("Generated: 2024-01-02 03:04:05"));
        assert!(text.contains("Queries executed: 2"));
        assert!(text.contains("Query 2: Providers: 2.500s (SLOW)"));
        assert!(text.contains("Query 1: Demographics: 0.250s (OK)"));
        assert!(text.contains("Query 3: Labs: ERROR"));
        assert!(text.contains("No issues detected"));
    }

    #[test]
    fn test_log_average() {
        let mut logs = LogAnalysis::default();
        logs.operations.insert("cleaning".to_string(), vec![1000, 3000]);
        assert_eq!(logs.average_ms("cleaning"), Some(2000.0));
        assert_eq!(logs.average_ms("loading"), None);
    }
}

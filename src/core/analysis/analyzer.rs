//! Collects the artifacts of past runs into a [`RunAnalysis`]
//!
//! Missing or unreadable reports are recorded as issues rather than
//! returned as errors, so an analysis always completes.

use super::report::{
    FileCheck, FileStatus, LoadAnalysis, LogAnalysis, QualityAnalysis, QueryAnalysis,
    QueryTiming, RunAnalysis, MAX_LOG_MESSAGES,
};
use crate::adapters::files::layout;
use crate::adapters::files::{read_csv, read_json_records, write_json};
use crate::config::MeridianConfig;
use crate::domain::Result;
use crate::logging::LOG_FILE_NAME;
use chrono::Local;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const INTEGRITY_CHECK_FLAG: &str = "referential_integrity_checked";

/// Reads reports, results and logs left behind by pipeline runs
pub struct RunAnalyzer {
    processed_dir: PathBuf,
    reports_dir: PathBuf,
    output_dir: PathBuf,
    logs_dir: Option<PathBuf>,
}

impl RunAnalyzer {
    pub fn new(
        processed_dir: impl Into<PathBuf>,
        reports_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        logs_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            processed_dir: processed_dir.into(),
            reports_dir: reports_dir.into(),
            output_dir: output_dir.into(),
            logs_dir,
        }
    }

    pub fn from_config(config: &MeridianConfig) -> Self {
        let logs_dir = config
            .logging
            .local_enabled
            .then(|| PathBuf::from(&config.logging.local_path));
        Self::new(
            &config.paths.processed_data,
            &config.paths.reports,
            &config.paths.output,
            logs_dir,
        )
    }

    pub fn analyze(&self) -> RunAnalysis {
        let mut run = RunAnalysis::new(&Local::now());

        if let Some(dir) = &self.logs_dir {
            run.logs = self.analyze_logs(dir, &mut run.issues);
        }
        run.quality = self.analyze_quality(&mut run.issues);
        run.load = self.analyze_load(&mut run.issues);
        run.queries = self.analyze_queries(&mut run.issues);
        self.check_files(&mut run);
        self.count_records(&mut run);

        // Integrity is checked by the load step, not during cleaning
        let integrity_checked = run
            .load
            .as_ref()
            .is_some_and(|load| load.integrity_status.is_some());
        if let Some(quality) = &run.quality {
            for issue in &quality.validation_issues {
                if integrity_checked && issue == INTEGRITY_CHECK_FLAG {
                    continue;
                }
                run.recommendations.push(format!("Cleaning check not applied: {issue}"));
            }
        }
        if let Some(load) = &run.load {
            for error in &load.errors {
                run.issues.push(format!("Load error: {error}"));
            }
            match load.integrity_status.as_deref() {
                Some("FAILED") => run
                    .issues
                    .push("Referential integrity check produced no result".to_string()),
                Some("WARNING") => run
                    .recommendations
                    .push("Orphaned rows found by the integrity check".to_string()),
                _ => {}
            }
        }
        if let Some(queries) = &run.queries {
            for query in queries.slow() {
                run.recommendations.push(format!(
                    "Query '{}' took {:.3}s (slow)",
                    query.title,
                    query.seconds.unwrap_or_default()
                ));
            }
            if queries.failed() > 0 {
                run.recommendations
                    .push(format!("{} queries failed", queries.failed()));
            }
        }

        run.settle();
        tracing::info!(
            status = %run.status,
            issues = run.issues.len(),
            recommendations = run.recommendations.len(),
            "Run analysis complete"
        );
        run
    }

    /// Write the analysis as `run_analysis_<ts>.txt` and `.json` into the reports directory
    pub fn save(&self, run: &RunAnalysis) -> Result<PathBuf> {
        let now = Local::now();
        let text_path = layout::timestamped(&self.reports_dir, "run_analysis", &now, "txt");
        std::fs::create_dir_all(&self.reports_dir)?;
        std::fs::write(&text_path, run.render())?;
        write_json(&text_path.with_extension("json"), run)?;
        tracing::info!(path = %text_path.display(), "Run analysis saved");
        Ok(text_path)
    }

    fn analyze_logs(&self, dir: &Path, issues: &mut Vec<String>) -> Option<LogAnalysis> {
        let mut files = match log_files(dir) {
            Ok(files) => files,
            Err(e) => {
                issues.push(format!("Could not list log directory {}: {e}", dir.display()));
                return None;
            }
        };
        if files.is_empty() {
            issues.push("No log files found".to_string());
            return None;
        }
        files.sort();

        let mut logs = LogAnalysis {
            files: files.len(),
            latest: files.last().map(|p| file_name(p)),
            ..LogAnalysis::default()
        };
        for path in &files {
            match std::fs::read_to_string(path) {
                Ok(content) => scan_log(&file_name(path), &content, &mut logs),
                Err(e) => issues.push(format!("Error analyzing {}: {e}", path.display())),
            }
        }
        Some(logs)
    }

    fn analyze_quality(&self, issues: &mut Vec<String>) -> Option<QualityAnalysis> {
        let path = match layout::latest_timestamped(&self.reports_dir, "data_quality_report", "json") {
            Ok(Some(path)) => path,
            Ok(None) => {
                issues.push("No data quality reports found".to_string());
                return None;
            }
            Err(e) => {
                issues.push(format!("Could not list reports: {e}"));
                return None;
            }
        };
        match read_json_value(&path) {
            Ok(value) => Some(summarize_quality(file_name(&path), &value)),
            Err(e) => {
                issues.push(format!("Error analyzing quality report: {e}"));
                None
            }
        }
    }

    fn analyze_load(&self, issues: &mut Vec<String>) -> Option<LoadAnalysis> {
        let path = match layout::latest_timestamped(&self.reports_dir, "load_report", "json") {
            Ok(Some(path)) => path,
            Ok(None) => {
                issues.push("No load reports found".to_string());
                return None;
            }
            Err(e) => {
                issues.push(format!("Could not list reports: {e}"));
                return None;
            }
        };
        match read_json_value(&path) {
            Ok(value) => Some(summarize_load(file_name(&path), &value)),
            Err(e) => {
                issues.push(format!("Error analyzing load report: {e}"));
                None
            }
        }
    }

    fn analyze_queries(&self, issues: &mut Vec<String>) -> Option<QueryAnalysis> {
        let path = match layout::latest_timestamped(&self.output_dir, "query_results", "txt") {
            Ok(Some(path)) => path,
            Ok(None) => {
                issues.push("No query output files found".to_string());
                return None;
            }
            Err(e) => {
                issues.push(format!("Could not list query output: {e}"));
                return None;
            }
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => Some(QueryAnalysis {
                output_file: file_name(&path),
                queries: parse_query_results(&content),
            }),
            Err(e) => {
                issues.push(format!("Error analyzing query output: {e}"));
                None
            }
        }
    }

    fn check_files(&self, run: &mut RunAnalysis) {
        let mut expected: Vec<(String, Vec<PathBuf>)> = layout::REQUIRED_CLEANED_FILES
            .iter()
            .map(|name| {
                let path = self.processed_dir.join(name);
                let found = if path.is_file() { vec![path] } else { Vec::new() };
                (format!("Processed {name}"), found)
            })
            .collect();
        expected.push((
            "Query results".to_string(),
            layout::all_timestamped(&self.output_dir, "query_results", "txt").unwrap_or_default(),
        ));
        if let Some(dir) = &self.logs_dir {
            expected.push(("Pipeline logs".to_string(), log_files(dir).unwrap_or_default()));
        }

        for (description, files) in expected {
            let empty = files
                .iter()
                .filter(|p| std::fs::metadata(p).map(|m| m.len() == 0).unwrap_or(true))
                .count();
            let status = if files.is_empty() {
                run.recommendations.push(format!("Missing {description}"));
                FileStatus::Missing
            } else if empty > 0 {
                run.recommendations
                    .push(format!("Found {empty} empty {description} files"));
                FileStatus::Warning
            } else {
                FileStatus::Ok
            };
            run.files.push(FileCheck {
                description,
                count: files.len(),
                empty,
                status,
            });
        }
    }

    fn count_records(&self, run: &mut RunAnalysis) {
        let csv_files = [
            ("patients", layout::PATIENTS_CLEANED),
            ("observations", layout::OBSERVATIONS_CLEANED),
            ("procedures", layout::PROCEDURES_CLEANED),
        ];
        for (dataset, name) in csv_files {
            let path = self.processed_dir.join(name);
            if !path.is_file() {
                continue;
            }
            match read_csv(&path) {
                Ok(table) => {
                    run.completeness.insert(dataset.to_string(), table.len());
                }
                Err(e) => run
                    .recommendations
                    .push(format!("Error checking data completeness for {dataset}: {e}")),
            }
        }

        let json_files = [
            ("diagnoses", layout::DIAGNOSES_CLEANED),
            ("medications", layout::MEDICATIONS_CLEANED),
        ];
        for (dataset, name) in json_files {
            let path = self.processed_dir.join(name);
            if !path.is_file() {
                continue;
            }
            match read_json_records(&path) {
                Ok(records) => {
                    run.completeness.insert(dataset.to_string(), records.len());
                }
                Err(e) => run
                    .recommendations
                    .push(format!("Error checking data completeness for {dataset}: {e}")),
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_json_value(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Rolling log files (`meridian.log`, `meridian.log.<date>`) in `dir`
fn log_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(LOG_FILE_NAME))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Fold one JSON log file into `logs`
pub(crate) fn scan_log(source: &str, content: &str, logs: &mut LogAnalysis) {
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            logs.unparsed_lines += 1;
            continue;
        };
        let fields = &record["fields"];
        let message = fields["message"].as_str().unwrap_or_default();

        if message == "COMPLETED" {
            if let (Some(operation), Some(ms)) =
                (fields["operation"].as_str(), fields["duration_ms"].as_u64())
            {
                logs.operations
                    .entry(operation.to_string())
                    .or_default()
                    .push(ms);
            }
        }

        let detail = match fields["error"].as_str() {
            Some(error) => format!("{source}: {message} ({error})"),
            None => format!("{source}: {message}"),
        };
        match record["level"].as_str() {
            Some("ERROR") => {
                logs.error_count += 1;
                if logs.errors.len() < MAX_LOG_MESSAGES {
                    logs.errors.push(detail);
                }
            }
            Some("WARN") => {
                logs.warning_count += 1;
                if logs.warnings.len() < MAX_LOG_MESSAGES {
                    logs.warnings.push(detail);
                }
            }
            _ => {}
        }
    }
}

pub(crate) fn summarize_quality(report_file: String, value: &Value) -> QualityAnalysis {
    let mut quality = QualityAnalysis {
        report_file,
        overall_score: value["overall"]["overall_quality_score"]
            .as_f64()
            .unwrap_or_default(),
        ..QualityAnalysis::default()
    };

    if let Some(datasets) = value.as_object() {
        for (dataset, metrics) in datasets {
            if dataset == "overall" {
                continue;
            }
            let Some(metrics) = metrics.as_object() else {
                continue;
            };
            if let Some(score) = metrics.get("data_quality_score").and_then(Value::as_f64) {
                quality.table_scores.insert(dataset.clone(), score);
            }
            let missing: BTreeMap<String, u64> = metrics
                .iter()
                .filter(|(key, _)| key.to_ascii_lowercase().contains("missing"))
                .filter_map(|(key, v)| v.as_u64().filter(|n| *n > 0).map(|n| (key.clone(), n)))
                .collect();
            if !missing.is_empty() {
                quality.missing_data.insert(dataset.clone(), missing);
            }
        }
    }

    if let Some(checks) = value["overall"]["issues_summary"].as_object() {
        for (check, applied) in checks {
            if applied.as_bool() == Some(false) {
                quality.validation_issues.push(check.clone());
            }
        }
    }
    quality
}

pub(crate) fn summarize_load(report_file: String, value: &Value) -> LoadAnalysis {
    LoadAnalysis {
        report_file,
        total_records_loaded: value["summary"]["total_records_loaded"]
            .as_u64()
            .unwrap_or_default(),
        success_rate: value["summary"]["success_rate"].as_f64().unwrap_or_default(),
        integrity_status: value["integrity"]["status"].as_str().map(str::to_string),
        encounter_source: value["encounter_source"].as_str().map(str::to_string),
        errors: value["errors"]
            .as_array()
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Titles and timings from a `query_results_<ts>.txt` file
pub(crate) fn parse_query_results(content: &str) -> Vec<QueryTiming> {
    let mut queries: Vec<QueryTiming> = Vec::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        if let Some(title) = line.strip_prefix("QUERY: ") {
            current = Some(title.trim().to_string());
            continue;
        }
        let Some(title) = current.as_ref() else {
            continue;
        };
        if let Some(time) = line.strip_prefix("Execution Time: ") {
            let seconds = time.trim_end_matches("seconds").trim().parse::<f64>().ok();
            if seconds.is_some() {
                queries.push(QueryTiming {
                    title: title.clone(),
                    seconds,
                });
                current = None;
            }
        } else if line.starts_with("ERROR: ") {
            queries.push(QueryTiming {
                title: title.clone(),
                seconds: None,
            });
            current = None;
        }
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const RESULTS: &str = "\
Meridian - Query Results
Generated: 2024-01-02 03:04:05
============================================================

QUERY: Query 1: Patient Demographics
----------------------------------------
Description: Patient Demographics
Execution Time: 0.042 seconds
Results:
| gender | count |

QUERY: Query 2: Provider Statistics
----------------------------------------
ERROR: Query error: relation \"providers\" does not exist

QUERY: Performance Query
----------------------------------------
Description: Performance Query
Execution Time: 1.750 seconds
Results:
Seq Scan on encounters
";

    #[test]
    fn test_parse_query_results() {
        let queries = parse_query_results(RESULTS);
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0].title, "Query 1: Patient Demographics");
        assert_eq!(queries[0].seconds, Some(0.042));
        assert_eq!(queries[1].seconds, None);
        assert!(queries[2].is_slow());
    }

    #[test]
    fn test_scan_log_counts_levels_and_durations() {
        let content = [
            json!({"level": "INFO", "fields": {"message": "COMPLETED", "operation": "cleaning", "duration_ms": 1200}}),
            json!({"level": "INFO", "fields": {"message": "COMPLETED", "operation": "cleaning", "duration_ms": 800}}),
            json!({"level": "WARN", "fields": {"message": "Dropped records that could not be linked to an encounter"}}),
            json!({"level": "ERROR", "fields": {"message": "FAILED", "operation": "loading", "error": "boom"}}),
        ]
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n")
            + "\nnot json\n";

        let mut logs = LogAnalysis::default();
        scan_log("meridian.log", &content, &mut logs);

        assert_eq!(logs.average_ms("cleaning"), Some(1000.0));
        assert_eq!(logs.warning_count, 1);
        assert_eq!(logs.error_count, 1);
        assert_eq!(logs.errors, vec!["meridian.log: FAILED (boom)".to_string()]);
        assert_eq!(logs.unparsed_lines, 1);
    }

    #[test]
    fn test_summarize_quality() {
        let report = json!({
            "patients": {"initial_count": 10, "final_count": 9, "missing_dob": 1,
                         "missing_zip": 0, "data_quality_score": 90.0},
            "observations": {"initial_count": 4, "final_count": 4, "data_quality_score": 100.0},
            "overall": {
                "overall_quality_score": 95.0,
                "issues_summary": {"missing_values_handled": true, "referential_integrity_checked": false}
            }
        });

        let quality = summarize_quality("data_quality_report_x.json".to_string(), &report);
        assert_eq!(quality.overall_score, 95.0);
        assert_eq!(quality.table_scores["patients"], 90.0);
        assert_eq!(quality.missing_data["patients"].len(), 1);
        assert_eq!(quality.missing_data["patients"]["missing_dob"], 1);
        assert!(!quality.table_scores.contains_key("overall"));
        assert_eq!(quality.validation_issues, vec!["referential_integrity_checked"]);
    }

    #[test]
    fn test_empty_directories_fail_the_analysis() {
        let dir = TempDir::new().unwrap();
        let analyzer = RunAnalyzer::new(
            dir.path().join("processed"),
            dir.path().join("reports"),
            dir.path().join("output"),
            Some(dir.path().join("logs")),
        );

        let run = analyzer.analyze();
        assert_eq!(run.status, crate::core::analysis::HealthStatus::Failed);
        assert!(run.issues.contains(&"No log files found".to_string()));
        assert!(run.issues.contains(&"No data quality reports found".to_string()));
        assert!(run.issues.contains(&"No load reports found".to_string()));
        assert!(run.issues.contains(&"No query output files found".to_string()));
        assert!(run.files.iter().all(|f| f.status == FileStatus::Missing));
    }
}

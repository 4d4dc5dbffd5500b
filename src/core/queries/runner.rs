//! Analytical query execution
//!
//! Queries live in one SQL file, each introduced by a marker comment:
//!
//! ```sql
//! -- Query 1: Patient Demographics
//! SELECT ...;
//!
//! -- Performance Query: index usage
//! EXPLAIN ANALYZE SELECT ...;
//! ```
//!
//! Queries run in sorted title order. A failing query is recorded in the
//! results file and does not stop the others.

use crate::adapters::database::{QueryResult, WarehouseStore};
use crate::adapters::files::layout;
use crate::config::MeridianConfig;
use crate::domain::{MeridianError, Result};
use chrono::{DateTime, Local};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Title given to the query introduced by a `-- Performance Query:` marker
pub const PERFORMANCE_QUERY: &str = "Performance Query";

const MARKER_PATTERN: &str = r"-- (Query \d+: .*?|Performance Query:.*?)\n";

/// One query from the queries file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQuery {
    pub title: String,
    pub sql: String,
}

impl NamedQuery {
    /// Title without its `Query N:` prefix
    pub fn description(&self) -> &str {
        self.title
            .split_once(": ")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.title)
    }

    pub fn is_performance(&self) -> bool {
        self.title == PERFORMANCE_QUERY
    }
}

/// Split marker-delimited SQL into queries, sorted by title
///
/// Text before the first marker is ignored. A repeated title keeps the last
/// query carrying it.
pub fn parse_queries(content: &str) -> Result<Vec<NamedQuery>> {
    let marker = Regex::new(MARKER_PATTERN)
        .map_err(|e| MeridianError::Query(format!("Invalid marker pattern: {e}")))?;

    let markers: Vec<(String, usize, usize)> = marker
        .captures_iter(content)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let title = c.get(1)?.as_str().trim();
            let title = if title.starts_with(PERFORMANCE_QUERY) {
                PERFORMANCE_QUERY.to_string()
            } else {
                title.to_string()
            };
            Some((title, whole.start(), whole.end()))
        })
        .collect();

    let mut queries = BTreeMap::new();
    for (i, (title, _, body_start)) in markers.iter().enumerate() {
        let body_end = markers
            .get(i + 1)
            .map(|(_, next_start, _)| *next_start)
            .unwrap_or(content.len());
        let sql = content[*body_start..body_end].trim().to_string();
        queries.insert(title.clone(), sql);
    }

    Ok(queries
        .into_iter()
        .map(|(title, sql)| NamedQuery { title, sql })
        .collect())
}

/// Read and parse the queries file
pub fn load_queries(path: &Path) -> Result<Vec<NamedQuery>> {
    if !path.is_file() {
        return Err(MeridianError::MissingFile {
            path: path.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_queries(&content)
}

#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Completed { result: QueryResult, elapsed: Duration },
    Failed { error: String },
}

/// One executed query
#[derive(Debug, Clone)]
pub struct QueryExecution {
    pub query: NamedQuery,
    pub outcome: QueryOutcome,
}

impl QueryExecution {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, QueryOutcome::Completed { .. })
    }
}

/// Everything a query run produced
#[derive(Debug, Clone)]
pub struct QueryRunReport {
    pub executions: Vec<QueryExecution>,
    pub results_path: PathBuf,
}

impl QueryRunReport {
    pub fn failed(&self) -> usize {
        self.executions.iter().filter(|e| !e.is_success()).count()
    }
}

/// Runs the analytical queries against the warehouse
pub struct QueryRunner {
    store: Arc<dyn WarehouseStore>,
    queries_file: PathBuf,
    output_dir: PathBuf,
}

impl QueryRunner {
    pub fn new(
        store: Arc<dyn WarehouseStore>,
        queries_file: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            queries_file: queries_file.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(store: Arc<dyn WarehouseStore>, config: &MeridianConfig) -> Self {
        Self::new(store, &config.paths.queries_file, &config.paths.output)
    }

    /// Run every query and write `query_results_<ts>.txt`
    ///
    /// # Errors
    ///
    /// Fails only when the queries file cannot be read or the results file
    /// cannot be written; individual query failures are part of the report.
    pub async fn run_all(&self) -> Result<QueryRunReport> {
        let queries = load_queries(&self.queries_file)?;
        tracing::info!(
            file = %self.queries_file.display(),
            queries = queries.len(),
            "Starting query execution"
        );

        let mut executions = Vec::with_capacity(queries.len());
        for query in queries {
            executions.push(self.execute(query).await);
        }

        let now = Local::now();
        let results_path = layout::timestamped(&self.output_dir, "query_results", &now, "txt");
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::write(&results_path, render_results(&executions, &now))?;
        tracing::info!(path = %results_path.display(), "Query results saved");

        Ok(QueryRunReport {
            executions,
            results_path,
        })
    }

    async fn execute(&self, query: NamedQuery) -> QueryExecution {
        tracing::info!(query = %query.title, "Executing query");
        let started = Instant::now();
        let outcome = match self.store.run_query(&query.sql).await {
            Ok(result) => {
                let elapsed = started.elapsed();
                tracing::info!(
                    query = %query.title,
                    rows = result.row_count(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Query completed"
                );
                QueryOutcome::Completed { result, elapsed }
            }
            Err(e) => {
                tracing::error!(query = %query.title, error = %e, "Query failed");
                QueryOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        QueryExecution { query, outcome }
    }
}

/// Plain-text rendering of a query run
pub fn render_results(executions: &[QueryExecution], generated: &DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Meridian - Query Results");
    let _ = writeln!(out, "Generated: {}", generated.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "{}\n", "=".repeat(60));

    for execution in executions {
        let query = &execution.query;
        let _ = writeln!(out, "QUERY: {}", query.title);
        let _ = writeln!(out, "{}", "-".repeat(40));
        match &execution.outcome {
            QueryOutcome::Failed { error } => {
                let _ = writeln!(out, "ERROR: {error}");
            }
            QueryOutcome::Completed { result, elapsed } => {
                let _ = writeln!(out, "Description: {}", query.description());
                let _ = writeln!(out, "Execution Time: {:.3} seconds", elapsed.as_secs_f64());
                let _ = writeln!(out, "Results:");
                if result.rows.is_empty() {
                    let _ = writeln!(out, "(no rows)");
                } else if query.is_performance() {
                    for row in &result.rows {
                        let line: Vec<String> = row.iter().map(cell_text).collect();
                        let _ = writeln!(out, "{}", line.join(" | "));
                    }
                } else {
                    out.push_str(&format_grid(result));
                }
            }
        }
        out.push('\n');
    }
    out
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a result as a bordered grid with a header row
pub fn format_grid(result: &QueryResult) -> String {
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let border = |fill: char| {
        let mut line = String::from("+");
        for width in &widths {
            line.extend(std::iter::repeat(fill).take(width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };
    let line = |values: &[String]| {
        let mut line = String::from("|");
        for (i, width) in widths.iter().enumerate() {
            let value = values.get(i).map(String::as_str).unwrap_or("");
            let pad = width - value.chars().count();
            line.push(' ');
            line.push_str(value);
            line.extend(std::iter::repeat(' ').take(pad + 1));
            line.push('|');
        }
        line.push('\n');
        line
    };

    let mut out = border('-');
    out.push_str(&line(&result.columns));
    out.push_str(&border('='));
    for row in &cells {
        out.push_str(&line(row));
        out.push_str(&border('-'));
    }
    out
}

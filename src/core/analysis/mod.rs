//! Post-run analysis
//!
//! Summarizes the latest data quality report, load report and query results,
//! the JSON pipeline logs, and which expected outputs exist. The verdict is
//! FAILED when a report is missing or records a fatal problem, WARNING when
//! something deserves a look, and PASSED otherwise.

pub mod analyzer;
pub mod report;

pub use analyzer::RunAnalyzer;
pub use report::{HealthStatus, RunAnalysis};

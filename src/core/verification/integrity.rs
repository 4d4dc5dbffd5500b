//! Post-load referential integrity validation
//!
//! The warehouse reports orphan counts per table. The outcome is one of:
//!
//! - **PASSED**: the check ran and every count is zero
//! - **WARNING**: at least one orphan; non-fatal, counts are surfaced
//! - **FAILED**: the check produced no result at all (including when it
//!   could not run), which is distinct from finding zero issues

use crate::adapters::database::WarehouseStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityStatus {
    Passed,
    Warning,
    Failed,
}

impl fmt::Display for IntegrityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntegrityStatus::Passed => "PASSED",
            IntegrityStatus::Warning => "WARNING",
            IntegrityStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Result of one integrity check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// When the check was performed
    pub checked_at: DateTime<Utc>,

    pub status: IntegrityStatus,

    /// Orphan count per table, as reported by the warehouse
    pub issues: BTreeMap<String, i64>,

    pub total_orphans: i64,

    /// Why the check produced no result
    pub failure_reason: Option<String>,

    /// Duration of the check in milliseconds
    pub duration_ms: u64,
}

impl IntegrityReport {
    /// Classify per-table orphan counts
    pub fn evaluate(issues: BTreeMap<String, i64>) -> Self {
        let total_orphans: i64 = issues.values().sum();
        let (status, failure_reason) = if issues.is_empty() {
            (
                IntegrityStatus::Failed,
                Some("Referential integrity check returned no results".to_string()),
            )
        } else if total_orphans == 0 {
            (IntegrityStatus::Passed, None)
        } else {
            (IntegrityStatus::Warning, None)
        };

        Self {
            checked_at: Utc::now(),
            status,
            issues,
            total_orphans,
            failure_reason,
            duration_ms: 0,
        }
    }

    /// A check that could not run
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            failure_reason: Some(reason.into()),
            ..Self::evaluate(BTreeMap::new())
        }
    }

    /// Tables with at least one orphan
    pub fn orphaned_tables(&self) -> impl Iterator<Item = (&str, i64)> {
        self.issues
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(table, count)| (table.as_str(), *count))
    }

    pub fn is_passed(&self) -> bool {
        self.status == IntegrityStatus::Passed
    }

    pub fn log(&self) {
        match self.status {
            IntegrityStatus::Passed => {
                tracing::info!(tables = self.issues.len(), "Referential integrity validation passed");
            }
            IntegrityStatus::Warning => {
                tracing::warn!(
                    total_orphans = self.total_orphans,
                    "Referential integrity issues detected"
                );
                for (table, count) in self.orphaned_tables() {
                    tracing::warn!(table = table, orphans = count, "Orphaned records");
                }
            }
            IntegrityStatus::Failed => {
                tracing::error!(
                    reason = self.failure_reason.as_deref().unwrap_or("unknown"),
                    "Referential integrity check failed"
                );
            }
        }
    }
}

/// Runs the warehouse integrity check
pub struct IntegrityValidator {
    store: Arc<dyn WarehouseStore>,
}

impl IntegrityValidator {
    pub fn new(store: Arc<dyn WarehouseStore>) -> Self {
        Self { store }
    }

    /// Run the check; storage errors yield a FAILED report rather than an error
    pub async fn validate(&self) -> IntegrityReport {
        let started = Instant::now();
        let mut report = match self.store.referential_integrity().await {
            Ok(issues) => IntegrityReport::evaluate(issues),
            Err(e) => IntegrityReport::failed(e.to_string()),
        };
        report.duration_ms = started.elapsed().as_millis() as u64;
        report.log();
        report
    }
}

//! Load summary and reporting
//!
//! This module defines structures for tracking and reporting load results.

use crate::core::load::LoadResult;
use crate::core::reconcile::{LinkStats, ResolutionStats};
use crate::core::verification::IntegrityReport;
use crate::domain::Table;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Statistics for one table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableLoadStats {
    /// Records read from the cleaned file
    pub read: usize,

    /// Rows written to the warehouse
    pub loaded: u64,

    /// Rows skipped because their primary key already existed
    pub duplicates_ignored: u64,

    /// Records missing a required field
    pub skipped_invalid: usize,

    /// Dependent records dropped for lack of a usable date
    pub dropped_missing_date: usize,

    /// Dependent records dropped because no encounter matched
    pub dropped_unlinked: usize,

    /// Dependent records whose own encounter or patient reference was unknown
    pub dropped_unresolved_reference: usize,

    /// Failed table loads
    pub errors: usize,
}

impl TableLoadStats {
    pub fn read(read: usize, skipped_invalid: usize) -> Self {
        Self {
            read,
            skipped_invalid,
            ..Self::default()
        }
    }

    pub fn with_load(mut self, load: &LoadResult) -> Self {
        self.loaded = load.inserted;
        self.duplicates_ignored = load.duplicates_ignored;
        self
    }

    pub fn with_link(mut self, link: &LinkStats) -> Self {
        self.dropped_missing_date = link.dropped_missing_date;
        self.dropped_unlinked = link.dropped_unmatched;
        self.dropped_unresolved_reference = link.dropped_unresolved_reference;
        self
    }

    pub fn dropped(&self) -> usize {
        self.dropped_missing_date + self.dropped_unlinked + self.dropped_unresolved_reference
    }
}

/// Summary of a load run
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    /// Per-table statistics, in load order
    pub tables: BTreeMap<Table, TableLoadStats>,

    /// Where encounters came from (`snapshot` or `derived`)
    pub encounter_source: Option<String>,

    /// Encounter resolution counters
    pub resolution: Option<ResolutionStats>,

    /// Errors encountered during the load
    pub errors: Vec<String>,

    /// Duration of the load
    pub duration: Duration,
}

impl LoadSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, table: Table, stats: TableLoadStats) {
        self.tables.insert(table, stats);
    }

    /// Record a table load failure
    pub fn record_failure(&mut self, table: Table, message: String) {
        self.tables.entry(table).or_default().errors += 1;
        self.errors.push(message);
    }

    pub fn total_loaded(&self) -> u64 {
        self.tables.values().map(|s| s.loaded).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.tables.values().map(|s| s.errors).sum()
    }

    pub fn total_dropped(&self) -> usize {
        self.tables
            .values()
            .map(TableLoadStats::dropped)
            .sum()
    }

    /// Loaded rows as a percentage of loaded rows plus errors
    pub fn success_rate(&self) -> f64 {
        let loaded = self.total_loaded() as f64;
        let total = loaded + self.total_errors() as f64;
        if total == 0.0 {
            return 0.0;
        }
        loaded / total * 100.0
    }

    pub fn is_successful(&self) -> bool {
        self.errors.is_empty() && self.total_errors() == 0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        for (table, stats) in &self.tables {
            tracing::info!(
                table = %table,
                read = stats.read,
                loaded = stats.loaded,
                duplicates_ignored = stats.duplicates_ignored,
                dropped = stats.dropped(),
                "Table summary"
            );
        }

        tracing::info!(
            total_loaded = self.total_loaded(),
            total_dropped = self.total_dropped(),
            total_errors = self.total_errors(),
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Load completed"
        );

        for error in &self.errors {
            tracing::warn!(message = %error, "Load error");
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReportTotals {
    pub total_records_loaded: u64,
    pub total_errors: usize,
    pub success_rate: f64,
}

/// Contents of `load_report_<ts>.json`
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub timestamp: String,
    pub summary: LoadReportTotals,
    pub details: BTreeMap<Table, TableLoadStats>,
    pub encounter_source: Option<String>,
    pub encounter_resolution: Option<ResolutionStats>,
    pub errors: Vec<String>,
    pub database_stats: BTreeMap<String, i64>,
    pub integrity: Option<IntegrityReport>,
}

impl LoadReport {
    pub fn new(
        summary: &LoadSummary,
        database_stats: BTreeMap<String, i64>,
        integrity: Option<IntegrityReport>,
    ) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            summary: LoadReportTotals {
                total_records_loaded: summary.total_loaded(),
                total_errors: summary.total_errors(),
                success_rate: summary.success_rate(),
            },
            details: summary.tables.clone(),
            encounter_source: summary.encounter_source.clone(),
            encounter_resolution: summary.resolution,
            errors: summary.errors.clone(),
            database_stats,
            integrity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_totals() {
        let mut summary = LoadSummary::new();
        summary.record(
            Table::Patients,
            TableLoadStats::read(10, 0).with_load(&LoadResult {
                attempted: 10,
                inserted: 9,
                duplicates_ignored: 1,
                batches: 1,
            }),
        );
        summary.record(
            Table::Diagnoses,
            TableLoadStats::read(4, 1).with_link(&LinkStats {
                passed_through: 1,
                resolved: 0,
                dropped_missing_date: 1,
                dropped_unmatched: 1,
                dropped_unresolved_reference: 1,
            }),
        );

        assert_eq!(summary.total_loaded(), 9);
        assert_eq!(summary.total_dropped(), 3);
        assert_eq!(summary.success_rate(), 100.0);
        assert!(summary.is_successful());
    }

    #[test]
    fn test_success_rate_with_failures() {
        let mut summary = LoadSummary::new();
        assert_eq!(summary.success_rate(), 0.0);

        summary.record(
            Table::Patients,
            TableLoadStats {
                loaded: 3,
                ..TableLoadStats::default()
            },
        );
        summary.record_failure(Table::Encounters, "boom".to_string());
        assert_eq!(summary.success_rate(), 75.0);
        assert!(!summary.is_successful());
    }

    #[test]
    fn test_report_serializes_table_names() {
        let mut summary = LoadSummary::new();
        summary.record(Table::Observations, TableLoadStats::read(1, 0));

        let report = LoadReport::new(&summary, BTreeMap::new(), None);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["details"]["observations"]["read"], 1);
        assert_eq!(json["summary"]["total_records_loaded"], 0);
        assert!(json["integrity"].is_null());
    }
}

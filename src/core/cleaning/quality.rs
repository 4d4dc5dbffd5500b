//! Data quality metrics and `data_quality_report_<ts>.json`

use serde::Serialize;
use std::collections::BTreeMap;

/// Quality metrics for one cleaned dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetQuality {
    pub initial_count: usize,
    pub final_count: usize,

    /// Dataset-specific counters (`missing_dob`, `abnormal_results`, ...)
    #[serde(flatten)]
    pub counters: BTreeMap<String, usize>,

    pub data_quality_score: f64,
}

impl DatasetQuality {
    pub fn new(initial_count: usize, final_count: usize) -> Self {
        Self {
            initial_count,
            final_count,
            counters: BTreeMap::new(),
            data_quality_score: percentage(final_count, initial_count),
        }
    }

    pub fn with_counter(mut self, name: &str, value: usize) -> Self {
        self.counters.insert(name.to_string(), value);
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.data_quality_score = score;
        self
    }

    pub fn counter(&self, name: &str) -> usize {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

/// `part / whole` as a percentage; an empty dataset scores 100
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 100.0;
    }
    part as f64 / whole as f64 * 100.0
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuesSummary {
    pub missing_values_handled: bool,
    pub date_formats_standardized: bool,
    pub data_validation_applied: bool,
    pub referential_integrity_checked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverallQuality {
    pub overall_quality_score: f64,
    pub total_datasets_processed: usize,
    pub processing_timestamp: String,
    pub issues_summary: IssuesSummary,
}

/// The whole quality report; datasets appear at the top level by name
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    #[serde(flatten)]
    pub datasets: BTreeMap<String, DatasetQuality>,
    pub overall: OverallQuality,
}

impl QualityReport {
    pub fn new(datasets: BTreeMap<String, DatasetQuality>) -> Self {
        let scores: Vec<f64> = datasets.values().map(|d| d.data_quality_score).collect();
        let overall_quality_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        Self {
            overall: OverallQuality {
                overall_quality_score,
                total_datasets_processed: datasets.len(),
                processing_timestamp: chrono::Local::now()
                    .format("%Y-%m-%dT%H:%M:%S%.6f")
                    .to_string(),
                issues_summary: IssuesSummary {
                    missing_values_handled: true,
                    date_formats_standardized: true,
                    data_validation_applied: true,
                    referential_integrity_checked: false,
                },
            },
            datasets,
        }
    }

    pub fn log(&self) {
        for (name, quality) in &self.datasets {
            tracing::info!(
                dataset = %name,
                initial = quality.initial_count,
                r#final = quality.final_count,
                score = format!("{:.1}", quality.data_quality_score),
                "Dataset quality"
            );
        }
        tracing::info!(
            overall_score = format!("{:.1}", self.overall.overall_quality_score),
            datasets = self.overall.total_datasets_processed,
            "Data quality report generated"
        );
    }
}

//! File names the pipeline reads and writes

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

pub const PATIENTS_RAW: &str = "patients.csv";
pub const OBSERVATIONS_RAW: &str = "observations.csv";
pub const PROCEDURES_RAW: &str = "procedures.csv";
pub const DIAGNOSES_RAW: &str = "diagnoses.json";
pub const MEDICATIONS_RAW: &str = "medications.json";

/// Raw inputs that must exist before the pipeline runs
pub const REQUIRED_RAW_FILES: [&str; 5] = [
    PATIENTS_RAW,
    OBSERVATIONS_RAW,
    PROCEDURES_RAW,
    DIAGNOSES_RAW,
    MEDICATIONS_RAW,
];

pub const PATIENTS_CLEANED: &str = "patients_cleaned.csv";
pub const OBSERVATIONS_CLEANED: &str = "observations_cleaned.csv";
pub const PROCEDURES_CLEANED: &str = "procedures_cleaned.csv";
pub const DIAGNOSES_CLEANED: &str = "diagnoses_cleaned.json";
pub const MEDICATIONS_CLEANED: &str = "medications_cleaned.json";

/// Cleaned files the load step requires
pub const REQUIRED_CLEANED_FILES: [&str; 5] = [
    PATIENTS_CLEANED,
    OBSERVATIONS_CLEANED,
    PROCEDURES_CLEANED,
    DIAGNOSES_CLEANED,
    MEDICATIONS_CLEANED,
];

pub const FINAL_REPORT: &str = "final_report.md";

/// Timestamp suffix used in report file names
pub fn report_stamp(now: &DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// `<dir>/<prefix>_<stamp>.<ext>`
pub fn timestamped(dir: &Path, prefix: &str, now: &DateTime<Local>, ext: &str) -> PathBuf {
    dir.join(format!("{prefix}_{}.{ext}", report_stamp(now)))
}

/// Most recent `<prefix>_<stamp>.<ext>` file in `dir`
///
/// Stamps sort chronologically, so the greatest file name wins.
pub fn latest_timestamped(dir: &Path, prefix: &str, ext: &str) -> std::io::Result<Option<PathBuf>> {
    Ok(all_timestamped(dir, prefix, ext)?.pop())
}

/// Every `<prefix>_<stamp>.<ext>` file in `dir`, oldest first
pub fn all_timestamped(dir: &Path, prefix: &str, ext: &str) -> std::io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let head = format!("{prefix}_");
    let tail = format!(".{ext}");
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(&head) && name.ends_with(&tail))
        })
        .collect();
    found.sort();
    Ok(found)
}

/// First exported snapshot table that holds encounters
///
/// Looks for `sqlite_*.csv` files whose name mentions `encounter` or `visit`,
/// in file-name order.
pub fn find_encounter_export(processed_dir: &Path) -> std::io::Result<Option<PathBuf>> {
    if !processed_dir.is_dir() {
        return Ok(None);
    }
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(processed_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| {
                    let lower = name.to_ascii_lowercase();
                    lower.starts_with("sqlite_")
                        && lower.ends_with(".csv")
                        && (lower.contains("encounter") || lower.contains("visit"))
                })
        })
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_timestamped_name() {
        let now = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let path = timestamped(Path::new("reports"), "load_report", &now, "json");
        assert_eq!(path, Path::new("reports/load_report_20240102_030405.json"));
    }

    #[test]
    fn test_find_encounter_export() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("sqlite_providers.csv"), "").unwrap();
        std::fs::write(dir.path().join("visits.csv"), "").unwrap();
        assert_eq!(find_encounter_export(dir.path()).unwrap(), None);

        std::fs::write(dir.path().join("sqlite_Visits.csv"), "").unwrap();
        std::fs::write(dir.path().join("sqlite_encounters.csv"), "").unwrap();
        let found = find_encounter_export(dir.path()).unwrap().unwrap();
        assert_eq!(found.file_name().unwrap(), "sqlite_Visits.csv");
    }

    #[test]
    fn test_latest_timestamped_picks_newest_stamp() {
        let dir = TempDir::new().unwrap();
        for name in [
            "load_report_20240102_030405.json",
            "load_report_20240315_120000.json",
            "load_report_20240315_120000.txt",
            "data_quality_report_20250101_000000.json",
        ] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }

        let latest = latest_timestamped(dir.path(), "load_report", "json").unwrap().unwrap();
        assert_eq!(latest.file_name().unwrap(), "load_report_20240315_120000.json");
        assert_eq!(all_timestamped(dir.path(), "load_report", "json").unwrap().len(), 2);
        assert_eq!(latest_timestamped(dir.path(), "query_results", "txt").unwrap(), None);
    }

    #[test]
    fn test_missing_processed_dir() {
        assert_eq!(find_encounter_export(Path::new("/nonexistent/meridian")).unwrap(), None);
    }
}

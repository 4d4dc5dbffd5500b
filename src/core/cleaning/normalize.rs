//! Field-level standardization
//!
//! Pure functions; none of them fail. Values that cannot be standardized are
//! either returned unchanged or become `None`, as documented per function.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Observation descriptions naming a numeric lab test
pub const NUMERIC_LAB_KEYWORDS: &[&str] = &["glucose", "creatinine", "hemoglobin", "a1c", "cholesterol"];

/// Plausible value range per lab keyword; values outside are nulled
pub const LAB_VALUE_RANGES: &[(&str, f64, f64)] = &[
    ("glucose", 50.0, 500.0),
    ("a1c", 4.0, 20.0),
    ("creatinine", 0.5, 10.0),
    ("hemoglobin", 5.0, 20.0),
];

/// Values strictly above these thresholds are flagged abnormal
pub const ABNORMAL_THRESHOLDS: &[(&str, f64)] = &[("glucose", 100.0), ("a1c", 7.0)];

/// Oldest plausible patient age in years
pub const MAX_AGE_YEARS: i64 = 150;

fn digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Five-digit zip: shorter values are zero-padded, ZIP+4 is truncated.
/// No digits at all gives `None`.
pub fn standardize_zip(raw: &str) -> Option<String> {
    let digits = digits(raw);
    match digits.len() {
        0 => None,
        n if n <= 5 => Some(format!("{digits:0>5}")),
        _ => Some(digits[..5].to_string()),
    }
}

/// `(AAA) BBB-CCCC` for ten digits, `+1 (AAA) BBB-CCCC` for eleven starting
/// with 1; anything else is returned as given.
pub fn standardize_phone(raw: &str) -> String {
    let d = digits(raw);
    match d.len() {
        10 => format!("({}) {}-{}", &d[..3], &d[3..6], &d[6..]),
        11 if d.starts_with('1') => format!("+1 ({}) {}-{}", &d[1..4], &d[4..7], &d[7..]),
        _ => raw.to_string(),
    }
}

/// Trim, then capitalize the first letter of every word and lowercase the rest
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut previous_is_letter = false;
    for c in raw.trim().chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}

/// Whole years between `birth` and `today`, counted as 365-day years
pub fn age_in_years(birth: NaiveDate, today: NaiveDate) -> i64 {
    (today - birth).num_days().div_euclid(365)
}

pub fn is_plausible_age(age: i64) -> bool {
    (0..=MAX_AGE_YEARS).contains(&age)
}

fn mentions(description: &str, keyword: &str) -> bool {
    description.to_lowercase().contains(keyword)
}

/// Whether an observation description names a numeric lab test
pub fn is_numeric_lab(description: &str) -> bool {
    NUMERIC_LAB_KEYWORDS.iter().any(|k| mentions(description, k))
}

/// First number appearing in free text, e.g. `"126 mg/dL"` gives `126.0`
pub fn extract_number(text: &str) -> Option<f64> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    let re = NUMBER
        .get_or_init(|| Regex::new(r"(\d+\.?\d*)").ok())
        .as_ref()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Lab keywords whose plausible range excludes `value`
pub fn out_of_range_labs(description: &str, value: f64) -> Vec<&'static str> {
    LAB_VALUE_RANGES
        .iter()
        .filter(|(keyword, min, max)| mentions(description, keyword) && (value < *min || value > *max))
        .map(|(keyword, _, _)| *keyword)
        .collect()
}

/// Whether `value` is abnormal for the lab test the description names
pub fn is_abnormal(description: &str, value: f64) -> bool {
    ABNORMAL_THRESHOLDS
        .iter()
        .any(|(keyword, threshold)| mentions(description, keyword) && value > *threshold)
}

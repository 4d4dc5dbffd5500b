//! Source file cleaning
//!
//! Standardizes the raw sources into the cleaned files the load step reads:
//!
//! - [`normalize`]: field-level rules (zip codes, phone numbers, names, lab values)
//! - [`cleaner`]: per-dataset cleaning and snapshot export
//! - [`quality`]: data quality metrics and report

pub mod cleaner;
pub mod normalize;
pub mod quality;

pub use cleaner::{CleaningOutcome, DataCleaner};
pub use quality::{DatasetQuality, QualityReport};

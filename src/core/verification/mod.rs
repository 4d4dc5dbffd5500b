//! Post-load verification
//!
//! This module checks that loaded rows reference existing parents.

pub mod integrity;

pub use integrity::{IntegrityReport, IntegrityStatus, IntegrityValidator};

//! Domain error types
//!
//! All errors raised by the pipeline are expressed as [`MeridianError`] so that
//! callers never see third-party error types.

use thiserror::Error;

/// Main Meridian error type
#[derive(Debug, Error)]
pub enum MeridianError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic storage errors (statements, transactions, pool)
    #[error("Database error: {0}")]
    Database(String),

    /// Storage could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// A required input file is absent
    #[error("Required file not found: {path}")]
    MissingFile { path: String },

    /// A batch insert failed; the table load is aborted
    #[error("Batch insert failed for table '{table}' (batch {batch}/{total}): {message}")]
    BatchInsert {
        table: String,
        batch: usize,
        total: usize,
        message: String,
    },

    /// Referential integrity check could not be evaluated
    #[error("Integrity check error: {0}")]
    Integrity(String),

    /// Analytical query failure
    #[error("Query error: {0}")]
    Query(String),

    /// Relational snapshot could not be read
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl MeridianError {
    /// Whether this error stems from storage connectivity
    pub fn is_connection(&self) -> bool {
        matches!(self, MeridianError::Connection(_))
    }
}

impl From<std::io::Error> for MeridianError {
    fn from(err: std::io::Error) -> Self {
        MeridianError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MeridianError {
    fn from(err: serde_json::Error) -> Self {
        MeridianError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MeridianError {
    fn from(err: toml::de::Error) -> Self {
        MeridianError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<csv::Error> for MeridianError {
    fn from(err: csv::Error) -> Self {
        MeridianError::Serialization(format!("CSV error: {err}"))
    }
}

impl From<rusqlite::Error> for MeridianError {
    fn from(err: rusqlite::Error) -> Self {
        MeridianError::Snapshot(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meridian_error_display() {
        let err = MeridianError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_batch_insert_error_carries_context() {
        let err = MeridianError::BatchInsert {
            table: "diagnoses".to_string(),
            batch: 2,
            total: 5,
            message: "foreign key violation".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("diagnoses"));
        assert!(text.contains("2/5"));
        assert!(text.contains("foreign key violation"));
    }

    #[test]
    fn test_missing_file_display() {
        let err = MeridianError::MissingFile {
            path: "data/raw/patients.csv".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Required file not found: data/raw/patients.csv"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: MeridianError = io_err.into();
        assert!(matches!(err, MeridianError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: MeridianError = json_err.into();
        assert!(matches!(err, MeridianError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: MeridianError = toml_err.into();
        assert!(matches!(err, MeridianError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_is_connection() {
        assert!(MeridianError::Connection("refused".to_string()).is_connection());
        assert!(!MeridianError::Database("syntax".to_string()).is_connection());
    }
}

//! Logging and observability
//!
//! - Console and rolling JSON file output ([`init_logging`])
//! - Scoped operation timing ([`OperationTimer`])
//!
//! # Example
//!
//! ```no_run
//! use meridian::logging::{init_logging, OperationTimer};
//! use meridian::config::LoggingConfig;
//!
//! let _guard = init_logging("info", &LoggingConfig::default()).expect("logging");
//!
//! let timer = OperationTimer::start("load_patients");
//! // ... work ...
//! timer.complete();
//! ```

pub mod structured;
pub mod timing;

pub use structured::{init_logging, log_system_info, LoggingGuard, LOG_FILE_NAME};
pub use timing::{timed, OperationTimer};

/// Log a batch insert step
///
/// # Example
///
/// ```no_run
/// use meridian::log_batch_progress;
///
/// log_batch_progress!("diagnoses", 2, 5, 1000);
/// ```
#[macro_export]
macro_rules! log_batch_progress {
    ($table:expr, $batch:expr, $total:expr, $rows:expr) => {
        tracing::debug!(
            table = %$table,
            batch = $batch,
            total_batches = $total,
            rows = $rows,
            progress_pct = ($batch as f64 / $total as f64 * 100.0),
            "Inserted batch"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use meridian::log_error_with_context;
/// use meridian::domain::MeridianError;
///
/// let error = MeridianError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

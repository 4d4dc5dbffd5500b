//! Scoped operation timing
//!
//! An [`OperationTimer`] logs `START` when created and exactly one of
//! `COMPLETED` or `FAILED` with the elapsed duration. A timer dropped without
//! an outcome (early return, panic unwinding) logs `ABANDONED`, so every exit
//! path leaves a record.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

#[must_use = "an OperationTimer records its outcome when completed, failed or dropped"]
pub struct OperationTimer {
    operation: String,
    started: Instant,
    finished: bool,
}

impl OperationTimer {
    pub fn start(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::info!(operation = %operation, "START");
        Self {
            operation,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn complete(mut self) -> Duration {
        self.finished = true;
        let elapsed = self.elapsed();
        tracing::info!(
            operation = %self.operation,
            duration_ms = elapsed.as_millis() as u64,
            "COMPLETED"
        );
        elapsed
    }

    pub fn fail(mut self, error: &dyn Display) -> Duration {
        self.finished = true;
        let elapsed = self.elapsed();
        tracing::error!(
            operation = %self.operation,
            duration_ms = elapsed.as_millis() as u64,
            error = %error,
            "FAILED"
        );
        elapsed
    }

    /// Records the outcome of `result`
    pub fn finish<T, E: Display>(self, result: &Result<T, E>) -> Duration {
        match result {
            Ok(_) => self.complete(),
            Err(e) => self.fail(e),
        }
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                operation = %self.operation,
                duration_ms = self.started.elapsed().as_millis() as u64,
                "ABANDONED"
            );
        }
    }
}

/// Runs `future` under an [`OperationTimer`] named `operation`
pub async fn timed<T, E, F>(operation: &str, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let timer = OperationTimer::start(operation);
    let result = future.await;
    timer.finish(&result);
    result
}

//! Warehouse loading
//!
//! - [`batch`] - batched, conflict-ignoring inserts into one table
//! - [`loader`] - the load step over all cleaned files
//! - [`summary`] - per-table statistics and the load report

pub mod batch;
pub mod loader;
pub mod summary;

pub use batch::{BatchLoader, LoadResult};
pub use loader::{DataLoader, LoadOutcome};
pub use summary::{LoadReport, LoadSummary, TableLoadStats};

//! Core pipeline logic for Meridian.
//!
//! # Modules
//!
//! - [`cleaning`] - Raw file standardization and data quality metrics
//! - [`load`] - Batch loading of cleaned files into the warehouse
//! - [`reconcile`] - Encounter resolution and referential linking
//! - [`verification`] - Post-load referential integrity validation
//! - [`queries`] - Analytical query execution
//! - [`pipeline`] - Step orchestration and the final report
//! - [`analysis`] - Summaries of past runs from their reports and logs
//!
//! # Load Workflow
//!
//! 1. **Patients**: loaded first, their identifiers become the known set
//! 2. **Encounters**: taken from the snapshot export or derived from
//!    diagnosis and procedure dates, one per `(patient, calendar date)`
//! 3. **Dependents**: diagnoses, medications, procedures and observations are
//!    linked to an encounter and loaded in foreign-key order
//! 4. **Integrity**: orphan counts are checked and reported
//!
//! # Example
//!
//! ```rust,no_run
//! use meridian::adapters::database::create_warehouse_store;
//! use meridian::config::load_config;
//! use meridian::core::pipeline::{Pipeline, StepSelection};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("meridian.toml")?;
//! let store = create_warehouse_store(&config)?;
//!
//! let report = Pipeline::new(config, store)
//!     .run(StepSelection::All, false)
//!     .await;
//! println!("exit code: {}", report.exit_code());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cleaning;
pub mod load;
pub mod pipeline;
pub mod queries;
pub mod reconcile;
pub mod verification;

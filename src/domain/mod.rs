//! Domain models and types for Meridian.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`PatientId`], [`EncounterId`], [`ProviderId`])
//! - **Warehouse records** ([`Patient`], [`Encounter`], [`Diagnosis`], [`Medication`],
//!   [`Procedure`], [`Observation`]) and the [`TableRecord`] contract
//! - **Loosely typed source rows** ([`SourceRow`]) with lenient date parsing
//! - **Error types** ([`MeridianError`]) and the [`Result`] alias
//!
//! # Type Safety
//!
//! ```rust
//! use meridian::domain::{EncounterId, PatientId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let patient = PatientId::new("P1")?;
//! let encounter = EncounterId::generate();
//!
//! // This won't compile - identifiers do not mix
//! // let wrong: PatientId = encounter;
//! # Ok(())
//! # }
//! ```

pub mod dates;
pub mod errors;
pub mod ids;
pub mod records;
pub mod result;
pub mod row;
pub mod tables;
pub mod value;

pub use errors::MeridianError;
pub use ids::{EncounterId, PatientId, ProviderId};
pub use records::{
    Diagnosis, Encounter, Medication, Observation, Patient, Procedure, TableRecord,
};
pub use result::Result;
pub use row::SourceRow;
pub use tables::Table;
pub use value::SqlValue;

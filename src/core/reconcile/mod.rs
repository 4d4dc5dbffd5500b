//! Encounter reconciliation
//!
//! [`EncounterResolver`] produces the `(patient, date) -> encounter` mapping,
//! creating encounters where none exist; [`ReferentialLinker`] uses it to
//! attach encounter identifiers to dependent records.

pub mod linker;
pub mod resolver;

pub use linker::{DependentRecord, LinkOutcome, LinkStats, ReferentialLinker};
pub use resolver::{
    EncounterKey, EncounterMap, EncounterResolution, EncounterResolver, EncounterSource,
    ResolutionStats,
};

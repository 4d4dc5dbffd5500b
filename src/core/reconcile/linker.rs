//! Referential linking of dependent records
//!
//! A record's relevant date must be present and parsable or the record is
//! dropped. Records already referencing an encounter keep that reference
//! when both the encounter and the patient are known, and are dropped
//! otherwise. The rest are looked up by `(patient, calendar date)` and
//! dropped when no encounter matches.

use super::resolver::EncounterMap;
use crate::domain::{
    Diagnosis, EncounterId, Medication, Observation, PatientId, Procedure, TableRecord,
};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashSet;

/// A record that must reference a parent encounter
pub trait DependentRecord: TableRecord {
    fn patient_id(&self) -> &PatientId;

    fn encounter_id(&self) -> Option<&EncounterId>;

    fn set_encounter_id(&mut self, id: EncounterId);

    /// Date used to find the encounter
    fn relevant_date(&self) -> Option<NaiveDateTime>;
}

macro_rules! dependent_record {
    ($record:ty, $date:ident) => {
        impl DependentRecord for $record {
            fn patient_id(&self) -> &PatientId {
                &self.patient_id
            }

            fn encounter_id(&self) -> Option<&EncounterId> {
                self.encounter_id.as_ref()
            }

            fn set_encounter_id(&mut self, id: EncounterId) {
                self.encounter_id = Some(id);
            }

            fn relevant_date(&self) -> Option<NaiveDateTime> {
                self.$date
            }
        }
    };
}

dependent_record!(Diagnosis, date_recorded);
dependent_record!(Medication, start_date);
dependent_record!(Procedure, date_performed);
dependent_record!(Observation, observation_datetime);

/// Linking counters for one table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Records that already carried an encounter reference
    pub passed_through: usize,
    /// Records given an encounter by lookup
    pub resolved: usize,
    pub dropped_missing_date: usize,
    /// Records with a date but no matching encounter
    pub dropped_unmatched: usize,
    /// Records whose own encounter or patient reference does not exist
    pub dropped_unresolved_reference: usize,
}

impl LinkStats {
    pub fn linked(&self) -> usize {
        self.passed_through + self.resolved
    }

    pub fn dropped(&self) -> usize {
        self.dropped_missing_date + self.dropped_unmatched + self.dropped_unresolved_reference
    }
}

/// Records ready to load plus the counters that produced them
#[derive(Debug, Clone)]
pub struct LinkOutcome<R> {
    pub records: Vec<R>,
    pub stats: LinkStats,
}

/// Attaches encounter identifiers using an [`EncounterMap`]
pub struct ReferentialLinker<'a> {
    map: &'a EncounterMap,
    known_patients: &'a HashSet<PatientId>,
}

impl<'a> ReferentialLinker<'a> {
    pub fn new(map: &'a EncounterMap, known_patients: &'a HashSet<PatientId>) -> Self {
        Self {
            map,
            known_patients,
        }
    }

    pub fn link<R: DependentRecord>(&self, records: Vec<R>) -> LinkOutcome<R> {
        let table = R::TABLE;
        let mut stats = LinkStats::default();
        let mut linked = Vec::with_capacity(records.len());

        for mut record in records {
            let Some(at) = record.relevant_date() else {
                tracing::debug!(
                    table = %table,
                    record_id = record.primary_key(),
                    "Dropping record without a usable date"
                );
                stats.dropped_missing_date += 1;
                continue;
            };

            if let Some(encounter_id) = record.encounter_id() {
                if self.map.is_known(encounter_id)
                    && self.known_patients.contains(record.patient_id())
                {
                    stats.passed_through += 1;
                    linked.push(record);
                } else {
                    tracing::debug!(
                        table = %table,
                        record_id = record.primary_key(),
                        encounter_id = %encounter_id,
                        patient_id = %record.patient_id(),
                        "Dropping record with an unresolved reference"
                    );
                    stats.dropped_unresolved_reference += 1;
                }
                continue;
            }

            match self.map.lookup(record.patient_id(), &at) {
                Some(encounter_id) => {
                    record.set_encounter_id(encounter_id.clone());
                    stats.resolved += 1;
                    linked.push(record);
                }
                None => {
                    tracing::debug!(
                        table = %table,
                        record_id = record.primary_key(),
                        patient_id = %record.patient_id(),
                        date = %at.date(),
                        "Dropping record with no matching encounter"
                    );
                    stats.dropped_unmatched += 1;
                }
            }
        }

        if stats.dropped() > 0 {
            tracing::warn!(
                table = %table,
                dropped_missing_date = stats.dropped_missing_date,
                dropped_unmatched = stats.dropped_unmatched,
                dropped_unresolved_reference = stats.dropped_unresolved_reference,
                linked = stats.linked(),
                "Dropped records that could not be linked to an encounter"
            );
        }

        LinkOutcome {
            records: linked,
            stats,
        }
    }
}

//! Encounter resolution
//!
//! Builds the `(patient, calendar date) -> encounter` mapping used to link
//! dependent records. The mapping is seeded from encounters already in the
//! warehouse, then extended from one of two sources:
//!
//! - rows of a snapshot encounter table, whose columns vary between exports
//!   and are read through alias lists
//! - `(patient, date)` pairs observed in dependent records, for which
//!   encounters are synthesized
//!
//! Only encounters the resolver chose to create are inserted. Within one
//! pass the first identifier registered for a key wins.

use crate::adapters::database::WarehouseStore;
use crate::core::load::{BatchLoader, LoadResult};
use crate::domain::dates;
use crate::domain::{Encounter, EncounterId, PatientId, ProviderId, Result, SourceRow};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

const DATE_ALIASES: &[&str] = &["encounter_date", "visit_date", "admission_date"];
const TYPE_ALIASES: &[&str] = &["encounter_type", "visit_type"];
const PROVIDER_ALIASES: &[&str] = &["provider_id", "attending_physician_id"];

pub const DEFAULT_ENCOUNTER_TYPE: &str = "Outpatient Visit";
pub const DEFAULT_DEPARTMENT: &str = "Primary Care";
pub const DEFAULT_STATUS: &str = "completed";

/// `(patient, calendar date)`; time of day is discarded
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncounterKey {
    patient_id: PatientId,
    date: NaiveDate,
}

impl EncounterKey {
    pub fn new(patient_id: PatientId, date: NaiveDate) -> Self {
        Self { patient_id, date }
    }

    pub fn from_datetime(patient_id: PatientId, at: &NaiveDateTime) -> Self {
        Self::new(patient_id, at.date())
    }

    pub fn patient_id(&self) -> &PatientId {
        &self.patient_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

impl fmt::Display for EncounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.patient_id, self.date.format("%Y-%m-%d"))
    }
}

/// Encounter key to encounter identifier; first registration wins
///
/// Also tracks every encounter identifier known to exist, including ones
/// that lost a key to an earlier registration.
#[derive(Debug, Clone, Default)]
pub struct EncounterMap {
    entries: HashMap<EncounterKey, EncounterId>,
    known_ids: HashSet<EncounterId>,
}

impl EncounterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` for `key` unless the key is already mapped
    ///
    /// Returns `true` if the entry was added.
    pub fn register(&mut self, key: EncounterKey, id: EncounterId) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.known_ids.insert(id.clone());
        self.entries.insert(key, id);
        true
    }

    /// Record that `id` exists without mapping a key to it
    pub fn mark_known(&mut self, id: EncounterId) {
        self.known_ids.insert(id);
    }

    /// Whether `id` was seeded or created
    pub fn is_known(&self, id: &EncounterId) -> bool {
        self.known_ids.contains(id)
    }

    pub fn get(&self, key: &EncounterKey) -> Option<&EncounterId> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &EncounterKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Encounter for `patient_id` on the calendar day of `at`
    pub fn lookup(&self, patient_id: &PatientId, at: &NaiveDateTime) -> Option<&EncounterId> {
        self.get(&EncounterKey::from_datetime(patient_id.clone(), at))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where new encounters come from
#[derive(Debug, Clone)]
pub enum EncounterSource {
    /// Rows exported from the snapshot's encounter table
    Snapshot(Vec<SourceRow>),
    /// Distinct `(patient, date)` pairs seen in dependent records
    Derived(BTreeSet<(PatientId, NaiveDate)>),
}

impl EncounterSource {
    /// Collects distinct `(patient, date)` pairs; entries without a date are ignored
    pub fn derived<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (PatientId, Option<NaiveDateTime>)>,
    {
        Self::Derived(
            pairs
                .into_iter()
                .filter_map(|(patient, at)| at.map(|at| (patient, at.date())))
                .collect(),
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EncounterSource::Snapshot(_) => "snapshot",
            EncounterSource::Derived(_) => "derived",
        }
    }
}

/// Counters from one resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    /// Mapping entries read from the warehouse before resolving
    pub seeded: usize,
    /// Source rows or pairs examined
    pub considered: usize,
    /// Encounters built and sent to the loader
    pub created: usize,
    /// Keys already mapped, so no encounter was synthesized
    pub reused: usize,
    pub skipped_missing_date: usize,
    pub skipped_unknown_patient: usize,
    /// Final mapping size
    pub mapped: usize,
}

/// Mapping plus what it took to build it
#[derive(Debug, Clone)]
pub struct EncounterResolution {
    pub map: EncounterMap,
    pub stats: ResolutionStats,
    pub load: LoadResult,
}

/// Resolves and persists encounters
pub struct EncounterResolver {
    store: Arc<dyn WarehouseStore>,
    loader: BatchLoader,
}

impl EncounterResolver {
    pub fn new(store: Arc<dyn WarehouseStore>, batch_size: usize) -> Self {
        Self {
            loader: BatchLoader::new(store.clone(), batch_size),
            store,
        }
    }

    /// Build the encounter mapping and insert the encounters it creates
    ///
    /// Encounters whose patient is not in `known_patients` are skipped.
    ///
    /// # Errors
    ///
    /// Fails if the persisted encounters cannot be read or the insert fails.
    pub async fn resolve(
        &self,
        source: EncounterSource,
        known_patients: &HashSet<PatientId>,
    ) -> Result<EncounterResolution> {
        let mut map = EncounterMap::new();
        let mut stats = ResolutionStats::default();

        for entry in self.store.encounter_index().await? {
            map.mark_known(entry.encounter_id.clone());
            if map.register(
                EncounterKey::new(entry.patient_id, entry.encounter_date),
                entry.encounter_id,
            ) {
                stats.seeded += 1;
            }
        }

        tracing::info!(
            source = source.kind(),
            seeded = stats.seeded,
            "Resolving encounters"
        );

        let encounters = match source {
            EncounterSource::Snapshot(rows) => {
                from_snapshot(&rows, known_patients, &mut map, &mut stats)
            }
            EncounterSource::Derived(pairs) => {
                synthesize(pairs, known_patients, &mut map, &mut stats)
            }
        };
        stats.created = encounters.len();
        stats.mapped = map.len();

        if stats.skipped_missing_date > 0 {
            tracing::warn!(
                count = stats.skipped_missing_date,
                "Skipped encounters without a usable date"
            );
        }
        if stats.skipped_unknown_patient > 0 {
            tracing::warn!(
                count = stats.skipped_unknown_patient,
                "Skipped encounters for unknown patients"
            );
        }

        let load = self.loader.load(&encounters).await?;

        tracing::info!(
            considered = stats.considered,
            created = stats.created,
            reused = stats.reused,
            mapped = stats.mapped,
            "Encounter resolution complete"
        );

        Ok(EncounterResolution { map, stats, load })
    }
}

fn known_patient(
    raw: Option<&str>,
    known_patients: &HashSet<PatientId>,
) -> Option<PatientId> {
    raw.and_then(|p| PatientId::new(p).ok())
        .filter(|p| known_patients.contains(p))
}

fn from_snapshot(
    rows: &[SourceRow],
    known_patients: &HashSet<PatientId>,
    map: &mut EncounterMap,
    stats: &mut ResolutionStats,
) -> Vec<Encounter> {
    let mut encounters = Vec::new();

    for row in rows {
        stats.considered += 1;

        let Some(raw_date) = row.first_non_null(DATE_ALIASES) else {
            stats.skipped_missing_date += 1;
            continue;
        };
        let Some(encounter_date) = dates::parse_datetime(raw_date) else {
            tracing::debug!(value = raw_date, "Unparsable encounter date");
            stats.skipped_missing_date += 1;
            continue;
        };

        let Some(patient_id) = known_patient(row.text("patient_id"), known_patients) else {
            tracing::debug!(patient_id = ?row.text("patient_id"), "Encounter patient not loaded");
            stats.skipped_unknown_patient += 1;
            continue;
        };

        let key = EncounterKey::from_datetime(patient_id.clone(), &encounter_date);
        let encounter_id = match row.text("encounter_id").and_then(|v| EncounterId::new(v).ok()) {
            Some(id) => id,
            None if map.contains(&key) => {
                stats.reused += 1;
                continue;
            }
            None => EncounterId::generate(),
        };

        let provider_id = row
            .first_non_null(PROVIDER_ALIASES)
            .and_then(|p| ProviderId::new(p).ok())
            .unwrap_or_else(|| ProviderId::fallback_for(&patient_id));

        map.mark_known(encounter_id.clone());
        map.register(key, encounter_id.clone());
        encounters.push(Encounter {
            encounter_id,
            patient_id,
            encounter_date,
            encounter_type: row
                .first_non_null(TYPE_ALIASES)
                .unwrap_or(DEFAULT_ENCOUNTER_TYPE)
                .trim()
                .to_string(),
            provider_id,
            department: row
                .owned("department")
                .unwrap_or_else(|| DEFAULT_DEPARTMENT.to_string()),
            status: row
                .owned("status")
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        });
    }

    encounters
}

fn synthesize(
    pairs: BTreeSet<(PatientId, NaiveDate)>,
    known_patients: &HashSet<PatientId>,
    map: &mut EncounterMap,
    stats: &mut ResolutionStats,
) -> Vec<Encounter> {
    let mut encounters = Vec::new();

    for (patient_id, date) in pairs {
        stats.considered += 1;

        if !known_patients.contains(&patient_id) {
            tracing::debug!(patient_id = %patient_id, "Encounter patient not loaded");
            stats.skipped_unknown_patient += 1;
            continue;
        }

        let key = EncounterKey::new(patient_id.clone(), date);
        if map.contains(&key) {
            stats.reused += 1;
            continue;
        }

        let encounter_id = EncounterId::generate();
        map.register(key, encounter_id.clone());
        encounters.push(Encounter {
            encounter_id,
            provider_id: ProviderId::fallback_for(&patient_id),
            patient_id,
            encounter_date: date.and_time(chrono::NaiveTime::MIN),
            encounter_type: DEFAULT_ENCOUNTER_TYPE.to_string(),
            department: DEFAULT_DEPARTMENT.to_string(),
            status: DEFAULT_STATUS.to_string(),
        });
    }

    encounters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::{Patient, Table};

    fn pid(id: &str) -> PatientId {
        PatientId::new(id).unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn store_with_patients(ids: &[&str]) -> (Arc<MemoryStore>, HashSet<PatientId>) {
        let store = Arc::new(MemoryStore::new());
        let patients: Vec<Patient> = ids
            .iter()
            .map(|id| Patient {
                patient_id: pid(id),
                first_name: None,
                last_name: None,
                date_of_birth: day("1970-01-01"),
                gender: None,
                address: None,
                city: None,
                state: None,
                zip_code: None,
                phone_number: None,
            })
            .collect();
        BatchLoader::new(store.clone(), 100)
            .load(&patients)
            .await
            .unwrap();
        (store, ids.iter().map(|id| pid(id)).collect())
    }

    #[test]
    fn test_key_display() {
        let key = EncounterKey::new(pid("P1"), day("2023-05-01"));
        assert_eq!(key.to_string(), "P1_2023-05-01");
    }

    #[test]
    fn test_map_first_registration_wins() {
        let mut map = EncounterMap::new();
        let key = EncounterKey::new(pid("P1"), day("2023-05-01"));
        assert!(map.register(key.clone(), EncounterId::new("E1").unwrap()));
        assert!(!map.register(key.clone(), EncounterId::new("E2").unwrap()));
        assert_eq!(map.get(&key).unwrap().as_str(), "E1");
        assert!(map.is_known(&EncounterId::new("E1").unwrap()));
        assert!(!map.is_known(&EncounterId::new("E2").unwrap()));
    }

    #[tokio::test]
    async fn test_derived_pairs_share_one_encounter() {
        let (store, known) = store_with_patients(&["P1"]).await;
        let at = |s: &str| dates::parse_datetime(s);
        let source = EncounterSource::derived(vec![
            (pid("P1"), at("2023-05-01T08:00:00")),
            (pid("P1"), at("2023-05-01T17:45:00")),
            (pid("P1"), None),
        ]);

        let resolver = EncounterResolver::new(store.clone(), 100);
        let resolution = resolver.resolve(source, &known).await.unwrap();

        assert_eq!(resolution.stats.created, 1);
        assert_eq!(resolution.map.len(), 1);
        assert_eq!(store.row_count(Table::Encounters), 1);
    }

    #[tokio::test]
    async fn test_rerun_reuses_persisted_encounters() {
        let (store, known) = store_with_patients(&["P1"]).await;
        let resolver = EncounterResolver::new(store.clone(), 100);
        let pairs = || EncounterSource::derived(vec![(pid("P1"), dates::parse_datetime("2023-05-01"))]);

        let first = resolver.resolve(pairs(), &known).await.unwrap();
        let second = resolver.resolve(pairs(), &known).await.unwrap();

        assert_eq!(second.stats.seeded, 1);
        assert_eq!(second.stats.created, 0);
        assert_eq!(second.stats.reused, 1);
        let key = EncounterKey::new(pid("P1"), day("2023-05-01"));
        assert_eq!(first.map.get(&key), second.map.get(&key));
        assert_eq!(store.row_count(Table::Encounters), 1);
    }

    #[tokio::test]
    async fn test_snapshot_aliases_and_defaults() {
        let (store, known) = store_with_patients(&["P1", "P2"]).await;
        let rows = vec![
            SourceRow::from_iter([
                ("encounter_id", "V1"),
                ("patient_id", "P1"),
                ("visit_date", "2023-05-01 09:30:00"),
                ("visit_type", "Emergency"),
                ("attending_physician_id", "DR7"),
            ]),
            SourceRow::from_iter([("patient_id", "P2"), ("admission_date", "05/02/2023")]),
            SourceRow::from_iter([("encounter_id", "V3"), ("patient_id", "P1")]),
            SourceRow::from_iter([("patient_id", "P9"), ("encounter_date", "2023-05-03")]),
        ];

        let resolver = EncounterResolver::new(store.clone(), 100);
        let resolution = resolver
            .resolve(EncounterSource::Snapshot(rows), &known)
            .await
            .unwrap();

        assert_eq!(resolution.stats.created, 2);
        assert_eq!(resolution.stats.skipped_missing_date, 1);
        assert_eq!(resolution.stats.skipped_unknown_patient, 1);

        let stored = store.rows(Table::Encounters);
        let v1 = &stored[0];
        assert_eq!(v1["encounter_type"].as_text(), Some("Emergency"));
        assert_eq!(v1["provider_id"].as_text(), Some("DR7"));
        assert_eq!(v1["department"].as_text(), Some(DEFAULT_DEPARTMENT));
        assert_eq!(v1["status"].as_text(), Some(DEFAULT_STATUS));

        let generated = &stored[1];
        assert_eq!(generated["encounter_type"].as_text(), Some(DEFAULT_ENCOUNTER_TYPE));
        assert!(generated["provider_id"].as_text().unwrap().starts_with("PROV_"));
        let key = EncounterKey::new(pid("P2"), day("2023-05-02"));
        assert!(resolution.map.contains(&key));
    }
}

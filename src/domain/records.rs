//! Warehouse records
//!
//! One struct per table. Each implements [`TableRecord`], which fixes the
//! column list at the type level, so every batch of a given record type shares
//! the same columns.

use super::ids::{EncounterId, PatientId, ProviderId};
use super::row::SourceRow;
use super::tables::Table;
use super::value::SqlValue;
use chrono::{NaiveDate, NaiveDateTime};

/// A record that can be inserted into one warehouse table
pub trait TableRecord: Send + Sync {
    const TABLE: Table;

    /// Column names, primary key first, in the order of [`TableRecord::to_values`]
    const COLUMNS: &'static [&'static str];

    fn primary_key(&self) -> &str;

    fn to_values(&self) -> Vec<SqlValue>;
}

fn required(row: &SourceRow, field: &str) -> Result<String, String> {
    row.owned(field)
        .ok_or_else(|| format!("missing required field '{field}'"))
}

fn patient_of(row: &SourceRow) -> Result<PatientId, String> {
    PatientId::new(required(row, "patient_id")?)
}

fn encounter_of(row: &SourceRow) -> Option<EncounterId> {
    row.text("encounter_id")
        .and_then(|v| EncounterId::new(v).ok())
}

fn text(v: &Option<String>) -> SqlValue {
    SqlValue::Text(v.clone())
}

fn encounter_value(v: &Option<EncounterId>) -> SqlValue {
    SqlValue::Text(v.as_ref().map(|e| e.as_str().to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub patient_id: PatientId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub phone_number: Option<String>,
}

impl Patient {
    pub fn from_row(row: &SourceRow) -> Result<Self, String> {
        Ok(Self {
            patient_id: patient_of(row)?,
            first_name: row.owned("first_name"),
            last_name: row.owned("last_name"),
            date_of_birth: row
                .datetime("date_of_birth")
                .map(|d| d.date())
                .ok_or_else(|| "missing or invalid 'date_of_birth'".to_string())?,
            gender: row.owned("gender"),
            address: row.owned("address"),
            city: row.owned("city"),
            state: row.owned("state"),
            zip_code: row.owned("zip_code"),
            phone_number: row.owned("phone_number"),
        })
    }
}

impl TableRecord for Patient {
    const TABLE: Table = Table::Patients;
    const COLUMNS: &'static [&'static str] = &[
        "patient_id",
        "first_name",
        "last_name",
        "date_of_birth",
        "gender",
        "address",
        "city",
        "state",
        "zip_code",
        "phone_number",
    ];

    fn primary_key(&self) -> &str {
        self.patient_id.as_str()
    }

    fn to_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::text(self.patient_id.as_str()),
            text(&self.first_name),
            text(&self.last_name),
            SqlValue::Date(Some(self.date_of_birth)),
            text(&self.gender),
            text(&self.address),
            text(&self.city),
            text(&self.state),
            text(&self.zip_code),
            text(&self.phone_number),
        ]
    }
}

/// An encounter, read from the snapshot or synthesized by the resolver
#[derive(Debug, Clone, PartialEq)]
pub struct Encounter {
    pub encounter_id: EncounterId,
    pub patient_id: PatientId,
    pub encounter_date: NaiveDateTime,
    pub encounter_type: String,
    pub provider_id: ProviderId,
    pub department: String,
    pub status: String,
}

impl TableRecord for Encounter {
    const TABLE: Table = Table::Encounters;
    const COLUMNS: &'static [&'static str] = &[
        "encounter_id",
        "patient_id",
        "encounter_date",
        "encounter_type",
        "provider_id",
        "department",
        "status",
    ];

    fn primary_key(&self) -> &str {
        self.encounter_id.as_str()
    }

    fn to_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::text(self.encounter_id.as_str()),
            SqlValue::text(self.patient_id.as_str()),
            SqlValue::Timestamp(Some(self.encounter_date)),
            SqlValue::text(self.encounter_type.as_str()),
            SqlValue::text(self.provider_id.as_str()),
            SqlValue::text(self.department.as_str()),
            SqlValue::text(self.status.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub diagnosis_id: String,
    pub encounter_id: Option<EncounterId>,
    pub patient_id: PatientId,
    pub diagnosis_code: Option<String>,
    pub diagnosis_description: Option<String>,
    pub date_recorded: Option<NaiveDateTime>,
    /// Always true. Known simplification: the sources carry no ranking, so
    /// every diagnosis is stored as primary.
    pub is_primary: bool,
}

impl Diagnosis {
    pub fn from_row(row: &SourceRow) -> Result<Self, String> {
        Ok(Self {
            diagnosis_id: required(row, "diagnosis_id")?,
            encounter_id: encounter_of(row),
            patient_id: patient_of(row)?,
            diagnosis_code: row.owned("diagnosis_code"),
            diagnosis_description: row.owned("diagnosis_description"),
            date_recorded: row.datetime("date_recorded"),
            // TODO: derive primary/secondary once the source exports diagnosis rank
            is_primary: true,
        })
    }
}

impl TableRecord for Diagnosis {
    const TABLE: Table = Table::Diagnoses;
    const COLUMNS: &'static [&'static str] = &[
        "diagnosis_id",
        "encounter_id",
        "patient_id",
        "diagnosis_code",
        "diagnosis_description",
        "date_recorded",
        "is_primary",
    ];

    fn primary_key(&self) -> &str {
        &self.diagnosis_id
    }

    fn to_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::text(self.diagnosis_id.as_str()),
            encounter_value(&self.encounter_id),
            SqlValue::text(self.patient_id.as_str()),
            text(&self.diagnosis_code),
            text(&self.diagnosis_description),
            SqlValue::Timestamp(self.date_recorded),
            SqlValue::Bool(Some(self.is_primary)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Medication {
    pub medication_order_id: String,
    pub encounter_id: Option<EncounterId>,
    pub patient_id: PatientId,
    pub drug_code: Option<String>,
    pub drug_name: Option<String>,
    pub dosage: Option<String>,
    pub route: Option<String>,
    pub frequency: Option<String>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
}

impl Medication {
    pub fn from_row(row: &SourceRow) -> Result<Self, String> {
        Ok(Self {
            medication_order_id: required(row, "medication_order_id")?,
            encounter_id: encounter_of(row),
            patient_id: patient_of(row)?,
            drug_code: row.owned("drug_code"),
            drug_name: row.owned("drug_name"),
            dosage: row.owned("dosage"),
            route: row.owned("route"),
            frequency: row.owned("frequency"),
            start_date: row.datetime("start_date"),
            end_date: row.datetime("end_date"),
        })
    }
}

impl TableRecord for Medication {
    const TABLE: Table = Table::Medications;
    const COLUMNS: &'static [&'static str] = &[
        "medication_order_id",
        "encounter_id",
        "patient_id",
        "drug_code",
        "drug_name",
        "dosage",
        "route",
        "frequency",
        "start_date",
        "end_date",
    ];

    fn primary_key(&self) -> &str {
        &self.medication_order_id
    }

    fn to_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::text(self.medication_order_id.as_str()),
            encounter_value(&self.encounter_id),
            SqlValue::text(self.patient_id.as_str()),
            text(&self.drug_code),
            text(&self.drug_name),
            text(&self.dosage),
            text(&self.route),
            text(&self.frequency),
            SqlValue::Timestamp(self.start_date),
            SqlValue::Timestamp(self.end_date),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Procedure {
    pub procedure_id: String,
    pub encounter_id: Option<EncounterId>,
    pub patient_id: PatientId,
    pub procedure_code: Option<String>,
    pub procedure_description: Option<String>,
    pub date_performed: Option<NaiveDateTime>,
    pub provider_id: ProviderId,
}

impl Procedure {
    pub fn from_row(row: &SourceRow) -> Result<Self, String> {
        let patient_id = patient_of(row)?;
        let provider_id = row
            .text("provider_id")
            .and_then(|p| ProviderId::new(p).ok())
            .unwrap_or_else(|| ProviderId::fallback_for(&patient_id));
        Ok(Self {
            procedure_id: required(row, "procedure_id")?,
            encounter_id: encounter_of(row),
            patient_id,
            procedure_code: row.owned("procedure_code"),
            procedure_description: row.owned("procedure_description"),
            date_performed: row.datetime("date_performed"),
            provider_id,
        })
    }
}

impl TableRecord for Procedure {
    const TABLE: Table = Table::Procedures;
    const COLUMNS: &'static [&'static str] = &[
        "procedure_id",
        "encounter_id",
        "patient_id",
        "procedure_code",
        "procedure_description",
        "date_performed",
        "provider_id",
    ];

    fn primary_key(&self) -> &str {
        &self.procedure_id
    }

    fn to_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::text(self.procedure_id.as_str()),
            encounter_value(&self.encounter_id),
            SqlValue::text(self.patient_id.as_str()),
            text(&self.procedure_code),
            text(&self.procedure_description),
            SqlValue::Timestamp(self.date_performed),
            SqlValue::text(self.provider_id.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub observation_id: String,
    pub encounter_id: Option<EncounterId>,
    pub patient_id: PatientId,
    pub observation_code: Option<String>,
    pub observation_description: Option<String>,
    pub observation_datetime: Option<NaiveDateTime>,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    pub units: Option<String>,
    pub is_abnormal: bool,
}

impl Observation {
    pub fn from_row(row: &SourceRow) -> Result<Self, String> {
        Ok(Self {
            observation_id: required(row, "observation_id")?,
            encounter_id: encounter_of(row),
            patient_id: patient_of(row)?,
            observation_code: row.owned("observation_code"),
            observation_description: row.owned("observation_description"),
            observation_datetime: row.datetime("observation_datetime"),
            value_numeric: row.float("value_numeric"),
            value_text: row.owned("value_text"),
            units: row.owned("units"),
            is_abnormal: row.flag("is_abnormal").unwrap_or(false),
        })
    }
}

impl TableRecord for Observation {
    const TABLE: Table = Table::Observations;
    const COLUMNS: &'static [&'static str] = &[
        "observation_id",
        "encounter_id",
        "patient_id",
        "observation_code",
        "observation_description",
        "observation_datetime",
        "value_numeric",
        "value_text",
        "units",
        "is_abnormal",
    ];

    fn primary_key(&self) -> &str {
        &self.observation_id
    }

    fn to_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::text(self.observation_id.as_str()),
            encounter_value(&self.encounter_id),
            SqlValue::text(self.patient_id.as_str()),
            text(&self.observation_code),
            text(&self.observation_description),
            SqlValue::Timestamp(self.observation_datetime),
            SqlValue::Float(self.value_numeric),
            text(&self.value_text),
            text(&self.units),
            SqlValue::Bool(Some(self.is_abnormal)),
        ]
    }
}

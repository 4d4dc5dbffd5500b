//! Warehouse tables and their load order

use serde::{Deserialize, Serialize};
use std::fmt;

/// A warehouse table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Patients,
    Encounters,
    Diagnoses,
    Medications,
    Procedures,
    Observations,
}

impl Table {
    /// Parent tables must be loaded before their children
    pub const LOAD_ORDER: [Table; 6] = [
        Table::Patients,
        Table::Encounters,
        Table::Diagnoses,
        Table::Medications,
        Table::Procedures,
        Table::Observations,
    ];

    /// Tables whose rows must reference an encounter
    pub const DEPENDENTS: [Table; 4] = [
        Table::Diagnoses,
        Table::Medications,
        Table::Procedures,
        Table::Observations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Patients => "patients",
            Table::Encounters => "encounters",
            Table::Diagnoses => "diagnoses",
            Table::Medications => "medications",
            Table::Procedures => "procedures",
            Table::Observations => "observations",
        }
    }

    /// Primary key column
    pub fn primary_key(&self) -> &'static str {
        match self {
            Table::Patients => "patient_id",
            Table::Encounters => "encounter_id",
            Table::Diagnoses => "diagnosis_id",
            Table::Medications => "medication_order_id",
            Table::Procedures => "procedure_id",
            Table::Observations => "observation_id",
        }
    }

    /// Foreign key columns and the table each one references
    pub fn foreign_keys(&self) -> &'static [(&'static str, Table)] {
        match self {
            Table::Patients => &[],
            Table::Encounters => &[("patient_id", Table::Patients)],
            Table::Diagnoses | Table::Medications | Table::Procedures | Table::Observations => &[
                ("patient_id", Table::Patients),
                ("encounter_id", Table::Encounters),
            ],
        }
    }

    /// Non-key columns declared `NOT NULL`
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            Table::Patients => &["date_of_birth"],
            Table::Encounters => &["patient_id", "encounter_date"],
            Table::Diagnoses | Table::Medications | Table::Procedures | Table::Observations => {
                &["encounter_id", "patient_id"]
            }
        }
    }

    /// Looks a table up by its SQL name
    pub fn from_name(name: &str) -> Option<Table> {
        Table::LOAD_ORDER
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

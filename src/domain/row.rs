//! Loosely typed source rows
//!
//! CSV records and JSON objects are both read into a [`SourceRow`], a map of
//! field name to optional text. Empty strings are treated as missing. Typed
//! getters never fail: unparsable values become `None` and a warning is logged.

use super::dates;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRow {
    fields: BTreeMap<String, Option<String>>,
}

impl SourceRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row from CSV headers and one record
    pub fn from_csv(headers: &csv::StringRecord, record: &csv::StringRecord) -> Self {
        let mut row = Self::new();
        for (name, value) in headers.iter().zip(record.iter()) {
            row.set(name, Some(value.to_string()));
        }
        row
    }

    /// Builds a row from a JSON object; scalars are stringified, nested values kept as JSON text
    pub fn from_json(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        use serde_json::Value;

        let mut row = Self::new();
        for (name, value) in object {
            let text = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                Value::Bool(b) => Some(b.to_string()),
                Value::Number(n) => Some(n.to_string()),
                other => Some(other.to_string()),
            };
            row.set(name, text);
        }
        row
    }

    /// Sets a field; blank values are stored as missing
    pub fn set(&mut self, field: &str, value: Option<String>) {
        let value = value.filter(|v| !v.trim().is_empty());
        self.fields.insert(field.to_string(), value);
    }

    pub fn remove(&mut self, field: &str) {
        self.fields.remove(field);
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw text of a field, `None` when absent or blank
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_deref())
    }

    /// Trimmed, owned text of a field
    pub fn owned(&self, field: &str) -> Option<String> {
        self.text(field).map(|v| v.trim().to_string())
    }

    /// First non-missing value among `aliases`
    pub fn first_non_null(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| self.text(alias))
    }

    /// Parses a field as a timestamp, warning when present but unparsable
    pub fn datetime(&self, field: &str) -> Option<NaiveDateTime> {
        let raw = self.text(field)?;
        let parsed = dates::parse_datetime(raw);
        if parsed.is_none() {
            tracing::warn!(field = field, value = raw, "Unparsable date, treating as missing");
        }
        parsed
    }

    /// Parses a field as a float, warning when present but unparsable
    pub fn float(&self, field: &str) -> Option<f64> {
        let raw = self.text(field)?;
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                tracing::warn!(field = field, value = raw, "Unparsable number, treating as missing");
                None
            }
        }
    }

    /// Parses a boolean flag (`true`/`false`, `1`/`0`, `yes`/`no`)
    pub fn flag(&self, field: &str) -> Option<bool> {
        let raw = self.text(field)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "1.0" | "yes" | "y" => Some(true),
            "false" | "f" | "0" | "0.0" | "no" | "n" => Some(false),
            _ => {
                tracing::warn!(field = field, value = raw, "Unparsable flag, treating as missing");
                None
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SourceRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = SourceRow::new();
        for (k, v) in iter {
            let key: String = k.into();
            row.set(&key, Some(v.into()));
        }
        row
    }
}

//! Typed column values passed from records to storage backends

use chrono::{NaiveDate, NaiveDateTime};

/// A single nullable column value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Date(Option<NaiveDate>),
    Timestamp(Option<NaiveDateTime>),
    Float(Option<f64>),
    Bool(Option<bool>),
}

impl SqlValue {
    pub fn text(value: impl Into<String>) -> Self {
        SqlValue::Text(Some(value.into()))
    }

    pub fn is_null(&self) -> bool {
        match self {
            SqlValue::Text(v) => v.is_none(),
            SqlValue::Date(v) => v.is_none(),
            SqlValue::Timestamp(v) => v.is_none(),
            SqlValue::Float(v) => v.is_none(),
            SqlValue::Bool(v) => v.is_none(),
        }
    }

    /// Text content, if this is a non-null text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(Some(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// JSON rendering used by reports and the in-memory store
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            SqlValue::Text(Some(v)) => Value::String(v.clone()),
            SqlValue::Date(Some(v)) => Value::String(v.format("%Y-%m-%d").to_string()),
            SqlValue::Timestamp(Some(v)) => {
                Value::String(v.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            SqlValue::Float(Some(v)) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Bool(Some(v)) => Value::Bool(*v),
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_detection() {
        assert!(SqlValue::Text(None).is_null());
        assert!(SqlValue::Float(None).is_null());
        assert!(!SqlValue::text("x").is_null());
    }

    #[test]
    fn test_to_json_formats_dates() {
        let ts = NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(
            SqlValue::Timestamp(Some(ts)).to_json(),
            serde_json::json!("2023-05-01T09:30:00")
        );
        assert_eq!(SqlValue::Float(Some(f64::NAN)).to_json(), serde_json::Value::Null);
    }
}

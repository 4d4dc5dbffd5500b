//! Conversions between domain values and PostgreSQL wire types

use crate::domain::{SqlValue, Table};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::Row;

/// Boxed statement parameter
pub type SqlParam = Box<dyn ToSql + Sync + Send>;

/// `INSERT ... ON CONFLICT DO NOTHING` for one table and column list
pub fn insert_statement(table: Table, columns: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
        table.as_str(),
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Converts one row of domain values into statement parameters
pub fn to_params(values: &[SqlValue]) -> Vec<SqlParam> {
    values
        .iter()
        .map(|value| -> SqlParam {
            match value {
                SqlValue::Text(v) => Box::new(v.clone()),
                SqlValue::Date(v) => Box::new(*v),
                SqlValue::Timestamp(v) => Box::new(*v),
                SqlValue::Float(v) => Box::new(*v),
                SqlValue::Bool(v) => Box::new(*v),
            }
        })
        .collect()
}

/// Borrowed view of [`to_params`] output as `tokio_postgres` expects it
pub fn param_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

/// Decodes one result cell into JSON according to its column type
pub fn cell_to_json(row: &Row, idx: usize) -> Value {
    let ty = row.columns()[idx].type_().clone();

    fn get<'a, T>(row: &'a Row, idx: usize) -> Option<T>
    where
        T: tokio_postgres::types::FromSql<'a>,
    {
        row.try_get::<_, Option<T>>(idx).ok().flatten()
    }

    let value = if ty == Type::BOOL {
        get::<bool>(row, idx).map(Value::from)
    } else if ty == Type::INT2 {
        get::<i16>(row, idx).map(Value::from)
    } else if ty == Type::INT4 {
        get::<i32>(row, idx).map(Value::from)
    } else if ty == Type::INT8 {
        get::<i64>(row, idx).map(Value::from)
    } else if ty == Type::FLOAT4 {
        get::<f32>(row, idx).map(|v| Value::from(f64::from(v)))
    } else if ty == Type::FLOAT8 {
        get::<f64>(row, idx).map(Value::from)
    } else if ty == Type::DATE {
        get::<NaiveDate>(row, idx).map(|d| Value::from(d.to_string()))
    } else if ty == Type::TIMESTAMP {
        get::<NaiveDateTime>(row, idx)
            .map(|d| Value::from(d.format("%Y-%m-%d %H:%M:%S").to_string()))
    } else if ty == Type::TIMESTAMPTZ {
        get::<DateTime<Utc>>(row, idx).map(|d| Value::from(d.to_rfc3339()))
    } else if ty == Type::JSON || ty == Type::JSONB {
        get::<Value>(row, idx)
    } else if ty == Type::UUID {
        get::<uuid::Uuid>(row, idx).map(|u| Value::from(u.to_string()))
    } else {
        // NUMERIC and friends have no decoder; queries cast them to float8
        match row.try_get::<_, Option<String>>(idx) {
            Ok(v) => v.map(Value::from),
            Err(_) => Some(Value::from(format!("<{}>", ty.name()))),
        }
    };

    value.unwrap_or(Value::Null)
}

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use core::fmt;
use model::{
    core::value::Value,
    records::row::{FieldValue, RowData},
};
use mysql_async::{Row as MySqlRow, Value as MySqlValue, consts::ColumnType};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::fmt::Formatter;
use tokio_postgres::{Row as PgRow, types::Json as PgJson};
use tracing::warn;
use uuid::Uuid;

pub enum DbRow<'a> {
    MySqlRow(&'a MySqlRow),
    PostgresRow(&'a PgRow),
}

impl DbRow<'_> {
    pub fn to_row_data(&self) -> RowData {
        let field_values = match self {
            DbRow::PostgresRow(row) => row
                .columns()
                .iter()
                .enumerate()
                .map(|(idx, column)| FieldValue {
                    name: column.name().to_string(),
                    value: pg_value(row, idx, column.type_().name()),
                })
                .collect(),
            DbRow::MySqlRow(row) => row
                .columns_ref()
                .iter()
                .enumerate()
                .map(|(idx, column)| FieldValue {
                    name: column.name_str().into_owned(),
                    value: row
                        .as_ref(idx)
                        .map(|value| mysql_value(value, column.column_type()))
                        .unwrap_or(Value::Null),
                })
                .collect(),
        };

        RowData::new(field_values)
    }
}

fn pg_value(row: &PgRow, idx: usize, type_name: &str) -> Value {
    let value = match type_name {
        "int2" => row.try_get::<_, Option<i16>>(idx).map(|v| v.map(|v| Value::Int(v.into()))),
        "int4" => row.try_get::<_, Option<i32>>(idx).map(|v| v.map(|v| Value::Int(v.into()))),
        "int8" => row.try_get::<_, Option<i64>>(idx).map(|v| v.map(Value::Int)),
        "oid" => row.try_get::<_, Option<u32>>(idx).map(|v| v.map(|v| Value::Uint(v.into()))),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)
            .map(|v| v.map(|v| Value::Float(v.into()))),
        "float8" => row.try_get::<_, Option<f64>>(idx).map(|v| v.map(Value::Float)),
        "numeric" => row
            .try_get::<_, Option<Decimal>>(idx)
            .map(|v| v.and_then(|d| d.to_f64()).map(Value::Float)),
        "bool" => row.try_get::<_, Option<bool>>(idx).map(|v| v.map(Value::Boolean)),
        "json" | "jsonb" => row
            .try_get::<_, Option<PgJson<serde_json::Value>>>(idx)
            .map(|v| v.map(|json| Value::Json(json.0))),
        "uuid" => row.try_get::<_, Option<Uuid>>(idx).map(|v| v.map(Value::Uuid)),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx).map(|v| v.map(Value::Bytes)),
        "date" => row.try_get::<_, Option<NaiveDate>>(idx).map(|v| v.map(Value::Date)),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map(|v| v.map(|ts| Value::Timestamp(ts.and_utc()))),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .map(|v| v.map(Value::Timestamp)),
        _ => row.try_get::<_, Option<String>>(idx).map(|v| v.map(Value::String)),
    };

    match value {
        Ok(Some(value)) => value,
        Ok(None) => Value::Null,
        Err(err) => {
            warn!(column = idx, type_name, %err, "Unreadable column value");
            Value::Null
        }
    }
}

fn mysql_value(value: &MySqlValue, column_type: ColumnType) -> Value {
    match value {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Int(v) => Value::Int(*v),
        MySqlValue::UInt(v) => Value::Uint(*v),
        MySqlValue::Float(v) => Value::Float((*v).into()),
        MySqlValue::Double(v) => Value::Float(*v),
        MySqlValue::Bytes(bytes) => mysql_text(bytes, column_type),
        MySqlValue::Date(year, month, day, hour, minute, second, micros) => {
            NaiveDate::from_ymd_opt((*year).into(), (*month).into(), (*day).into())
                .and_then(|date| {
                    date.and_hms_micro_opt(
                        (*hour).into(),
                        (*minute).into(),
                        (*second).into(),
                        *micros,
                    )
                })
                .map(|ts| Value::Timestamp(ts.and_utc()))
                .unwrap_or(Value::Null)
        }
        MySqlValue::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if *negative { "-" } else { "" };
            let hours = u32::from(*hours) + days * 24;
            Value::String(format!(
                "{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"
            ))
        }
    }
}

/// The text protocol returns every value as bytes; recover the column's type.
fn mysql_text(bytes: &[u8], column_type: ColumnType) -> Value {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return Value::Bytes(bytes.to_vec());
    };

    match column_type {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_YEAR => text
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| text.parse::<u64>().map(Value::Uint))
            .unwrap_or_else(|_| Value::String(text.to_string())),
        ColumnType::MYSQL_TYPE_FLOAT
        | ColumnType::MYSQL_TYPE_DOUBLE
        | ColumnType::MYSQL_TYPE_DECIMAL
        | ColumnType::MYSQL_TYPE_NEWDECIMAL => text
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        ColumnType::MYSQL_TYPE_JSON => serde_json::from_str(text)
            .map(Value::Json)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        ColumnType::MYSQL_TYPE_DATE => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Value::Date)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}

impl fmt::Debug for DbRow<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DbRow::MySqlRow(row) => write!(f, "{row:?}"),
            DbRow::PostgresRow(row) => write!(f, "{row:?}"),
        }
    }
}

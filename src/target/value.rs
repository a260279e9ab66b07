//! Binary parameter encoding of source values for PostgreSQL.
//!
//! Source values carry only a storage class, while the prepared INSERT
//! statement knows the declared type of every target column. Each value is
//! coerced to that declared type at bind time; a value that cannot be
//! represented fails the row.

use crate::types::SqlValue;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::error::Error;
use std::str::FromStr;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Integer(v) => integer_to_sql(*v, ty, out),
            SqlValue::Real(v) => real_to_sql(*v, ty, out),
            SqlValue::Text(s) => text_to_sql(s, ty, out),
            SqlValue::Blob(b) => blob_to_sql(b, ty, out),
        }
    }

    // Every type is accepted up front; unsupported pairs are rejected per value.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn is_text_type(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN)
}

fn unsupported(value: &SqlValue, ty: &Type) -> BoxError {
    format!("cannot encode {} value as {}", value.kind(), ty).into()
}

/// Exact decimal for a NUMERIC column; scientific notation is accepted
fn parse_decimal(s: &str) -> Result<Decimal, BoxError> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| format!("invalid numeric literal '{}'", s).into())
}

fn integer_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT8 => v.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::BOOL => (v != 0).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(v).to_sql(ty, out),
        _ if is_text_type(ty) => v.to_string().to_sql(ty, out),
        _ => Err(unsupported(&SqlValue::Integer(v), ty)),
    }
}

fn real_to_sql(v: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::FLOAT8 => v.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::NUMERIC => Decimal::from_f64_retain(v)
            .ok_or_else(|| format!("real value {} has no numeric representation", v))?
            .to_sql(ty, out),
        _ if is_text_type(ty) => v.to_string().to_sql(ty, out),
        _ => Err(unsupported(&SqlValue::Real(v), ty)),
    }
}

fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if is_text_type(ty) {
        return s.to_sql(ty, out);
    }
    let trimmed = s.trim();
    match *ty {
        Type::INT8 => trimmed.parse::<i64>()?.to_sql(ty, out),
        Type::INT4 => trimmed.parse::<i32>()?.to_sql(ty, out),
        Type::INT2 => trimmed.parse::<i16>()?.to_sql(ty, out),
        Type::FLOAT8 => trimmed.parse::<f64>()?.to_sql(ty, out),
        Type::FLOAT4 => trimmed.parse::<f32>()?.to_sql(ty, out),
        Type::NUMERIC => parse_decimal(trimmed)?.to_sql(ty, out),
        Type::BOOL => parse_bool(trimmed)?.to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")?.to_sql(ty, out),
        Type::TIME => NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")?.to_sql(ty, out),
        Type::TIMESTAMP => parse_naive_datetime(trimmed)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_utc_datetime(trimmed)?.to_sql(ty, out),
        Type::UUID => Uuid::parse_str(trimmed)?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        Type::BYTEA => s.as_bytes().to_sql(ty, out),
        _ => Err(unsupported(&SqlValue::Text(s.to_string()), ty)),
    }
}

fn blob_to_sql(b: &[u8], ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::BYTEA => b.to_sql(ty, out),
        Type::UUID => Uuid::from_slice(b)?.to_sql(ty, out),
        _ => Err(unsupported(&SqlValue::Blob(b.to_vec()), ty)),
    }
}

fn parse_bool(s: &str) -> Result<bool, BoxError> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "n" | "no" | "off" => Ok(false),
        _ => Err(format!("invalid boolean literal '{}'", s).into()),
    }
}

fn parse_naive_datetime(s: &str) -> Result<NaiveDateTime, BoxError> {
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(parsed);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("invalid timestamp literal '{}'", s))?;
    Ok(date.and_time(NaiveTime::MIN))
}

/// RFC 3339 with offset, or a naive timestamp taken as UTC
fn parse_utc_datetime(s: &str) -> Result<DateTime<Utc>, BoxError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        return Ok(parsed.with_timezone(&Utc));
    }
    Ok(parse_naive_datetime(s)?.and_utc())
}

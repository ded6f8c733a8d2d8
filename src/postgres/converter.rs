// ABOUTME: PostgreSQL value conversion to and from neutral column values
// ABOUTME: Coerces neutral values into the parameter types of a prepared statement

use crate::value::{decode_binary, encode_binary, format_timestamp, ColumnValue};
use anyhow::{anyhow, bail, Context, Result};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::error::Error;
use std::str::FromStr;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::Row;

/// Owned statement parameter
pub type SqlParam = Box<dyn ToSql + Sync + Send>;

/// Read column `index` of `row` as a neutral value
///
/// Mapping by column type:
/// - BOOL → Boolean
/// - INT2/INT4/INT8/OID → Integer
/// - FLOAT4/FLOAT8 → Float
/// - NUMERIC → Text (exact digits)
/// - TIMESTAMP → Timestamp, TIMESTAMPTZ → Timestamp in UTC
/// - DATE/TIME/JSON/JSONB/UUID → Text
/// - BYTEA → Binary
/// - character types, and anything else readable as text → Text
pub fn to_neutral(row: &Row, index: usize) -> Result<ColumnValue> {
    let column = &row.columns()[index];
    let ty = column.type_();

    let value: ColumnValue = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(index)?.into(),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(index)?
            .map(i64::from)
            .into(),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(index)?
            .map(i64::from)
            .into(),
        Type::INT8 => row.try_get::<_, Option<i64>>(index)?.into(),
        Type::OID => row
            .try_get::<_, Option<u32>>(index)?
            .map(i64::from)
            .into(),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(index)?
            .map(|f| f.to_string().parse::<f64>().unwrap_or(f as f64))
            .into(),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(index)?.into(),
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(index)
            .with_context(|| {
                format!(
                    "NUMERIC value in column '{}' does not fit a 96-bit decimal",
                    column.name()
                )
            })?
            .map(|d| d.to_string())
            .into(),
        Type::TIMESTAMP => row.try_get::<_, Option<NaiveDateTime>>(index)?.into(),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(index)?
            .map(|ts| ts.naive_utc())
            .into(),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(index)?
            .map(|d| d.format("%Y-%m-%d").to_string())
            .into(),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(index)?
            .map(|t| t.format("%H:%M:%S%.f").to_string())
            .into(),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(index)?
            .map(|v| v.to_string())
            .into(),
        Type::UUID => row
            .try_get::<_, Option<uuid::Uuid>>(index)?
            .map(|u| u.to_string())
            .into(),
        Type::BYTEA => match row.try_get::<_, Option<Vec<u8>>>(index)? {
            Some(bytes) => ColumnValue::Binary(bytes),
            None => ColumnValue::Null,
        },
        _ => row
            .try_get::<_, Option<String>>(index)
            .map_err(|e| {
                anyhow!(
                    "Column '{}' has unsupported type {}: {}",
                    column.name(),
                    ty,
                    e
                )
            })?
            .into(),
    };

    Ok(value)
}

/// NULL parameter accepted by every column type
#[derive(Debug)]
struct SqlNull;

impl ToSql for SqlNull {
    fn to_sql(&self, _: &Type, _: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Convert a neutral value into a parameter for a column of type `ty`
///
/// PostgreSQL does not coerce binary-protocol parameters, so the neutral
/// value is reshaped to the Rust type the statement expects. Text is parsed
/// into numeric, temporal, JSON and UUID columns; base64 text is decoded for
/// BYTEA. A value that cannot be coerced is an error.
pub fn from_neutral(value: &ColumnValue, ty: &Type) -> Result<SqlParam> {
    let param = match value {
        ColumnValue::Null => Box::new(SqlNull) as SqlParam,
        ColumnValue::Boolean(b) => from_bool(*b, ty)?,
        ColumnValue::Integer(i) => from_integer(*i, ty)?,
        ColumnValue::Float(f) => from_float(*f, ty)?,
        ColumnValue::Text(s) => from_text(s, ty)?,
        ColumnValue::Timestamp(ts) => from_timestamp(ts, ty)?,
        ColumnValue::Binary(bytes) => match *ty {
            Type::BYTEA => Box::new(bytes.clone()),
            _ => from_text(&encode_binary(bytes), ty)?,
        },
    };
    Ok(param)
}

fn from_bool(b: bool, ty: &Type) -> Result<SqlParam> {
    let param: SqlParam = match *ty {
        Type::BOOL => Box::new(b),
        Type::INT2 | Type::INT4 | Type::INT8 | Type::NUMERIC => from_integer(i64::from(b), ty)?,
        _ => from_text(if b { "true" } else { "false" }, ty)?,
    };
    Ok(param)
}

fn from_integer(i: i64, ty: &Type) -> Result<SqlParam> {
    let param: SqlParam = match *ty {
        Type::BOOL => Box::new(i != 0),
        Type::INT2 => Box::new(i16::try_from(i).with_context(|| out_of_range(i, ty))?),
        Type::INT4 => Box::new(i32::try_from(i).with_context(|| out_of_range(i, ty))?),
        Type::INT8 => Box::new(i),
        Type::OID => Box::new(u32::try_from(i).with_context(|| out_of_range(i, ty))?),
        Type::FLOAT4 => Box::new(i as f32),
        Type::FLOAT8 => Box::new(i as f64),
        Type::NUMERIC => Box::new(Decimal::from(i)),
        // Integers bound to a timestamp are epoch milliseconds
        Type::TIMESTAMP | Type::TIMESTAMPTZ => {
            let ts = Utc
                .timestamp_millis_opt(i)
                .single()
                .with_context(|| out_of_range(i, ty))?;
            if *ty == Type::TIMESTAMPTZ {
                Box::new(ts)
            } else {
                Box::new(ts.naive_utc())
            }
        }
        _ => from_text(&i.to_string(), ty)?,
    };
    Ok(param)
}

fn from_float(f: f64, ty: &Type) -> Result<SqlParam> {
    let param: SqlParam = match *ty {
        Type::FLOAT4 => Box::new(f as f32),
        Type::FLOAT8 => Box::new(f),
        Type::NUMERIC => Box::new(
            Decimal::try_from(f).with_context(|| format!("{} cannot be stored as NUMERIC", f))?,
        ),
        Type::INT2 | Type::INT4 | Type::INT8 if f.fract() == 0.0 => {
            from_integer(f as i64, ty)?
        }
        _ => from_text(&f.to_string(), ty)?,
    };
    Ok(param)
}

fn from_timestamp(ts: &NaiveDateTime, ty: &Type) -> Result<SqlParam> {
    let param: SqlParam = match *ty {
        Type::TIMESTAMP => Box::new(*ts),
        Type::TIMESTAMPTZ => Box::new(Utc.from_utc_datetime(ts)),
        Type::DATE => Box::new(ts.date()),
        Type::TIME => Box::new(ts.time()),
        _ => from_text(&format_timestamp(ts), ty)?,
    };
    Ok(param)
}

fn from_text(s: &str, ty: &Type) -> Result<SqlParam> {
    let param: SqlParam = match *ty {
        Type::BOOL => Box::new(parse_bool(s)?),
        Type::INT2 => Box::new(s.trim().parse::<i16>().with_context(|| cannot_parse(s, ty))?),
        Type::INT4 => Box::new(s.trim().parse::<i32>().with_context(|| cannot_parse(s, ty))?),
        Type::INT8 => Box::new(s.trim().parse::<i64>().with_context(|| cannot_parse(s, ty))?),
        Type::OID => Box::new(s.trim().parse::<u32>().with_context(|| cannot_parse(s, ty))?),
        Type::FLOAT4 => Box::new(s.trim().parse::<f32>().with_context(|| cannot_parse(s, ty))?),
        Type::FLOAT8 => Box::new(s.trim().parse::<f64>().with_context(|| cannot_parse(s, ty))?),
        Type::NUMERIC => Box::new(
            Decimal::from_str(s.trim())
                .or_else(|_| Decimal::from_scientific(s.trim()))
                .with_context(|| cannot_parse(s, ty))?,
        ),
        Type::DATE => Box::new(
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").with_context(|| cannot_parse(s, ty))?,
        ),
        Type::TIME => Box::new(
            NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                .with_context(|| cannot_parse(s, ty))?,
        ),
        Type::TIMESTAMP => Box::new(parse_naive_datetime(s).with_context(|| cannot_parse(s, ty))?),
        Type::TIMESTAMPTZ => Box::new(match DateTime::parse_from_rfc3339(s.trim()) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(_) => Utc.from_utc_datetime(
                &parse_naive_datetime(s).with_context(|| cannot_parse(s, ty))?,
            ),
        }),
        Type::JSON | Type::JSONB => Box::new(
            serde_json::from_str::<serde_json::Value>(s).with_context(|| cannot_parse(s, ty))?,
        ),
        Type::UUID => Box::new(uuid::Uuid::parse_str(s.trim()).with_context(|| cannot_parse(s, ty))?),
        Type::BYTEA => Box::new(decode_binary(s).with_context(|| cannot_parse(s, ty))?),
        _ => Box::new(s.to_string()),
    };
    Ok(param)
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Ok(false),
        other => bail!("'{}' is not a boolean", other),
    }
}

fn parse_naive_datetime(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .ok_or_else(|| anyhow!("'{}' is not a date-time", s))
}

fn out_of_range(i: i64, ty: &Type) -> String {
    format!("{} is out of range for {}", i, ty)
}

fn cannot_parse(s: &str, ty: &Type) -> String {
    let preview: String = s.chars().take(40).collect();
    format!("Cannot convert '{}' to {}", preview, ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(param: &SqlParam, ty: &Type) -> Option<Vec<u8>> {
        let mut buf = BytesMut::new();
        match param.to_sql_checked(ty, &mut buf).unwrap() {
            IsNull::Yes => None,
            IsNull::No => Some(buf.to_vec()),
        }
    }

    fn assert_encodes_like<T: ToSql>(value: &ColumnValue, ty: &Type, expected: T) {
        let param = from_neutral(value, ty).unwrap();
        let mut want = BytesMut::new();
        expected.to_sql_checked(ty, &mut want).unwrap();
        assert_eq!(encode(&param, ty), Some(want.to_vec()), "{:?} as {}", value, ty);
    }

    #[test]
    fn test_null_binds_for_any_type() {
        for ty in [Type::INT4, Type::TEXT, Type::TIMESTAMP, Type::BYTEA, Type::JSONB] {
            let param = from_neutral(&ColumnValue::Null, &ty).unwrap();
            assert_eq!(encode(&param, &ty), None);
        }
    }

    #[test]
    fn test_integer_narrows_to_column_width() {
        assert_encodes_like(&ColumnValue::Integer(7), &Type::INT2, 7i16);
        assert_encodes_like(&ColumnValue::Integer(7), &Type::INT4, 7i32);
        assert_encodes_like(&ColumnValue::Integer(7), &Type::INT8, 7i64);
        assert!(from_neutral(&ColumnValue::Integer(1 << 40), &Type::INT4).is_err());
    }

    #[test]
    fn test_integer_to_bool_uses_nonzero() {
        assert_encodes_like(&ColumnValue::Integer(1), &Type::BOOL, true);
        assert_encodes_like(&ColumnValue::Integer(0), &Type::BOOL, false);
    }

    #[test]
    fn test_text_is_parsed_for_typed_columns() {
        assert_encodes_like(
            &ColumnValue::Text("12345.6789".into()),
            &Type::NUMERIC,
            Decimal::from_str("12345.6789").unwrap(),
        );
        assert_encodes_like(
            &ColumnValue::Text("2024-01-02".into()),
            &Type::DATE,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        );
        assert_encodes_like(
            &ColumnValue::Text(r#"{"a":1}"#.into()),
            &Type::JSONB,
            serde_json::json!({"a": 1}),
        );
        assert!(from_neutral(&ColumnValue::Text("abc".into()), &Type::INT4).is_err());
    }

    #[test]
    fn test_timestamp_binds_natively() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_encodes_like(&ColumnValue::Timestamp(ts), &Type::TIMESTAMP, ts);
        assert_encodes_like(
            &ColumnValue::Timestamp(ts),
            &Type::TIMESTAMPTZ,
            Utc.from_utc_datetime(&ts),
        );
        assert_encodes_like(
            &ColumnValue::Timestamp(ts),
            &Type::TEXT,
            "2024-01-02 03:04:05".to_string(),
        );
    }

    #[test]
    fn test_base64_text_decodes_for_bytea() {
        assert_encodes_like(
            &ColumnValue::Text("AJ+Slg==".into()),
            &Type::BYTEA,
            vec![0u8, 159, 146, 150],
        );
    }

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(!parse_bool("f").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}

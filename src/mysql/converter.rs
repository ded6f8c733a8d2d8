// ABOUTME: MySQL value conversion to and from neutral column values
// ABOUTME: Uses the result-set column metadata to pick the neutral variant

use crate::value::ColumnValue;
use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate, Timelike};
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::{Column, Value};

/// Character set number MySQL reports for binary strings and BLOBs
const BINARY_CHARSET: u16 = 63;

/// Convert one MySQL value to a neutral value
///
/// Values arrive over the binary protocol, so integers, floats and temporal
/// values are already typed. Byte strings are interpreted from the column
/// metadata:
/// - `TINYINT(1)` and `BIT(1)` → Boolean
/// - `DECIMAL` and `JSON` → Text (digits and document preserved verbatim)
/// - binary collation (`BLOB`, `BINARY`, `VARBINARY`) → Binary
/// - everything else → Text, falling back to Binary for invalid UTF-8
///
/// Zero dates (`0000-00-00`) have no neutral representation and are an error.
pub fn to_neutral(value: Value, column: &Column) -> Result<ColumnValue> {
    let column_type = column.column_type();

    match value {
        Value::NULL => Ok(ColumnValue::Null),
        Value::Int(i) => {
            if is_boolean_tinyint(column) {
                Ok(ColumnValue::Boolean(i != 0))
            } else {
                Ok(ColumnValue::Integer(i))
            }
        }
        Value::UInt(u) => {
            if is_boolean_tinyint(column) {
                return Ok(ColumnValue::Boolean(u != 0));
            }
            Ok(match i64::try_from(u) {
                Ok(i) => ColumnValue::Integer(i),
                Err(_) => ColumnValue::Text(u.to_string()),
            })
        }
        // f32 -> f64 through the shortest decimal form, so 0.1f32 stays 0.1
        Value::Float(f) => Ok(ColumnValue::Float(
            f.to_string().parse::<f64>().unwrap_or(f as f64),
        )),
        Value::Double(d) => Ok(ColumnValue::Float(d)),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            if year == 0 && month == 0 && day == 0 {
                bail!(
                    "Zero date in column '{}' cannot be represented",
                    column.name_str()
                );
            }
            let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
                .with_context(|| {
                    format!("Invalid date {:04}-{:02}-{:02}", year, month, day)
                })?;

            if matches!(
                column_type,
                ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE
            ) {
                return Ok(ColumnValue::Text(date.format("%Y-%m-%d").to_string()));
            }

            let ts = date
                .and_hms_micro_opt(hour as u32, minute as u32, second as u32, micros)
                .with_context(|| {
                    format!("Invalid time {:02}:{:02}:{:02}", hour, minute, second)
                })?;
            Ok(ColumnValue::Timestamp(ts))
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            Ok(ColumnValue::Text(format_time(
                negative, days, hours, minutes, seconds, micros,
            )))
        }
        Value::Bytes(bytes) => bytes_to_neutral(bytes, column),
    }
}

fn bytes_to_neutral(bytes: Vec<u8>, column: &Column) -> Result<ColumnValue> {
    match column.column_type() {
        ColumnType::MYSQL_TYPE_DECIMAL
        | ColumnType::MYSQL_TYPE_NEWDECIMAL
        | ColumnType::MYSQL_TYPE_JSON => Ok(ColumnValue::Text(
            String::from_utf8(bytes).context("Non UTF-8 text in numeric or JSON column")?,
        )),
        ColumnType::MYSQL_TYPE_BIT => {
            if column.column_length() == 1 {
                Ok(ColumnValue::Boolean(bytes.iter().any(|b| *b != 0)))
            } else {
                if bytes.len() > 8 {
                    bail!("BIT value of {} bytes does not fit in 64 bits", bytes.len());
                }
                let bits = bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
                Ok(match i64::try_from(bits) {
                    Ok(i) => ColumnValue::Integer(i),
                    Err(_) => ColumnValue::Text(bits.to_string()),
                })
            }
        }
        _ if is_binary_column(column) => Ok(ColumnValue::Binary(bytes)),
        _ => Ok(match String::from_utf8(bytes) {
            Ok(text) => ColumnValue::Text(text),
            Err(e) => ColumnValue::Binary(e.into_bytes()),
        }),
    }
}

fn is_boolean_tinyint(column: &Column) -> bool {
    column.column_type() == ColumnType::MYSQL_TYPE_TINY && column.column_length() == 1
}

fn is_binary_column(column: &Column) -> bool {
    column.character_set() == BINARY_CHARSET
        && (column.flags().contains(ColumnFlags::BINARY_FLAG)
            || column.flags().contains(ColumnFlags::BLOB_FLAG)
            || matches!(
                column.column_type(),
                ColumnType::MYSQL_TYPE_BLOB
                    | ColumnType::MYSQL_TYPE_TINY_BLOB
                    | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
                    | ColumnType::MYSQL_TYPE_LONG_BLOB
            ))
}

/// `[-]HHH:MM:SS[.ffffff]`, with days folded into hours like MySQL prints TIME
fn format_time(negative: bool, days: u32, hours: u8, minutes: u8, seconds: u8, micros: u32) -> String {
    let sign = if negative { "-" } else { "" };
    let total_hours = days as u64 * 24 + hours as u64;
    if micros > 0 {
        format!(
            "{}{:02}:{:02}:{:02}.{:06}",
            sign, total_hours, minutes, seconds, micros
        )
    } else {
        format!("{}{:02}:{:02}:{:02}", sign, total_hours, minutes, seconds)
    }
}

/// Convert a neutral value to a MySQL statement parameter
///
/// MySQL coerces text parameters into the column type on its own, so no
/// target type is needed. Booleans bind as 0/1 and timestamps as DATETIME.
pub fn from_neutral(value: &ColumnValue) -> Value {
    match value {
        ColumnValue::Null => Value::NULL,
        ColumnValue::Integer(i) => Value::Int(*i),
        ColumnValue::Float(f) => Value::Double(*f),
        ColumnValue::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
        ColumnValue::Boolean(b) => Value::Int(i64::from(*b)),
        ColumnValue::Timestamp(ts) => Value::Date(
            ts.year() as u16,
            ts.month() as u8,
            ts.day() as u8,
            ts.hour() as u8,
            ts.minute() as u8,
            ts.second() as u8,
            0,
        ),
        ColumnValue::Binary(bytes) => Value::Bytes(bytes.clone()),
    }
}

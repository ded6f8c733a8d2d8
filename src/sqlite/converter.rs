// ABOUTME: SQLite value conversion to and from neutral column values
// ABOUTME: Uses declared column types to recover booleans and timestamps from storage classes

use crate::value::{format_timestamp, parse_canonical_timestamp, ColumnValue};
use chrono::NaiveDateTime;
use rusqlite::types::{Value, ValueRef};

/// Convert one SQLite cell to a neutral value
///
/// SQLite stores only five storage classes, so the declared column type
/// (`decl_type`) decides the finer variant: integers in a `BOOL*` column
/// become Boolean, and text in a `DATETIME`/`TIMESTAMP` column that parses as
/// a date-time becomes Timestamp. Text that is not valid UTF-8 becomes
/// Binary rather than being altered.
pub fn to_neutral(value: ValueRef<'_>, decl_type: Option<&str>) -> ColumnValue {
    let decl = decl_type.map(|t| t.to_ascii_uppercase()).unwrap_or_default();

    match value {
        ValueRef::Null => ColumnValue::Null,
        ValueRef::Integer(i) if decl.starts_with("BOOL") => ColumnValue::Boolean(i != 0),
        ValueRef::Integer(i) => ColumnValue::Integer(i),
        ValueRef::Real(f) => ColumnValue::Float(f),
        ValueRef::Text(bytes) => {
            let text = match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(e) => return ColumnValue::Binary(e.into_bytes()),
            };
            if is_timestamp_decl(&decl) {
                if let Some(ts) = parse_sqlite_timestamp(&text) {
                    return ColumnValue::Timestamp(ts);
                }
            }
            ColumnValue::Text(text)
        }
        ValueRef::Blob(bytes) => ColumnValue::Binary(bytes.to_vec()),
    }
}

fn is_timestamp_decl(decl: &str) -> bool {
    decl.contains("DATETIME") || decl.contains("TIMESTAMP")
}

fn parse_sqlite_timestamp(text: &str) -> Option<NaiveDateTime> {
    parse_canonical_timestamp(text).or_else(|| {
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    })
}

/// Convert a neutral value to an owned SQLite parameter
///
/// Timestamps are stored as canonical text, the form SQLite's date and time
/// functions understand.
pub fn from_neutral(value: &ColumnValue) -> Value {
    match value {
        ColumnValue::Null => Value::Null,
        ColumnValue::Integer(i) => Value::Integer(*i),
        ColumnValue::Float(f) => Value::Real(*f),
        ColumnValue::Text(s) => Value::Text(s.clone()),
        ColumnValue::Boolean(b) => Value::Integer(i64::from(*b)),
        ColumnValue::Timestamp(ts) => Value::Text(format_timestamp(ts)),
        ColumnValue::Binary(bytes) => Value::Blob(bytes.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_boolean_decl_type() {
        assert_eq!(
            to_neutral(ValueRef::Integer(1), Some("BOOLEAN")),
            ColumnValue::Boolean(true)
        );
        assert_eq!(
            to_neutral(ValueRef::Integer(1), Some("INTEGER")),
            ColumnValue::Integer(1)
        );
    }

    #[test]
    fn test_datetime_text_becomes_timestamp() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(
            to_neutral(ValueRef::Text(b"2024-01-02 03:04:05"), Some("DATETIME")),
            ColumnValue::Timestamp(expected)
        );
        assert_eq!(
            to_neutral(ValueRef::Text(b"2024-01-02T03:04:05"), Some("timestamp")),
            ColumnValue::Timestamp(expected)
        );
        assert_eq!(
            to_neutral(ValueRef::Text(b"2024-01-02 03:04:05"), Some("TEXT")),
            ColumnValue::Text("2024-01-02 03:04:05".to_string())
        );
    }

    #[test]
    fn test_unparseable_datetime_stays_text() {
        assert_eq!(
            to_neutral(ValueRef::Text(b"yesterday"), Some("DATETIME")),
            ColumnValue::Text("yesterday".to_string())
        );
    }

    #[test]
    fn test_invalid_utf8_text_becomes_binary() {
        assert_eq!(
            to_neutral(ValueRef::Text(&[0x41, 0xff, 0x42]), Some("TEXT")),
            ColumnValue::Binary(vec![0x41, 0xff, 0x42])
        );
    }

    #[test]
    fn test_round_trip_through_neutral() {
        let samples = [
            Value::Null,
            Value::Integer(-3),
            Value::Real(2.5),
            Value::Text("Ann".to_string()),
            Value::Blob(vec![0, 1, 2]),
        ];
        for sample in samples {
            let neutral = to_neutral(ValueRef::from(&sample), None);
            assert_eq!(from_neutral(&neutral), sample);
        }
    }

    #[test]
    fn test_timestamp_written_as_canonical_text() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_milli_opt(3, 4, 5, 250)
            .unwrap();
        assert_eq!(
            from_neutral(&ColumnValue::Timestamp(ts)),
            Value::Text("2024-01-02 03:04:05".to_string())
        );
    }
}

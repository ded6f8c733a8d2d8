// ABOUTME: Neutral, vendor-independent cell values and column-ordered rows
// ABOUTME: Maps neutral values to and from the JSON stored in table record files

use anyhow::{bail, Result};
use base64::Engine;
use chrono::NaiveDateTime;
use regex::Regex;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::OnceLock;

/// Canonical timestamp layout used in record files (`yyyy-MM-dd HH:mm:ss`)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single cell value, independent of any database vendor.
///
/// Serializes to the JSON written in record files. Timestamps become the
/// canonical string, binary data becomes base64 text and non-finite floats
/// become strings, since JSON has no native form for any of them.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Binary(Vec<u8>),
}

impl ColumnValue {
    /// Convert a record-file JSON value back to a neutral value.
    ///
    /// Any string matching exactly `yyyy-MM-dd HH:mm:ss` is read back as a
    /// timestamp. This also catches plain text that happens to have that
    /// shape; such values are bound as timestamps on import.
    pub fn from_json(value: JsonValue) -> Result<ColumnValue> {
        match value {
            JsonValue::Null => Ok(ColumnValue::Null),
            JsonValue::Bool(b) => Ok(ColumnValue::Boolean(b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(ColumnValue::Integer(i))
                } else if n.is_u64() {
                    // Unsigned values beyond i64 keep their digits as text
                    Ok(ColumnValue::Text(n.to_string()))
                } else if let Some(f) = n.as_f64() {
                    Ok(ColumnValue::Float(f))
                } else {
                    bail!("Unsupported JSON number {}", n)
                }
            }
            JsonValue::String(s) => Ok(match parse_canonical_timestamp(&s) {
                Some(ts) => ColumnValue::Timestamp(ts),
                None => ColumnValue::Text(s),
            }),
            JsonValue::Array(_) | JsonValue::Object(_) => {
                bail!("Nested JSON values are not valid column values")
            }
        }
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        ColumnValue::Integer(v)
    }
}

impl From<f64> for ColumnValue {
    fn from(v: f64) -> Self {
        ColumnValue::Float(v)
    }
}

impl From<bool> for ColumnValue {
    fn from(v: bool) -> Self {
        ColumnValue::Boolean(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::Text(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        ColumnValue::Text(v)
    }
}

impl From<NaiveDateTime> for ColumnValue {
    fn from(v: NaiveDateTime) -> Self {
        ColumnValue::Timestamp(v)
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ColumnValue::Null)
    }
}

impl Serialize for ColumnValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ColumnValue::Null => serializer.serialize_none(),
            ColumnValue::Integer(i) => serializer.serialize_i64(*i),
            ColumnValue::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            ColumnValue::Float(f) => serializer.serialize_str(&f.to_string()),
            ColumnValue::Text(s) => serializer.serialize_str(s),
            ColumnValue::Boolean(b) => serializer.serialize_bool(*b),
            ColumnValue::Timestamp(ts) => serializer.serialize_str(&format_timestamp(ts)),
            ColumnValue::Binary(bytes) => serializer.serialize_str(&encode_binary(bytes)),
        }
    }
}

/// Format a timestamp in the canonical record-file layout (seconds precision)
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse text that matches the canonical layout exactly.
///
/// Returns `None` for anything else, including strings of the right shape
/// that are not valid date-times (e.g. month 13).
pub fn parse_canonical_timestamp(text: &str) -> Option<NaiveDateTime> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").expect("timestamp pattern is valid")
    });

    if !pattern.is_match(text) {
        return None;
    }
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok()
}

pub fn encode_binary(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn decode_binary(text: &str) -> Result<Vec<u8>> {
    Ok(base64::engine::general_purpose::STANDARD.decode(text.trim())?)
}

/// One database record: column names paired with values, in result-set order.
///
/// Column order is significant. It is the order the source query returned
/// and the order INSERT parameters are bound in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, ColumnValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Row {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Append a column, or overwrite its value in place if the name is already present
    pub fn push(&mut self, name: impl Into<String>, value: ColumnValue) {
        let name = name.into();
        match self.columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &ColumnValue> {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, ColumnValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (S, ColumnValue)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.push(name, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(RowVisitor)
    }
}

struct RowVisitor;

impl<'de> Visitor<'de> for RowVisitor {
    type Value = Row;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON object mapping column names to values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Row, A::Error> {
        let mut row = Row::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, raw)) = access.next_entry::<String, JsonValue>()? {
            let value = ColumnValue::from_json(raw)
                .map_err(|e| de::Error::custom(format!("column '{}': {}", name, e)))?;
            row.push(name, value);
        }
        Ok(row)
    }
}

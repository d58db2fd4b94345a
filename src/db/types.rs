//! Query result types for sqlgate.
//!
//! Defines the structures used to represent query results from the store,
//! and the uniform `RowRecord` handed back to callers.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Represents the raw result of executing a SQL statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data, each aligned with `columns`.
    pub rows: Vec<Row>,

    /// Time taken to execute the statement.
    pub execution_time: Duration,

    /// Number of rows in the result.
    pub row_count: usize,
}

impl QueryResult {
    /// Creates a new empty query result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query result with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
            row_count,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Converts the result into uniform row records, keeping store order.
    pub fn into_records(self) -> Vec<RowRecord> {
        let names: Vec<String> = self.columns.into_iter().map(|c| c.name).collect();
        self.rows
            .into_iter()
            .map(|row| RowRecord::from_parts(&names, row))
            .collect()
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name, as returned by the store.
    pub name: String,

    /// Store type name.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// One result row as an ordered column-name to value mapping.
///
/// Serializes as a JSON object with keys in column order. Names are unique:
/// a repeated column name keeps its first position and takes the last value,
/// so `SELECT a.id, b.id` yields a single `id` holding `b.id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowRecord {
    fields: Vec<(String, Value)>,
}

impl RowRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record by zipping column names with a row.
    fn from_parts(names: &[String], row: Row) -> Self {
        let mut record = Self {
            fields: Vec::with_capacity(names.len()),
        };
        for (name, value) in names.iter().zip(row) {
            record.insert(name.clone(), value);
        }
        record
    }

    /// Appends a column, builder style. A repeated name replaces the value.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column.into(), value.into());
        self
    }

    fn insert(&mut self, column: String, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Returns the value for a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over (column, value) pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for RowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Represents a single value from the store, in its native type.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Exact decimal, kept as its canonical text.
    Decimal(String),

    /// Text/string value.
    Text(String),

    /// Timestamp without time zone.
    Timestamp(NaiveDateTime),

    /// Timestamp with time zone, normalized to UTC.
    TimestampTz(DateTime<Utc>),

    /// Calendar date.
    Date(NaiveDate),

    /// Time of day.
    Time(NaiveTime),

    /// JSON document.
    Json(serde_json::Value),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.clone(),
            Value::Text(s) => s.clone(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::TimestampTz(ts) => ts.to_rfc3339(),
            Value::Date(d) => d.to_string(),
            Value::Time(t) => t.to_string(),
            Value::Json(j) => j.to_string(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Decimal(s) | Value::Text(s) => serializer.serialize_str(s),
            Value::Timestamp(ts) => {
                serializer.serialize_str(&ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            Value::TimestampTz(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            Value::Date(d) => serializer.serialize_str(&d.to_string()),
            Value::Time(t) => serializer.serialize_str(&t.to_string()),
            Value::Json(j) => j.serialize(serializer),
            Value::Bytes(b) => serializer.serialize_str(&BASE64.encode(b)),
        }
    }
}

// Conversion implementations for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::TimestampTz(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

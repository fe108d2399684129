//! Typed records and per-source tables.
//!
//! A [`Record`] is an ordered mapping of field name to [`Value`], tagged with
//! the source that produced it. A [`Table`] collects the records of one
//! source and tracks the union of their columns in first-seen order, so that
//! sources with data-driven schemas (JSON snapshots) still persist as one
//! rectangular table.

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::Error;

/// Rendering format for timestamp values.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A single typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Renders the value as a table cell; null renders as the empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Timestamp(_) => serializer.collect_str(self),
            Value::Text(s) => serializer.serialize_str(s),
        }
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

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One normalized observation row produced by a decoder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    source: String,
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(source: impl Into<String>) -> Self {
        Record {
            source: source.into(),
            fields: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Set a field, replacing an existing field of the same name in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Ordered sequence of records from one source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Table {
    source: String,
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    pub fn new(source: impl Into<String>) -> Self {
        Table {
            source: source.into(),
            columns: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Build a table from records, rejecting records of another source.
    pub fn from_records(
        source: impl Into<String>,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<Self, Error> {
        let mut table = Table::new(source);
        for record in records {
            table.push(record)?;
        }
        Ok(table)
    }

    pub fn push(&mut self, record: Record) -> Result<(), Error> {
        if record.source != self.source {
            return Err(Error::SourceMismatch {
                expected: self.source.clone(),
                actual: record.source,
            });
        }
        for name in record.field_names() {
            if !self.columns.iter().any(|c| c == name) {
                self.columns.push(name.to_string());
            }
        }
        self.records.push(record);
        Ok(())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate rows aligned to [`Table::columns`]; missing fields are `None`.
    pub fn rows(&self) -> impl Iterator<Item = Vec<Option<&Value>>> + '_ {
        self.records
            .iter()
            .map(move |record| self.columns.iter().map(|c| record.get(c)).collect())
    }
}

//! Externally consumable views of persisted entities.
//!
//! A [`Record`] declares its persisted columns once, in order. From that
//! list it produces a dictionary of values (`to_dict`), a column-to-type
//! description (`to_schema`) and a short `Name(col=value, ...)` form used
//! for `Display`.

use crate::state::{AgentState, WorkState};
use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use schemars::schema::RootSchema;
use serde_json::{Map, Value};
use std::net::Ipv4Addr;

/// Declared storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Id,
    Integer,
    Float,
    /// Bounded string with its maximum length.
    String(u32),
    Text,
    DateTime,
    Ipv4,
    /// Enumerated column, named after its enum type.
    Enum(&'static str),
}

impl ColumnType {
    pub fn descriptor(&self) -> String {
        match self {
            ColumnType::Id => "UUID".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::String(len) => format!("VARCHAR({len})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::DateTime => "DATETIME".to_string(),
            ColumnType::Ipv4 => "IPv4Address".to_string(),
            ColumnType::Enum(name) => (*name).to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnType) -> Self {
        Self { name, kind }
    }
}

/// An entity with a fixed list of persisted columns.
pub trait Record {
    /// Type name used in the `Display` form.
    const NAME: &'static str;

    /// Persisted columns in declaration order.
    const COLUMNS: &'static [Column];

    /// Columns shown in the `Display` form.
    const REPR_COLUMNS: &'static [&'static str];

    /// External value of one column; `Null` when unset.
    fn column(&self, name: &str) -> Value;

    fn to_dict(&self) -> Map<String, Value> {
        Self::COLUMNS
            .iter()
            .map(|c| (c.name.to_string(), self.column(c.name)))
            .collect()
    }

    fn to_schema() -> Map<String, Value> {
        Self::COLUMNS
            .iter()
            .map(|c| (c.name.to_string(), Value::String(c.kind.descriptor())))
            .collect()
    }

    fn repr(&self) -> String {
        let parts: Vec<String> = Self::REPR_COLUMNS
            .iter()
            .map(|name| format!("{name}={}", self.column(name)))
            .collect();
        format!("{}({})", Self::NAME, parts.join(", "))
    }

    /// Full JSON schema of the entity, for documentation.
    fn json_schema() -> RootSchema
    where
        Self: JsonSchema + Sized,
    {
        schemars::schema_for!(Self)
    }
}

/// Field types that have an external column form.
///
/// Enums render as their string names and timestamps as RFC 3339 in UTC.
/// Non-finite floats render as `Null`.
pub trait ColumnValue {
    fn column_value(&self) -> Value;
}

impl ColumnValue for String {
    fn column_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ColumnValue for i32 {
    fn column_value(&self) -> Value {
        Value::from(*self)
    }
}

impl ColumnValue for i64 {
    fn column_value(&self) -> Value {
        Value::from(*self)
    }
}

impl ColumnValue for f64 {
    fn column_value(&self) -> Value {
        Value::from(*self)
    }
}

impl ColumnValue for Ipv4Addr {
    fn column_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ColumnValue for DateTime<Utc> {
    fn column_value(&self) -> Value {
        Value::String(self.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl ColumnValue for WorkState {
    fn column_value(&self) -> Value {
        Value::String(self.as_str().to_string())
    }
}

impl ColumnValue for AgentState {
    fn column_value(&self) -> Value {
        Value::String(self.as_str().to_string())
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    fn column_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ColumnValue::column_value)
    }
}

/// Convert a field into its external form.
pub fn to_value<T: ColumnValue>(value: &T) -> Value {
    value.column_value()
}

/// Render an identifier through its `Display` form.
pub fn id_value(id: &impl std::fmt::Display) -> Value {
    Value::String(id.to_string())
}

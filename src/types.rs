//! Core value types
//!
//! Includes bound parameter values, the named parameter map, and the
//! store-independent row representation that typed results are mapped from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, Result};

// ============================================================================
// Values
// ============================================================================

/// A single bound parameter or result cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    /// Always UTC
    Timestamp(DateTime<Utc>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type label used in mapping errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::Json(_) => "json",
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Decimal(d) => serde_json::Value::String(d.to_string()),
            Value::Text(s) => serde_json::Value::String(s),
            Value::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
            Value::Uuid(u) => serde_json::Value::String(u.to_string()),
            Value::Json(j) => j,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    Decimal => Decimal,
    String => Text,
    DateTime<Utc> => Timestamp,
    uuid::Uuid => Uuid,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Conversion from a result cell into a Rust type
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> std::result::Result<Self, String>;
}

fn mismatch(expected: &str, value: &Value) -> String {
    format!("expected {}, found {}", expected, value.kind())
}

impl FromValue for Value {
    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Decimal(d) => {
                use rust_decimal::prelude::ToPrimitive;
                d.to_i64().ok_or_else(|| format!("decimal {} out of i64 range", d))
            }
            Value::Text(s) => s
                .parse::<i64>()
                .map_err(|_| format!("cannot convert '{}' to integer", s)),
            other => Err(mismatch("int", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| format!("integer {} out of i32 range", wide))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::Decimal(d) => {
                use rust_decimal::prelude::ToPrimitive;
                d.to_f64().ok_or_else(|| format!("decimal {} out of f64 range", d))
            }
            other => Err(mismatch("float", other)),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Int(i) => Ok(Decimal::from(*i)),
            Value::Text(s) => s
                .parse::<Decimal>()
                .map_err(|_| format!("cannot convert '{}' to decimal", s)),
            other => Err(mismatch("decimal", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Uuid(u) => Ok(u.to_string()),
            other => Err(mismatch("text", other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Timestamp(t) => Ok(*t),
            Value::Text(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| format!("invalid timestamp '{}': {}", s, e)),
            other => Err(mismatch("timestamp", other)),
        }
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => {
                uuid::Uuid::parse_str(s).map_err(|e| format!("invalid uuid '{}': {}", s, e))
            }
            other => Err(mismatch("uuid", other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        Ok(value.clone().into())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

// ============================================================================
// Named parameters
// ============================================================================

/// Name to value parameter map
///
/// Names are stored without the `@` sigil; `add("@Id", ..)` and
/// `add("Id", ..)` address the same entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params {
    values: BTreeMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter
    pub fn add(&mut self, name: impl AsRef<str>, value: impl Into<Value>) {
        let name = name.as_ref().trim_start_matches('@');
        self.values.insert(name.to_string(), value.into());
    }

    /// Builder form of [`Params::add`]
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.add(name, value);
        self
    }

    /// Merge another parameter set into this one; later entries win
    pub fn extend(&mut self, other: Params) {
        self.values.extend(other.values);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name.trim_start_matches('@'))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.add(name, value);
        }
        params
    }
}

// ============================================================================
// Rows
// ============================================================================

/// One result row: ordered column names and their values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(column)))
    }

    /// Raw cell by column name (exact match first, then ASCII case-insensitive)
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.position(column).map(|i| &self.values[i])
    }

    /// Typed cell by column name
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T> {
        let value = self
            .value(column)
            .ok_or_else(|| RepositoryError::mapping(format!("column '{}' not in row", column)))?;
        T::from_value(value)
            .map_err(|e| RepositoryError::mapping(format!("column '{}': {}", column, e)))
    }

    /// Typed cell by position
    pub fn get_at<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.values.get(index).ok_or_else(|| {
            RepositoryError::mapping(format!("row has no column at index {}", index))
        })?;
        T::from_value(value)
            .map_err(|e| RepositoryError::mapping(format!("column {}: {}", index, e)))
    }
}

/// Mapping from a result row into a typed record
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self>;
}

macro_rules! scalar_from_row {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromRow for $ty {
                fn from_row(row: &Row) -> Result<Self> {
                    row.get_at(0)
                }
            }
        )*
    };
}

scalar_from_row!(i64, i32, f64, bool, String, Decimal, DateTime<Utc>, uuid::Uuid);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_strip_sigil() {
        let mut params = Params::new();
        params.add("@Id", 7);
        params.add("Name", "Ada");

        assert_eq!(params.get("Id"), Some(&Value::Int(7)));
        assert_eq!(params.get("@Name"), Some(&Value::Text("Ada".to_string())));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_params_extend_overwrites() {
        let mut left = Params::new().with("a", 1).with("b", 2);
        let right = Params::new().with("b", 20).with("c", 30);
        left.extend(right);

        assert_eq!(left.len(), 3);
        assert_eq!(left.get("b"), Some(&Value::Int(20)));
    }

    #[test]
    fn test_value_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
    }

    #[test]
    fn test_row_lookup_case_insensitive() {
        let row = Row::from_pairs([("Id", Value::Int(1)), ("FirstName", Value::from("Ada"))]);

        assert_eq!(row.get::<i64>("Id").unwrap(), 1);
        assert_eq!(row.get::<String>("firstname").unwrap(), "Ada");
        assert!(row.get::<i64>("Missing").is_err());
    }

    #[test]
    fn test_row_optional_null() {
        let row = Row::from_pairs([("ModifiedMoment", Value::Null)]);
        let modified: Option<DateTime<Utc>> = row.get("ModifiedMoment").unwrap();
        assert!(modified.is_none());
    }

    #[test]
    fn test_row_type_mismatch() {
        let row = Row::from_pairs([("Id", Value::from("abc"))]);
        let err = row.get::<i64>("Id").unwrap_err();
        assert!(matches!(err, RepositoryError::Mapping(_)));
    }

    #[test]
    fn test_scalar_from_row_uses_first_column() {
        let row = Row::from_pairs([("count", Value::Int(25))]);
        assert_eq!(i64::from_row(&row).unwrap(), 25);
    }

    #[test]
    fn test_value_json_roundtrip_shape() {
        let value: Value = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(value, Value::Text("active".to_string()));

        let value: Value = serde_json::from_str("42").unwrap();
        assert_eq!(value, Value::Int(42));

        let json = serde_json::to_string(&Value::Bool(true)).unwrap();
        assert_eq!(json, "true");
    }
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATETIME_SPACE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
    Date,
    DateTime,
    Json,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Text => "text",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Json => "json",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("'{value}' is not a valid {ty}")]
    Invalid { ty: ColumnType, value: String },
}

impl ValueError {
    fn invalid(ty: ColumnType, value: impl fmt::Display) -> Self {
        ValueError::Invalid { ty, value: value.to_string() }
    }
}

/// A typed column value, as read from a row or decoded from a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Json(serde_json::Value),
}

impl ColumnType {
    /// Coerces the string form of a value into this column type.
    pub fn parse(&self, raw: &str) -> Result<Value, ValueError> {
        match self {
            ColumnType::Integer => raw.trim().parse::<i64>().map(Value::Int).map_err(|_| ValueError::invalid(*self, raw)),
            ColumnType::Float => raw.trim().parse::<f64>().map(Value::Float).map_err(|_| ValueError::invalid(*self, raw)),
            ColumnType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(ValueError::invalid(*self, raw)),
            },
            ColumnType::Text => Ok(Value::Text(raw.to_string())),
            ColumnType::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT).map(Value::Date).map_err(|_| ValueError::invalid(*self, raw)),
            ColumnType::DateTime => NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(raw, DATETIME_SPACE_FORMAT))
                .map(Value::DateTime)
                .map_err(|_| ValueError::invalid(*self, raw)),
            ColumnType::Json => serde_json::from_str(raw).map(Value::Json).map_err(|_| ValueError::invalid(*self, raw)),
        }
    }

    /// Coerces a JSON value into this column type. Strings go through [`ColumnType::parse`].
    pub fn from_json(&self, json: &serde_json::Value) -> Result<Value, ValueError> {
        use serde_json::Value as J;
        match (self, json) {
            (_, J::Null) => Ok(Value::Null),
            (ColumnType::Json, other) => Ok(Value::Json(other.clone())),
            (ColumnType::Text, J::String(s)) => Ok(Value::Text(s.clone())),
            (ColumnType::Text, J::Number(n)) => Ok(Value::Text(n.to_string())),
            (ColumnType::Text, J::Bool(b)) => Ok(Value::Text(b.to_string())),
            (_, J::String(s)) => self.parse(s),
            (ColumnType::Integer, J::Number(n)) => n.as_i64().map(Value::Int).ok_or_else(|| ValueError::invalid(*self, n)),
            (ColumnType::Float, J::Number(n)) => n.as_f64().map(Value::Float).ok_or_else(|| ValueError::invalid(*self, n)),
            (ColumnType::Boolean, J::Bool(b)) => Ok(Value::Bool(*b)),
            (ColumnType::Boolean, J::Number(n)) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(ValueError::invalid(*self, n)),
            },
            (ty, other) => Err(ValueError::invalid(*ty, other)),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map(J::Number).unwrap_or(J::Null),
            Value::Text(s) => J::String(s.clone()),
            Value::Date(d) => J::String(d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => J::String(dt.format(DATETIME_FORMAT).to_string()),
            Value::Json(v) => v.clone(),
        }
    }
}

impl PartialOrd for Value {
    /// Values of the same kind compare naturally; integers and floats compare numerically.
    /// Anything else (mixed kinds, JSON documents) is unordered except for equality.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.partial_cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
            (a, b) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

//! Core entity trait and typed field values.
//!
//! The materializer produces an [`EntityInstance`], an ordered name-to-value map
//! tagged with its entity type. Statically declared records such as
//! `Character` implement [`Entity`] to turn an instance into a typed struct.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EvalError;

/// Declared target type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Timestamp,
}

impl ValueType {
    /// Value assigned to an optional field whose extraction came up empty.
    pub fn default_value(self) -> FieldValue {
        match self {
            ValueType::String => FieldValue::String(String::new()),
            ValueType::Integer => FieldValue::Integer(0),
            ValueType::Float => FieldValue::Float(0.0),
            ValueType::Timestamp => FieldValue::Timestamp(DateTime::<Utc>::UNIX_EPOCH),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// A single typed value extracted from a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldValue::String(_) => ValueType::String,
            FieldValue::Integer(_) => ValueType::Integer,
            FieldValue::Float(_) => ValueType::Float,
            FieldValue::Timestamp(_) => ValueType::Timestamp,
        }
    }

    /// Convert this value to `target`.
    ///
    /// Strings are trimmed before numeric parsing. Floats narrow to integers by
    /// truncation. Timestamps parse from RFC 3339 text or integer epoch seconds.
    pub fn coerce(self, target: ValueType) -> Result<FieldValue, EvalError> {
        if self.value_type() == target {
            return Ok(self);
        }

        match (self, target) {
            (FieldValue::String(s), ValueType::Integer) => s
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| EvalError::coercion(&s, target)),
            (FieldValue::String(s), ValueType::Float) => s
                .trim()
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| EvalError::coercion(&s, target)),
            (FieldValue::String(s), ValueType::Timestamp) => DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| FieldValue::Timestamp(dt.with_timezone(&Utc)))
                .map_err(|_| EvalError::coercion(&s, target)),
            (FieldValue::Integer(i), ValueType::Float) => Ok(FieldValue::Float(i as f64)),
            (FieldValue::Integer(i), ValueType::Timestamp) => DateTime::<Utc>::from_timestamp(i, 0)
                .map(FieldValue::Timestamp)
                .ok_or_else(|| EvalError::coercion(i, target)),
            // `as` saturates, so range-check before the cast
            (FieldValue::Float(f), ValueType::Integer)
                if f.is_finite() && f.trunc() >= i64::MIN as f64 && f.trunc() < i64::MAX as f64 =>
            {
                Ok(FieldValue::Integer(f.trunc() as i64))
            }
            (value, ValueType::String) => Ok(FieldValue::String(value.to_string())),
            (value, _) => Err(EvalError::coercion(value, target)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

/// Field values of one entity, in schema declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInstance {
    entity_type: String,
    values: IndexMap<String, FieldValue>,
}

impl EntityInstance {
    pub(crate) fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            values: IndexMap::new(),
        }
    }

    pub(crate) fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.values.insert(name.into(), value);
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// String value of `name`, or `""` when missing.
    pub fn string(&self, name: &str) -> String {
        match self.values.get(name) {
            Some(FieldValue::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// Integer value of `name`, or `0` when missing or not an integer.
    pub fn integer(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(FieldValue::Integer(i)) => *i,
            _ => 0,
        }
    }

    pub fn float(&self, name: &str) -> f64 {
        match self.values.get(name) {
            Some(FieldValue::Float(f)) => *f,
            Some(FieldValue::Integer(i)) => *i as f64,
            _ => 0.0,
        }
    }

    /// Timestamp value of `name`, or the Unix epoch when missing.
    pub fn timestamp(&self, name: &str) -> DateTime<Utc> {
        match self.values.get(name) {
            Some(FieldValue::Timestamp(ts)) => *ts,
            _ => DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// A statically shaped record built from a materialized [`EntityInstance`].
///
/// `FIELDS` lists every field the record reads together with the type it
/// expects; the schema registry checks a loaded schema against it before any
/// extraction runs.
///
/// # Example
///
/// ```ignore
/// use armory_scrape::{Entity, EntityInstance, ValueType};
///
/// #[derive(serde::Serialize)]
/// struct Guild {
///     name: String,
///     members: i64,
/// }
///
/// impl Entity for Guild {
///     const NAME: &'static str = "guild";
///     const FIELDS: &'static [(&'static str, ValueType)] =
///         &[("name", ValueType::String), ("members", ValueType::Integer)];
///
///     fn from_instance(instance: &EntityInstance) -> Self {
///         Guild { name: instance.string("name"), members: instance.integer("members") }
///     }
/// }
/// ```
pub trait Entity: Serialize + Sized {
    /// Schema key of this entity type
    const NAME: &'static str;

    /// Fields this record reads and the type each must be declared with
    const FIELDS: &'static [(&'static str, ValueType)];

    fn from_instance(instance: &EntityInstance) -> Self;
}

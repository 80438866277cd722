//! Named conversion functions usable from field expressions.
//!
//! Expressions apply transforms with the pipe syntax, e.g.
//! `attr("characterInfo character", "level") | int`. The registry is closed:
//! only the built-in transforms exist, and schema files can name them but never
//! define new ones.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::entity::{FieldValue, ValueType};
use crate::error::EvalError;

/// Trait for transformation functions
///
/// A transform receives the current value (`None` when nothing was selected)
/// plus its literal arguments, and returns the new value.
pub trait TransformFn: Send + Sync {
    fn execute(
        &self,
        input: Option<FieldValue>,
        args: &[String],
    ) -> Result<Option<FieldValue>, EvalError>;
}

impl<F> TransformFn for F
where
    F: Fn(Option<FieldValue>, &[String]) -> Result<Option<FieldValue>, EvalError> + Send + Sync,
{
    fn execute(
        &self,
        input: Option<FieldValue>,
        args: &[String],
    ) -> Result<Option<FieldValue>, EvalError> {
        self(input, args)
    }
}

struct Registered {
    arity: RangeInclusive<usize>,
    func: Box<dyn TransformFn>,
}

/// Registry of the conversion functions expressions may call
pub struct TransformRegistry {
    transforms: HashMap<String, Registered>,
}

impl TransformRegistry {
    /// Registry holding every built-in transform.
    pub fn builtin() -> Self {
        let mut registry = Self {
            transforms: HashMap::new(),
        };

        registry.register("trim", 0..=0, trim);
        registry.register("lower", 0..=0, lower);
        registry.register("upper", 0..=0, upper);
        registry.register("nonempty", 0..=0, nonempty);
        registry.register("default", 1..=1, default);
        registry.register("int", 0..=0, int);
        registry.register("float", 0..=0, float);
        registry.register("timestamp", 0..=8, timestamp);

        registry
    }

    fn register(
        &mut self,
        name: &str,
        arity: RangeInclusive<usize>,
        func: impl TransformFn + 'static,
    ) {
        self.transforms.insert(
            name.to_string(),
            Registered {
                arity,
                func: Box::new(func),
            },
        );
    }

    /// Call a transform by name
    pub fn call(
        &self,
        name: &str,
        input: Option<FieldValue>,
        args: &[String],
    ) -> Result<Option<FieldValue>, EvalError> {
        let transform = self
            .transforms
            .get(name)
            .ok_or_else(|| EvalError::UnknownTransform(name.to_string()))?;

        transform.func.execute(input, args)
    }

    /// Check that `name` exists and accepts `arg_count` arguments.
    pub fn check_call(&self, name: &str, arg_count: usize) -> Result<(), EvalError> {
        let transform = self
            .transforms
            .get(name)
            .ok_or_else(|| EvalError::UnknownTransform(name.to_string()))?;

        if !transform.arity.contains(&arg_count) {
            return Err(EvalError::InvalidArgument {
                transform: name.to_string(),
                reason: format!(
                    "expected {}..={} arguments, got {}",
                    transform.arity.start(),
                    transform.arity.end(),
                    arg_count
                ),
            });
        }

        Ok(())
    }

    /// Check if a transform is registered
    pub fn has_transform(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Get list of all registered transform names
    pub fn list_transforms(&self) -> Vec<String> {
        let mut names: Vec<String> = self.transforms.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn map_string(
    input: Option<FieldValue>,
    f: impl FnOnce(String) -> String,
) -> Result<Option<FieldValue>, EvalError> {
    Ok(input.map(|value| match value {
        FieldValue::String(s) => FieldValue::String(f(s)),
        other => other,
    }))
}

fn trim(input: Option<FieldValue>, _args: &[String]) -> Result<Option<FieldValue>, EvalError> {
    map_string(input, |s| s.trim().to_string())
}

fn lower(input: Option<FieldValue>, _args: &[String]) -> Result<Option<FieldValue>, EvalError> {
    map_string(input, |s| s.to_lowercase())
}

fn upper(input: Option<FieldValue>, _args: &[String]) -> Result<Option<FieldValue>, EvalError> {
    map_string(input, |s| s.to_uppercase())
}

/// Blank strings become absent so `default` can take over.
fn nonempty(input: Option<FieldValue>, _args: &[String]) -> Result<Option<FieldValue>, EvalError> {
    Ok(input.filter(|value| match value {
        FieldValue::String(s) => !s.trim().is_empty(),
        _ => true,
    }))
}

fn default(input: Option<FieldValue>, args: &[String]) -> Result<Option<FieldValue>, EvalError> {
    match input {
        Some(value) => Ok(Some(value)),
        None => Ok(args.first().cloned().map(FieldValue::String)),
    }
}

fn int(input: Option<FieldValue>, _args: &[String]) -> Result<Option<FieldValue>, EvalError> {
    input.map(|value| value.coerce(ValueType::Integer)).transpose()
}

fn float(input: Option<FieldValue>, _args: &[String]) -> Result<Option<FieldValue>, EvalError> {
    input.map(|value| value.coerce(ValueType::Float)).transpose()
}

fn timestamp(input: Option<FieldValue>, args: &[String]) -> Result<Option<FieldValue>, EvalError> {
    let Some(value) = input else {
        return Ok(None);
    };

    let parsed = match value {
        FieldValue::Timestamp(ts) => ts,
        FieldValue::String(s) => parse_timestamp(&s, args)?,
        FieldValue::Integer(i) => parse_timestamp(&i.to_string(), args)?,
        other => return Err(EvalError::coercion(other, ValueType::Timestamp)),
    };

    Ok(Some(FieldValue::Timestamp(parsed)))
}

/// Parse `raw` with the first matching format.
///
/// Formats are chrono `strftime` patterns; date-only patterns resolve to
/// midnight UTC. `epoch_seconds` and `epoch_millis` read integer offsets. With
/// no formats the input must be RFC 3339.
pub fn parse_timestamp(raw: &str, formats: &[String]) -> Result<DateTime<Utc>, EvalError> {
    let raw = raw.trim();

    if formats.is_empty() {
        return DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| EvalError::coercion(raw, ValueType::Timestamp));
    }

    for format in formats {
        let parsed = match format.as_str() {
            "epoch_seconds" => raw
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            "epoch_millis" => raw
                .parse::<i64>()
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_millis),
            pattern => DateTime::parse_from_str(raw, pattern)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(raw, pattern)
                        .ok()
                        .map(|naive| naive.and_utc())
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(raw, pattern)
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|naive| naive.and_utc())
                }),
        };

        if let Some(ts) = parsed {
            return Ok(ts);
        }
    }

    Err(EvalError::coercion(raw, ValueType::Timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn s(value: &str) -> Option<FieldValue> {
        Some(FieldValue::String(value.to_string()))
    }

    #[test]
    fn test_builtin_vocabulary() {
        let registry = TransformRegistry::builtin();

        assert_eq!(
            registry.list_transforms(),
            vec!["default", "float", "int", "lower", "nonempty", "timestamp", "trim", "upper"]
        );
        assert!(!registry.has_transform("eval"));
    }

    #[test]
    fn test_transform_not_found() {
        let registry = TransformRegistry::builtin();

        let result = registry.call("nonexistent", None, &[]);
        assert!(matches!(result, Err(EvalError::UnknownTransform(_))));
    }

    #[test]
    fn test_check_call_arity() {
        let registry = TransformRegistry::builtin();

        assert!(registry.check_call("default", 1).is_ok());
        assert!(matches!(
            registry.check_call("default", 0),
            Err(EvalError::InvalidArgument { .. })
        ));
        assert!(matches!(
            registry.check_call("int", 2),
            Err(EvalError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_trim_and_case() {
        let registry = TransformRegistry::builtin();

        assert_eq!(registry.call("trim", s("  Adries "), &[]).unwrap(), s("Adries"));
        assert_eq!(registry.call("upper", s("eu"), &[]).unwrap(), s("EU"));
        assert_eq!(registry.call("lower", s("Aszune"), &[]).unwrap(), s("aszune"));
        assert_eq!(registry.call("trim", None, &[]).unwrap(), None);
    }

    #[test]
    fn test_nonempty_then_default() {
        let registry = TransformRegistry::builtin();
        let args = vec!["No Guild".to_string()];

        let blank = registry.call("nonempty", s("   "), &[]).unwrap();
        assert_eq!(blank, None);
        assert_eq!(registry.call("default", blank, &args).unwrap(), s("No Guild"));
        assert_eq!(registry.call("default", s("Impact"), &args).unwrap(), s("Impact"));
    }

    #[test]
    fn test_int_reports_coercion_error() {
        let registry = TransformRegistry::builtin();

        assert_eq!(
            registry.call("int", s("1204"), &[]).unwrap(),
            Some(FieldValue::Integer(1204))
        );
        assert!(matches!(
            registry.call("int", s("n/a"), &[]),
            Err(EvalError::TypeCoercion { .. })
        ));
    }

    #[test]
    fn test_timestamp_date_only_format() {
        let ts = parse_timestamp("December 10, 2008", &["%B %d, %Y".to_string()]).unwrap();

        assert_eq!((ts.year(), ts.month(), ts.day()), (2008, 12, 10));
        assert_eq!(ts.hour(), 0);
    }

    #[test]
    fn test_timestamp_falls_through_formats() {
        let formats = vec!["%Y-%m-%d".to_string(), "epoch_millis".to_string()];
        let ts = parse_timestamp("1228867200000", &formats).unwrap();

        assert_eq!((ts.year(), ts.month(), ts.day()), (2008, 12, 10));
    }

    #[test]
    fn test_timestamp_rfc3339_by_default() {
        let ts = parse_timestamp("2008-12-10T12:30:00Z", &[]).unwrap();
        assert_eq!(ts.hour(), 12);

        assert!(matches!(
            parse_timestamp("yesterday", &[]),
            Err(EvalError::TypeCoercion { .. })
        ));
    }
}

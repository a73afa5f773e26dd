//! Named post-processors applied to top-level fields after collection.

use crate::model::record::Value;
use chrono::DateTime;

type FieldProcessor = fn(Value) -> Result<Option<Value>, String>;

const FIELD_PROCESSORS: &[(&str, FieldProcessor)] = &[
    ("change", epoch_seconds_to_timestamp),
    ("priv", flag_to_bool),
];

/// Runs the processor registered for `field`, if any.
///
/// Returns `Ok(None)` when the value should be absent from the record. Empty
/// text is always dropped.
pub(crate) fn process_field(field: &str, value: Value) -> Result<Option<Value>, String> {
    if matches!(&value, Value::Text(text) if text.trim().is_empty()) {
        return Ok(None);
    }
    match FIELD_PROCESSORS.iter().find(|(name, _)| *name == field) {
        Some((_, processor)) => processor(value),
        None => Ok(Some(value)),
    }
}

fn epoch_seconds_to_timestamp(value: Value) -> Result<Option<Value>, String> {
    let Value::Text(raw) = &value else {
        return Err(format!("expected epoch seconds, got {}", value.kind_label()));
    };
    let seconds = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("`{raw}` is not an epoch timestamp"))?;
    let timestamp = DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| format!("epoch timestamp `{seconds}` is out of range"))?;
    Ok(Some(Value::Timestamp(timestamp)))
}

fn flag_to_bool(value: Value) -> Result<Option<Value>, String> {
    match value.as_text().map(str::trim) {
        Some("1") | Some("true") => Ok(Some(Value::Bool(true))),
        Some("0") | Some("false") => Ok(Some(Value::Bool(false))),
        _ => Err(format!("expected a 0/1 flag, got {value:?}")),
    }
}

//! Flattened record model.
//!
//! # Responsibility
//! - Define the normalized field map produced for every archive entity.
//! - Keep serialization deterministic so the same record always persists to the
//!   same bytes.
//!
//! # Invariants
//! - Field order is lexicographic by field name (`BTreeMap`), never insertion order.
//! - A field name maps to exactly one `Value`; list-valued fields hold `Value::List`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Top-level fields persisted as RFC 3339 text and restored to [`Value::Timestamp`].
pub const TIMESTAMP_FIELDS: &[&str] = &["change"];

/// One field value inside a [`Record`].
///
/// Serialized untagged so persisted files stay plain structured text. A
/// timestamp is written as text and never decoded from text on its own;
/// [`Record::restore_timestamps`] converts the fields named in
/// [`TIMESTAMP_FIELDS`] after loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    #[serde(skip_deserializing)]
    Timestamp(DateTime<Utc>),
    Text(String),
    List(Vec<Value>),
    Record(Record),
}

impl Value {
    /// Returns the text payload for `Value::Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Iterates a value as a sequence: lists yield their items, anything else
    /// yields itself once.
    pub fn iter_items(&self) -> std::slice::Iter<'_, Value> {
        match self {
            Self::List(items) => items.iter(),
            other => std::slice::from_ref(other).iter(),
        }
    }

    /// Short type label used in diagnostics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Timestamp(_) => "timestamp",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Self::Record(value)
    }
}

/// Mapping from field name to value, produced per entity or nested structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a field only when it holds text.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_text)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Inserts or replaces a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Appends to a list-valued field, creating the list when absent.
    ///
    /// A scalar already stored under `field` is promoted to the list's first item.
    pub fn push(&mut self, field: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.fields.get_mut(field) {
            Some(Value::List(items)) => items.push(value),
            Some(existing) => {
                let first = std::mem::replace(existing, Value::List(Vec::new()));
                *existing = Value::List(vec![first, value]);
            }
            None => {
                self.fields.insert(field.to_string(), Value::List(vec![value]));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, String, Value> {
        self.fields.iter_mut()
    }

    /// Turns persisted text under [`TIMESTAMP_FIELDS`] back into timestamps.
    ///
    /// # Errors
    /// Returns the offending field name when its text is not RFC 3339.
    pub fn restore_timestamps(&mut self) -> Result<(), String> {
        for field in TIMESTAMP_FIELDS {
            let Some(Value::Text(raw)) = self.fields.get(*field) else {
                continue;
            };
            let parsed = DateTime::parse_from_rfc3339(raw)
                .map_err(|err| format!("field `{field}` holds `{raw}`: {err}"))?;
            self.fields
                .insert(field.to_string(), Value::Timestamp(parsed.with_timezone(&Utc)));
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

//! Reference normalization.
//!
//! A reference field may hold a bare id, a nested record carrying `id`, or a
//! list of either. Every resolver and index path goes through
//! [`normalize_references`] so the polymorphism is handled in one place.
//!
//! # Invariants
//! - Normalization is pure and never fails; shapes without an id (for example a
//!   dangling `hlink` record) contribute nothing.

use crate::model::record::{Record, Value};
use std::collections::HashSet;

/// Key that carries the resolved id inside a nested reference record.
pub const REFERENCE_ID_KEY: &str = "id";

/// Separator for nested field paths such as `place.id`.
pub const PATH_SEPARATOR: char = '.';

/// Flattens a reference value into an ordered list of ids.
pub fn normalize_references(value: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    collect_ids(value, &mut ids);
    ids
}

fn collect_ids(value: &Value, ids: &mut Vec<String>) {
    match value {
        Value::Text(id) => ids.push(id.clone()),
        Value::Record(record) => {
            if let Some(id) = record.text(REFERENCE_ID_KEY) {
                ids.push(id.to_string());
            }
        }
        Value::List(items) => {
            for item in items {
                collect_ids(item, ids);
            }
        }
        Value::Bool(_) | Value::Timestamp(_) => {}
    }
}

/// Collects every value reachable under a dotted path.
///
/// Each path segment descends into nested records; lists met on the way are
/// expanded so `eventref.attribute` reaches attributes of every event reference.
/// Missing segments contribute nothing.
pub fn values_at_path<'a>(record: &'a Record, path: &str) -> Vec<&'a Value> {
    let mut segments = path.split(PATH_SEPARATOR);
    let Some(first) = segments.next() else {
        return Vec::new();
    };
    let mut current: Vec<&'a Value> = record.get(first).into_iter().collect();

    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            for item in value.iter_items() {
                if let Some(inner) = item.as_record().and_then(|nested| nested.get(segment)) {
                    next.push(inner);
                }
            }
        }
        current = next;
    }
    current
}

/// Normalized reference ids found under a dotted path, first-seen order,
/// duplicates removed.
pub fn reference_ids_at_path(record: &Record, path: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for value in values_at_path(record, path) {
        for id in normalize_references(value) {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
    }
    ids
}

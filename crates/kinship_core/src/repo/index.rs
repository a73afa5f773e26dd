//! Secondary reference index.

use crate::model::record::Record;
use crate::model::reference::reference_ids_at_path;
use std::collections::{HashMap, HashSet};

/// Posting lists keyed by (field path, referenced id).
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    postings: HashMap<String, HashMap<String, Vec<String>>>,
}

impl ReferenceIndex {
    /// Scans every record once and indexes each declared field.
    ///
    /// Records without a field contribute nothing for it.
    pub fn build<'a>(
        fields: &[&str],
        records: impl IntoIterator<Item = (&'a String, &'a Record)>,
    ) -> Self {
        let mut postings: HashMap<String, HashMap<String, Vec<String>>> = fields
            .iter()
            .map(|field| (field.to_string(), HashMap::new()))
            .collect();

        for (primary_key, record) in records {
            for field in fields {
                let Some(field_postings) = postings.get_mut(*field) else {
                    continue;
                };
                for referenced in reference_ids_at_path(record, field) {
                    field_postings
                        .entry(referenced)
                        .or_default()
                        .push(primary_key.clone());
                }
            }
        }
        Self { postings }
    }

    pub fn is_indexed(&self, field: &str) -> bool {
        self.postings.contains_key(field)
    }

    /// Primary keys referencing any of `values` through `field`.
    ///
    /// Union in query order, each key once. `None` when `field` is not indexed.
    pub fn lookup(&self, field: &str, values: &[&str]) -> Option<Vec<String>> {
        let field_postings = self.postings.get(field)?;
        let mut keys: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for value in values {
            for key in field_postings.get(*value).into_iter().flatten() {
                if seen.insert(key.as_str()) {
                    keys.push(key.clone());
                }
            }
        }
        Some(keys)
    }
}

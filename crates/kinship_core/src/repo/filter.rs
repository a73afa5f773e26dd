//! Record filter conditions for `find`.

use crate::model::record::{Record, Value};
use crate::model::reference::{values_at_path, REFERENCE_ID_KEY};

/// Conjunction-friendly condition over a stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Matches every record.
    All,
    /// Some value under the dotted `path` equals `value`; nested reference
    /// records compare by their `id`.
    FieldEquals { path: String, value: String },
    /// Record id is one of the listed ids.
    IdIn(Vec<String>),
    /// Every inner condition holds.
    And(Vec<Filter>),
}

impl Filter {
    pub fn field_equals(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self::FieldEquals {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn id_in<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::IdIn(ids.into_iter().map(Into::into).collect())
    }

    /// Combines two filters, flattening nested conjunctions.
    pub fn and(self, other: Filter) -> Self {
        let mut parts = match self {
            Self::All => return other,
            Self::And(parts) => parts,
            single => vec![single],
        };
        match other {
            Self::All => {}
            Self::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        Self::And(parts)
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::FieldEquals { path, value } => values_at_path(record, path)
                .into_iter()
                .flat_map(Value::iter_items)
                .any(|item| match item {
                    Value::Text(text) => text == value,
                    Value::Record(nested) => nested.text(REFERENCE_ID_KEY) == Some(value.as_str()),
                    Value::Bool(flag) => flag.to_string() == *value,
                    Value::Timestamp(_) | Value::List(_) => false,
                }),
            Self::IdIn(ids) => record
                .text(REFERENCE_ID_KEY)
                .is_some_and(|id| ids.iter().any(|candidate| candidate == id)),
            Self::And(parts) => parts.iter().all(|part| part.matches(record)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Filter;
    use crate::model::record::{Record, Value};

    fn namemap(key: &str, value: &str) -> Record {
        [
            ("id", Value::from(key)),
            ("type", Value::from("group_as")),
            ("key", Value::from(key)),
            ("value", Value::from(value)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn conjunction_requires_every_condition() {
        let record = namemap("Smyth", "Smith");
        assert!(Filter::All.matches(&record));
        assert!(Filter::field_equals("type", "group_as")
            .and(Filter::field_equals("key", "Smyth"))
            .matches(&record));
        assert!(!Filter::field_equals("type", "group_as")
            .and(Filter::field_equals("key", "Smith"))
            .matches(&record));
        assert!(Filter::id_in(["Smyth", "Other"]).matches(&record));
    }

    #[test]
    fn dotted_paths_reach_nested_references() {
        let mut record = Record::new();
        record.push("eventref", [("id", "E1"), ("role", "Primary")].into_iter().collect::<Record>());
        assert!(Filter::field_equals("eventref", "E1").matches(&record));
        assert!(Filter::field_equals("eventref.role", "Primary").matches(&record));
        assert!(!Filter::field_equals("eventref.role", "Witness").matches(&record));
    }
}

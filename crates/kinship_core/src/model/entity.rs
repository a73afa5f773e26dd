//! Entity types and entity envelopes.
//!
//! # Responsibility
//! - Enumerate the fixed set of archive entity collections.
//! - Pair a flattened [`Record`] with its stable identity.
//!
//! # Invariants
//! - `Entity::id` and `Entity::handle` always equal the record's `id`/`handle` fields.
//! - Collection names double as archive tag names and storage directory names.

use crate::model::record::{Record, Value};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Archive entity collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Family,
    Event,
    Place,
    Source,
    Citation,
    Note,
    MediaObject,
    Repository,
    Bookmark,
    NameMap,
    NameFormat,
}

impl EntityType {
    /// Every entity type in archive ingestion order.
    pub const ALL: [EntityType; 12] = [
        EntityType::NameFormat,
        EntityType::Event,
        EntityType::Person,
        EntityType::Family,
        EntityType::Source,
        EntityType::Citation,
        EntityType::Place,
        EntityType::MediaObject,
        EntityType::Repository,
        EntityType::Note,
        EntityType::Bookmark,
        EntityType::NameMap,
    ];

    /// Collection tag in the archive and directory name in storage.
    pub fn collection_name(self) -> &'static str {
        match self {
            Self::Person => "people",
            Self::Family => "families",
            Self::Event => "events",
            Self::Place => "places",
            Self::Source => "sources",
            Self::Citation => "citations",
            Self::Note => "notes",
            Self::MediaObject => "objects",
            Self::Repository => "repositories",
            Self::Bookmark => "bookmarks",
            Self::NameMap => "namemaps",
            Self::NameFormat => "name-formats",
        }
    }

    /// Parses a collection name (namespace prefix already stripped).
    pub fn from_collection_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|entity_type| entity_type.collection_name() == name)
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.collection_name())
    }
}

/// Ingested entity: identity plus flattened record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub entity_type: EntityType,
    /// Externally visible identifier used by every query operation.
    pub id: String,
    /// Archive-internal linking token; resolvable to exactly one `id`.
    pub handle: String,
    pub record: Record,
}

impl Entity {
    pub fn view(&self) -> EntityView<'_> {
        EntityView::new(self.entity_type, &self.record)
    }
}

const PRIVATE_MARKER: &str = "[private]";
const IDENTITY_FIELDS: &[&str] = &["id", "handle"];

/// Treatment of a private record's fields in [`EntityView::public_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateFields {
    /// Text becomes `[private]`; everything else is dropped.
    Hide,
    /// Text is prefixed with `[private] `; everything else is kept.
    Mark,
}

/// Borrowed, typed view over a stored record.
///
/// Query operations hand these out; the record stays owned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityView<'a> {
    pub entity_type: EntityType,
    pub record: &'a Record,
}

impl<'a> EntityView<'a> {
    pub fn new(entity_type: EntityType, record: &'a Record) -> Self {
        Self {
            entity_type,
            record,
        }
    }

    /// Returns the record id, or an empty string for records stored without one.
    pub fn id(&self) -> &'a str {
        self.record.text("id").unwrap_or_default()
    }

    pub fn handle(&self) -> Option<&'a str> {
        self.record.text("handle")
    }

    /// Whether the archive flagged this record as private.
    pub fn is_private(&self) -> bool {
        self.record
            .get("priv")
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    /// Copy of the record fit for presentation.
    ///
    /// Records not flagged private are returned as stored. For private ones
    /// `id` and `handle` stay intact and other top-level fields follow `mode`.
    pub fn public_record(&self, mode: PrivateFields) -> Record {
        if !self.is_private() {
            return self.record.clone();
        }
        let mut public = Record::new();
        for (field, value) in self.record {
            if IDENTITY_FIELDS.contains(&field.as_str()) {
                public.insert(field.clone(), value.clone());
                continue;
            }
            let shown = match (value, mode) {
                (Value::Text(_), PrivateFields::Hide) => Some(Value::from(PRIVATE_MARKER)),
                (_, PrivateFields::Hide) => None,
                (Value::Text(text), PrivateFields::Mark) => {
                    Some(Value::from(format!("{PRIVATE_MARKER} {text}")))
                }
                (other, PrivateFields::Mark) => Some(other.clone()),
            };
            if let Some(shown) = shown {
                public.insert(field.clone(), shown);
            }
        }
        public
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityType, EntityView, PrivateFields};
    use crate::model::record::{Record, Value};

    fn private_note() -> Record {
        let mut record: Record = [("id", "N1"), ("handle", "_n1"), ("text", "secret")]
            .into_iter()
            .collect();
        record.insert("priv", Value::Bool(true));
        record
    }

    #[test]
    fn private_records_are_masked_for_presentation() {
        let record = private_note();
        let view = EntityView::new(EntityType::Note, &record);

        let hidden = view.public_record(PrivateFields::Hide);
        assert_eq!(hidden.text("id"), Some("N1"));
        assert_eq!(hidden.text("handle"), Some("_n1"));
        assert_eq!(hidden.text("text"), Some("[private]"));
        assert!(!hidden.contains_key("priv"));

        let marked = view.public_record(PrivateFields::Mark);
        assert_eq!(marked.text("text"), Some("[private] secret"));
        assert_eq!(marked.get("priv"), Some(&Value::Bool(true)));
    }

    #[test]
    fn public_records_are_returned_as_stored() {
        let mut record = private_note();
        record.insert("priv", Value::Bool(false));
        let view = EntityView::new(EntityType::Note, &record);
        assert_eq!(view.public_record(PrivateFields::Hide), record);
    }

    #[test]
    fn collection_names_roundtrip() {
        for entity_type in EntityType::ALL {
            assert_eq!(
                EntityType::from_collection_name(entity_type.collection_name()),
                Some(entity_type)
            );
        }
        assert_eq!(EntityType::from_collection_name("tags"), None);
    }
}

//! Field cardinality table.
//!
//! Decides per entity type whether a field is single-valued or a list. The
//! table is data: supporting a new field means adding a row entry, not a branch.
//!
//! # Invariants
//! - For every entity type the single and multi sets are disjoint.
//! - Fields in neither set are [`Cardinality::Undeclared`] and stored as lists.

use crate::model::entity::EntityType;

/// Output shape of a field in a flattened record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Stored as a scalar or single nested record; never a list.
    Single,
    /// Always stored as a list, even with one occurrence.
    Multi,
    /// In neither set; stored as a list and reported while flattening.
    Undeclared,
}

const COMMON_SINGLE: &[&str] = &["id", "handle", "change", "priv"];
const COMMON_MULTI: &[&str] = &["attribute", "citationref", "noteref", "objref", "tagref", "url"];
const DATE_FIELDS: &[&str] = &["dateval", "daterange", "datespan", "datestr"];

struct CardinalityRow {
    entity_type: EntityType,
    single: &'static [&'static str],
    multi: &'static [&'static str],
    dated: bool,
}

const TABLE: &[CardinalityRow] = &[
    CardinalityRow {
        entity_type: EntityType::Person,
        single: &["gender"],
        multi: &["name", "eventref", "childof", "parentin", "personref", "address", "lds_ord"],
        dated: false,
    },
    CardinalityRow {
        entity_type: EntityType::Family,
        single: &["father", "mother", "rel"],
        multi: &["childref", "eventref", "lds_ord"],
        dated: false,
    },
    CardinalityRow {
        entity_type: EntityType::Event,
        single: &["type", "description", "place"],
        multi: &[],
        dated: true,
    },
    CardinalityRow {
        entity_type: EntityType::Place,
        single: &["ptitle", "coord", "type", "code"],
        multi: &["name", "pname", "alt_name", "placeref"],
        dated: false,
    },
    CardinalityRow {
        entity_type: EntityType::Source,
        single: &["stitle", "sauthor", "spubinfo", "sabbrev"],
        multi: &["reporef", "srcattribute", "data_item"],
        dated: false,
    },
    CardinalityRow {
        entity_type: EntityType::Citation,
        single: &["page", "confidence", "sourceref"],
        multi: &["srcattribute", "data_item"],
        dated: true,
    },
    CardinalityRow {
        entity_type: EntityType::Note,
        single: &["text", "type", "format"],
        multi: &["style"],
        dated: false,
    },
    CardinalityRow {
        entity_type: EntityType::MediaObject,
        single: &["file"],
        multi: &[],
        dated: true,
    },
    CardinalityRow {
        entity_type: EntityType::Repository,
        single: &["rname", "type"],
        multi: &["address"],
        dated: false,
    },
    CardinalityRow {
        entity_type: EntityType::Bookmark,
        single: &["target", "hlink"],
        multi: &[],
        dated: false,
    },
    CardinalityRow {
        entity_type: EntityType::NameMap,
        single: &["type", "key", "value"],
        multi: &[],
        dated: false,
    },
    CardinalityRow {
        entity_type: EntityType::NameFormat,
        single: &["number", "name", "fmt_str", "active"],
        multi: &[],
        dated: false,
    },
];

fn row(entity_type: EntityType) -> Option<&'static CardinalityRow> {
    TABLE.iter().find(|row| row.entity_type == entity_type)
}

/// Returns the output cardinality of `field` for `entity_type`.
pub fn cardinality(entity_type: EntityType, field: &str) -> Cardinality {
    if is_single_valued(entity_type, field) {
        Cardinality::Single
    } else if is_declared_multi(entity_type, field) {
        Cardinality::Multi
    } else {
        Cardinality::Undeclared
    }
}

/// Whether `field` is declared single-valued for `entity_type`.
pub fn is_single_valued(entity_type: EntityType, field: &str) -> bool {
    if COMMON_SINGLE.contains(&field) {
        return true;
    }
    row(entity_type).is_some_and(|row| {
        row.single.contains(&field) || (row.dated && DATE_FIELDS.contains(&field))
    })
}

/// Whether `field` is explicitly declared multi-valued for `entity_type`.
pub fn is_declared_multi(entity_type: EntityType, field: &str) -> bool {
    COMMON_MULTI.contains(&field) || row(entity_type).is_some_and(|row| row.multi.contains(&field))
}

/// All single-valued field names for `entity_type`.
pub fn single_valued_fields(entity_type: EntityType) -> Vec<&'static str> {
    let mut fields: Vec<&'static str> = COMMON_SINGLE.to_vec();
    if let Some(row) = row(entity_type) {
        fields.extend_from_slice(row.single);
        if row.dated {
            fields.extend_from_slice(DATE_FIELDS);
        }
    }
    fields
}

/// All explicitly multi-valued field names for `entity_type`.
pub fn declared_multi_fields(entity_type: EntityType) -> Vec<&'static str> {
    let mut fields: Vec<&'static str> = COMMON_MULTI.to_vec();
    if let Some(row) = row(entity_type) {
        fields.extend_from_slice(row.multi);
    }
    fields
}

//! Field classifier and flattener.
//!
//! # Responsibility
//! - Turn one entity node of the archive tree into a flat [`Record`].
//! - Assign identities and rewrite nested handle links into entity ids.
//!
//! # Invariants
//! - Single-valued fields never hold lists; every other field always does.
//! - Flattening the same node with the same identity yields an equal record.
//! - Structural surprises abort with an error instead of dropping data.
//!
//! # See also
//! - `convert::cardinality` for the per-type field table.

pub mod cardinality;
pub mod handles;
mod processors;

use crate::archive::{strip_namespace, RawNode};
use crate::model::entity::{Entity, EntityType};
use crate::model::record::{Record, Value};
use crate::model::reference::REFERENCE_ID_KEY;
use cardinality::{cardinality, Cardinality};
use log::debug;
use processors::process_field;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use handles::{HandleResolver, Identity};

/// Attribute carrying the archive-internal link inside nested records.
pub const HANDLE_LINK_KEY: &str = "hlink";
/// Key used for inline text of a node that also carries attributes or children.
pub const TEXT_KEY: &str = "text";

const PERSON_NAME_FIELD: &str = "name";
const PERSON_NAME_PLAIN: &[&str] = &["first", "call", "nick", "title", "suffix", "familynick", "group"];
const PERSON_NAME_COMPLEX: &[&str] = &[
    "surname",
    "citationref",
    "noteref",
    "dateval",
    "daterange",
    "datespan",
    "datestr",
];

pub type ConvertResult<T> = Result<T, ConvertError>;

/// Classification-time errors. Each aborts the whole ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// A field node carries both attributes and non-empty text.
    ConflictingNodeShape {
        entity_type: EntityType,
        entity_id: String,
        field: String,
    },
    /// A person name entry holds a sub-element outside the known sets.
    UnknownNestedField {
        entity_type: EntityType,
        entity_id: String,
        field: String,
        nested: String,
    },
    /// A single-valued field occurs more than once.
    DuplicateSingleValueField {
        entity_type: EntityType,
        entity_id: String,
        field: String,
    },
    /// The same handle is declared by two nodes.
    DuplicateHandle {
        handle: String,
        first_id: String,
        second_id: String,
    },
    /// Two handles claim the same id within one entity type.
    DuplicateId {
        entity_type: EntityType,
        id: String,
        first_handle: String,
        second_handle: String,
    },
    /// A post-processor rejected a field value.
    InvalidFieldValue {
        entity_type: EntityType,
        entity_id: String,
        field: String,
        reason: String,
    },
}

impl Display for ConvertError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConflictingNodeShape {
                entity_type,
                entity_id,
                field,
            } => write!(
                f,
                "{entity_type}/{entity_id}: field `{field}` has both attributes and text"
            ),
            Self::UnknownNestedField {
                entity_type,
                entity_id,
                field,
                nested,
            } => write!(
                f,
                "{entity_type}/{entity_id}: unknown sub-field `{nested}` in `{field}`"
            ),
            Self::DuplicateSingleValueField {
                entity_type,
                entity_id,
                field,
            } => write!(
                f,
                "{entity_type}/{entity_id}: single-valued field `{field}` occurs more than once"
            ),
            Self::DuplicateHandle {
                handle,
                first_id,
                second_id,
            } => write!(
                f,
                "handle `{handle}` declared twice (ids `{first_id}` and `{second_id}`)"
            ),
            Self::DuplicateId {
                entity_type,
                id,
                first_handle,
                second_handle,
            } => write!(
                f,
                "{entity_type}: id `{id}` claimed by handles `{first_handle}` and `{second_handle}`"
            ),
            Self::InvalidFieldValue {
                entity_type,
                entity_id,
                field,
                reason,
            } => write!(
                f,
                "{entity_type}/{entity_id}: invalid value for `{field}`: {reason}"
            ),
        }
    }
}

impl Error for ConvertError {}

/// Converts entity nodes into records for one archive.
///
/// Owns the handle map of that archive, so one converter must not be reused
/// across archives.
#[derive(Debug, Default)]
pub struct Converter {
    resolver: HandleResolver,
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolver(&self) -> &HandleResolver {
        &self.resolver
    }

    /// Assigns the node's identity and registers its handle alias.
    pub fn register(&mut self, entity_type: EntityType, node: &RawNode) -> ConvertResult<Identity> {
        self.resolver.assign(entity_type, node)
    }

    /// Flattens one entity node into a record carrying `identity`.
    ///
    /// # Errors
    /// - `ConflictingNodeShape`, `UnknownNestedField`,
    ///   `DuplicateSingleValueField`, `InvalidFieldValue`.
    pub fn flatten(
        &self,
        entity_type: EntityType,
        node: &RawNode,
        identity: &Identity,
    ) -> ConvertResult<Record> {
        let context = FieldContext {
            entity_type,
            entity_id: identity.id.as_str(),
        };

        let mut fields: Vec<(String, Value)> = node
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), Value::from(value.as_str())))
            .collect();
        for child in &node.children {
            let field = strip_namespace(&child.tag).to_string();
            let value = context.field_value(&field, child)?;
            fields.push((field, value));
        }

        let mut record = Record::new();
        let mut seen_single: HashSet<String> = HashSet::new();
        let mut seen_undeclared: HashSet<String> = HashSet::new();
        for (field, value) in fields {
            let field_cardinality = cardinality(entity_type, &field);
            match field_cardinality {
                Cardinality::Single if !seen_single.insert(field.clone()) => {
                    return Err(ConvertError::DuplicateSingleValueField {
                        entity_type,
                        entity_id: identity.id.clone(),
                        field,
                    });
                }
                Cardinality::Undeclared if seen_undeclared.insert(field.clone()) => {
                    debug!(
                        "event=flatten_field module=convert status=undeclared entity={} id={} field={}",
                        entity_type, identity.id, field
                    );
                }
                _ => {}
            }
            let value = match process_field(&field, value) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(reason) => {
                    return Err(ConvertError::InvalidFieldValue {
                        entity_type,
                        entity_id: identity.id.clone(),
                        field,
                        reason,
                    })
                }
            };
            if field_cardinality == Cardinality::Single {
                record.insert(field, value);
            } else {
                record.push(&field, value);
            }
        }

        record.insert("id", identity.id.as_str());
        record.insert("handle", identity.handle.as_str());
        Ok(record)
    }

    /// Rewrites nested `hlink` references into resolved `id` keys.
    ///
    /// Top-level fields are left alone. Unresolvable handles stay as `hlink`.
    pub fn link(&self, record: &mut Record) {
        for (_, value) in record.iter_mut() {
            self.link_value(value);
        }
    }

    fn link_value(&self, value: &mut Value) {
        match value {
            Value::Record(nested) => {
                let resolved = nested
                    .text(HANDLE_LINK_KEY)
                    .map(|handle| (handle.to_string(), self.resolver.resolve(handle)));
                match resolved {
                    Some((_, Some(id))) => {
                        let id = id.to_string();
                        nested.remove(HANDLE_LINK_KEY);
                        nested.insert(REFERENCE_ID_KEY, id);
                    }
                    Some((handle, None)) => {
                        debug!(
                            "event=link_reference module=convert status=dangling handle={}",
                            handle
                        );
                    }
                    None => {}
                }
                self.link(nested);
            }
            Value::List(items) => {
                for item in items {
                    self.link_value(item);
                }
            }
            Value::Text(_) | Value::Bool(_) | Value::Timestamp(_) => {}
        }
    }

    /// Registers, flattens and links one node in a single step.
    ///
    /// Links only resolve against handles registered so far; ingestion runs
    /// [`Converter::register`] over every node first.
    pub fn convert(&mut self, entity_type: EntityType, node: &RawNode) -> ConvertResult<Entity> {
        let identity = self.register(entity_type, node)?;
        let mut record = self.flatten(entity_type, node, &identity)?;
        self.link(&mut record);
        Ok(Entity {
            entity_type,
            id: identity.id,
            handle: identity.handle,
            record,
        })
    }
}

struct FieldContext<'a> {
    entity_type: EntityType,
    entity_id: &'a str,
}

impl FieldContext<'_> {
    fn field_value(&self, field: &str, child: &RawNode) -> ConvertResult<Value> {
        let text = child.text();
        if !child.attributes.is_empty() && text.is_some() {
            return Err(ConvertError::ConflictingNodeShape {
                entity_type: self.entity_type,
                entity_id: self.entity_id.to_string(),
                field: field.to_string(),
            });
        }

        if !child.has_children() {
            if child.attributes.is_empty() {
                return Ok(Value::from(text.unwrap_or_default()));
            }
            return Ok(Value::Record(attribute_record(child)));
        }

        let mut value = attribute_record(child);
        if let Some(text) = text {
            value.insert(TEXT_KEY, text);
        }
        if self.entity_type == EntityType::Person && field == PERSON_NAME_FIELD {
            self.person_name(field, child, &mut value)?;
        } else {
            for grandchild in &child.children {
                value.push(strip_namespace(&grandchild.tag), nested_value(grandchild));
            }
        }
        Ok(Value::Record(value))
    }

    fn person_name(&self, field: &str, node: &RawNode, value: &mut Record) -> ConvertResult<()> {
        for subfield in &node.children {
            let nested = strip_namespace(&subfield.tag);
            if PERSON_NAME_PLAIN.contains(&nested) {
                if let Some(text) = subfield.text() {
                    value.insert(nested, text);
                }
            } else if PERSON_NAME_COMPLEX.contains(&nested) {
                let mut entry = attribute_record(subfield);
                if let Some(text) = subfield.text() {
                    entry.insert(TEXT_KEY, text);
                }
                value.push(nested, entry);
            } else {
                return Err(ConvertError::UnknownNestedField {
                    entity_type: self.entity_type,
                    entity_id: self.entity_id.to_string(),
                    field: field.to_string(),
                    nested: nested.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn attribute_record(node: &RawNode) -> Record {
    node.attributes
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect()
}

/// Below the field level: attributes and text merge into one record and
/// same-named children group into lists.
fn nested_value(node: &RawNode) -> Value {
    if node.attributes.is_empty() && !node.has_children() {
        if let Some(text) = node.text() {
            return Value::from(text);
        }
    }
    let mut record = attribute_record(node);
    if let Some(text) = node.text() {
        record.insert(TEXT_KEY, text);
    }
    for child in &node.children {
        record.push(strip_namespace(&child.tag), nested_value(child));
    }
    Value::Record(record)
}

#[cfg(test)]
mod tests {
    use super::{ConvertError, Converter};
    use crate::archive::RawNode;
    use crate::model::entity::EntityType;
    use crate::model::record::Value;

    fn person() -> RawNode {
        RawNode::new("person")
            .with_attribute("handle", "_p1")
            .with_attribute("id", "I0001")
            .with_attribute("change", "1400000000")
            .with_child(RawNode::new("gender").with_text("F"))
            .with_child(
                RawNode::new("name")
                    .with_attribute("type", "Birth Name")
                    .with_child(RawNode::new("first").with_text("Anna"))
                    .with_child(
                        RawNode::new("surname")
                            .with_attribute("prim", "1")
                            .with_text("Smith"),
                    ),
            )
            .with_child(RawNode::new("eventref").with_attribute("hlink", "_e1"))
    }

    #[test]
    fn multi_fields_are_lists_even_with_one_occurrence() {
        let entity = Converter::new()
            .convert(EntityType::Person, &person())
            .unwrap();

        let record = &entity.record;
        assert_eq!(record.text("gender"), Some("F"));
        assert!(record.get("change").unwrap().as_timestamp().is_some());
        let names = record.get("name").unwrap().as_list().unwrap();
        assert_eq!(names.len(), 1);
        let name = names[0].as_record().unwrap();
        assert_eq!(name.text("first"), Some("Anna"));
        let surnames = name.get("surname").unwrap().as_list().unwrap();
        assert_eq!(surnames[0].as_record().unwrap().text("text"), Some("Smith"));
        assert_eq!(record.get("eventref").unwrap().as_list().unwrap().len(), 1);
    }

    #[test]
    fn flatten_is_deterministic_for_the_same_identity() {
        let mut converter = Converter::new();
        let node = person();
        let identity = converter.register(EntityType::Person, &node).unwrap();
        let first = converter.flatten(EntityType::Person, &node, &identity).unwrap();
        let second = converter.flatten(EntityType::Person, &node, &identity).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn attributes_with_text_conflict() {
        let node = RawNode::new("event")
            .with_attribute("handle", "_e1")
            .with_child(
                RawNode::new("description")
                    .with_attribute("lang", "en")
                    .with_text("Baptism"),
            );
        let err = Converter::new()
            .convert(EntityType::Event, &node)
            .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::ConflictingNodeShape { ref field, .. } if field == "description"
        ));
    }

    #[test]
    fn repeated_single_field_is_rejected() {
        let node = RawNode::new("person")
            .with_attribute("handle", "_p")
            .with_child(RawNode::new("gender").with_text("M"))
            .with_child(RawNode::new("gender").with_text("F"));
        let err = Converter::new()
            .convert(EntityType::Person, &node)
            .unwrap_err();
        assert!(matches!(err, ConvertError::DuplicateSingleValueField { .. }));
    }

    #[test]
    fn repeated_single_field_is_rejected_even_when_one_is_empty() {
        let node = RawNode::new("event")
            .with_attribute("handle", "_e")
            .with_child(RawNode::new("type").with_text("Birth"))
            .with_child(RawNode::new("type"));
        let err = Converter::new()
            .convert(EntityType::Event, &node)
            .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::DuplicateSingleValueField { ref field, .. } if field == "type"
        ));

        let node = RawNode::new("event")
            .with_attribute("handle", "_e")
            .with_child(RawNode::new("type"));
        let entity = Converter::new().convert(EntityType::Event, &node).unwrap();
        assert!(!entity.record.contains_key("type"));
    }

    #[test]
    fn undeclared_fields_are_kept_as_lists() {
        let node = RawNode::new("event")
            .with_attribute("handle", "_e")
            .with_child(RawNode::new("sortval").with_text("42"));
        let entity = Converter::new().convert(EntityType::Event, &node).unwrap();
        assert_eq!(
            entity.record.get("sortval"),
            Some(&Value::List(vec![Value::from("42")]))
        );
    }

    #[test]
    fn unknown_person_name_part_is_rejected() {
        let node = RawNode::new("person").with_attribute("handle", "_p").with_child(
            RawNode::new("name").with_child(RawNode::new("nickname_v2").with_text("Bob")),
        );
        let err = Converter::new()
            .convert(EntityType::Person, &node)
            .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::UnknownNestedField { ref nested, .. } if nested == "nickname_v2"
        ));
    }

    #[test]
    fn generic_nesting_groups_children_into_lists() {
        let node = RawNode::new("placeobj")
            .with_attribute("handle", "_pl")
            .with_child(
                RawNode::new("placeref")
                    .with_attribute("hlink", "_parent")
                    .with_child(RawNode::new("dateval").with_attribute("val", "1900")),
            );
        let entity = Converter::new().convert(EntityType::Place, &node).unwrap();
        let placeref = entity.record.get("placeref").unwrap().as_list().unwrap()[0]
            .as_record()
            .unwrap();
        let dates = placeref.get("dateval").unwrap().as_list().unwrap();
        assert_eq!(dates[0].as_record().unwrap().text("val"), Some("1900"));
    }

    #[test]
    fn link_rewrites_known_handles_and_keeps_dangling_ones() {
        let mut converter = Converter::new();
        let event = RawNode::new("event")
            .with_attribute("handle", "_e1")
            .with_attribute("id", "E0001");
        converter.register(EntityType::Event, &event).unwrap();

        let node = RawNode::new("person")
            .with_attribute("handle", "_p")
            .with_child(RawNode::new("eventref").with_attribute("hlink", "_e1"))
            .with_child(RawNode::new("eventref").with_attribute("hlink", "_gone"));
        let entity = converter.convert(EntityType::Person, &node).unwrap();
        let refs = entity.record.get("eventref").unwrap().as_list().unwrap();
        assert_eq!(refs[0].as_record().unwrap().text("id"), Some("E0001"));
        assert!(refs[0].as_record().unwrap().get("hlink").is_none());
        assert_eq!(refs[1].as_record().unwrap().text("hlink"), Some("_gone"));
    }

    #[test]
    fn empty_text_fields_are_absent() {
        let node = RawNode::new("event")
            .with_attribute("handle", "_e")
            .with_child(RawNode::new("description"));
        let entity = Converter::new().convert(EntityType::Event, &node).unwrap();
        assert!(entity.record.get("description").is_none());
        assert_eq!(entity.record.get("handle"), Some(&Value::from("_e")));
    }
}

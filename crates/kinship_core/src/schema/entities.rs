//! Per-entity record shapes.

use super::{FieldShape, RecordShape, SchemaResult, Shape};
use crate::convert::HANDLE_LINK_KEY;
use crate::model::entity::EntityType;
use crate::model::record::Record;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

const DATE_TYPES: &[&str] = &["before", "after", "about"];
const DATE_QUALITIES: &[&str] = &["estimated", "calculated"];
const GENDERS: &[&str] = &["M", "F", "U"];

static SHAPES: Lazy<BTreeMap<EntityType, RecordShape>> = Lazy::new(|| {
    EntityType::ALL
        .into_iter()
        .map(|entity_type| (entity_type, build_shape(entity_type)))
        .collect()
});

/// Returns the record shape declared for `entity_type`.
pub fn entity_shape(entity_type: EntityType) -> &'static RecordShape {
    &SHAPES[&entity_type]
}

/// Validates a flattened record of `entity_type`.
pub fn validate_entity(entity_type: EntityType, record: &Record) -> SchemaResult<()> {
    entity_shape(entity_type).validate(entity_type, record)
}

fn references() -> Shape {
    Shape::list_of(Shape::Reference)
}

fn text_fields(names: &[&'static str]) -> Vec<FieldShape> {
    names
        .iter()
        .map(|name| FieldShape::optional(*name, Shape::Text))
        .collect()
}

fn date_modifiers() -> Vec<FieldShape> {
    vec![
        FieldShape::optional("quality", Shape::Choice(DATE_QUALITIES)),
        FieldShape::optional("cformat", Shape::Text),
        FieldShape::optional("dualdated", Shape::Text),
        FieldShape::optional("newyear", Shape::Text),
    ]
}

fn dateval() -> Shape {
    let mut fields = vec![
        FieldShape::required("val", Shape::Text),
        FieldShape::optional("type", Shape::Choice(DATE_TYPES)),
    ];
    fields.extend(date_modifiers());
    Shape::Record(RecordShape::closed(fields))
}

fn datespan() -> Shape {
    let mut fields = vec![
        FieldShape::required("start", Shape::Text),
        FieldShape::required("stop", Shape::Text),
    ];
    fields.extend(date_modifiers());
    Shape::Record(RecordShape::closed(fields))
}

fn datestr() -> Shape {
    Shape::Record(RecordShape::closed(vec![FieldShape::required(
        "val",
        Shape::Text,
    )]))
}

/// Single date fields of dated entities.
fn dated_fields() -> Vec<FieldShape> {
    vec![
        FieldShape::optional("dateval", dateval()),
        FieldShape::optional("daterange", datespan()),
        FieldShape::optional("datespan", datespan()),
        FieldShape::optional("datestr", datestr()),
    ]
}

fn url() -> Shape {
    Shape::Record(RecordShape::closed(vec![
        FieldShape::required("href", Shape::Text),
        FieldShape::optional("type", Shape::Text),
        FieldShape::optional("description", Shape::Text),
        FieldShape::optional("priv", Shape::Text),
    ]))
}

fn attribute() -> Shape {
    Shape::Record(RecordShape::closed(vec![
        FieldShape::required("type", Shape::Text),
        FieldShape::required("value", Shape::Text),
        FieldShape::optional("priv", Shape::Text),
        FieldShape::optional("citationref", references()),
        FieldShape::optional("noteref", references()),
    ]))
}

fn surname() -> Shape {
    let fields = text_fields(&["text", "prefix", "prim", "derivation", "connector"]);
    Shape::Either(vec![Shape::Text, Shape::Record(RecordShape::closed(fields))])
}

fn person_name() -> Shape {
    let mut fields = text_fields(&[
        "type",
        "alt",
        "priv",
        "sort",
        "display",
        "text",
        "first",
        "call",
        "nick",
        "title",
        "suffix",
        "familynick",
        "group",
    ]);
    fields.extend([
        FieldShape::optional("surname", Shape::list_of(surname())),
        FieldShape::optional("citationref", references()),
        FieldShape::optional("noteref", references()),
        FieldShape::optional("dateval", Shape::list_of(dateval())),
        FieldShape::optional("daterange", Shape::list_of(datespan())),
        FieldShape::optional("datespan", Shape::list_of(datespan())),
        FieldShape::optional("datestr", Shape::list_of(datestr())),
    ]);
    Shape::Either(vec![Shape::Text, Shape::Record(RecordShape::closed(fields))])
}

fn base() -> RecordShape {
    RecordShape::open(vec![
        FieldShape::required("id", Shape::Text),
        FieldShape::required("handle", Shape::Text),
        FieldShape::optional("change", Shape::Timestamp),
        FieldShape::optional("priv", Shape::Bool),
        FieldShape::optional("citationref", references()),
        FieldShape::optional("noteref", references()),
        FieldShape::optional("objref", references()),
        FieldShape::optional("tagref", references()),
        FieldShape::optional("url", Shape::list_of(url())),
        FieldShape::optional("attribute", Shape::list_of(attribute())),
    ])
}

fn build_shape(entity_type: EntityType) -> RecordShape {
    let base = base();
    match entity_type {
        EntityType::Person => base.extended(vec![
            FieldShape::required("name", Shape::list_of(person_name())),
            FieldShape::required("gender", Shape::Choice(GENDERS)),
            FieldShape::optional("eventref", references()),
            FieldShape::optional("childof", references()),
            FieldShape::optional("parentin", references()),
            FieldShape::optional("personref", references()),
            FieldShape::optional("address", Shape::list_of(Shape::Anything)),
            FieldShape::optional("lds_ord", Shape::list_of(Shape::Anything)),
        ]),
        EntityType::Family => base.extended(vec![
            FieldShape::optional("father", Shape::Reference),
            FieldShape::optional("mother", Shape::Reference),
            FieldShape::optional(
                "rel",
                Shape::Either(vec![Shape::Text, Shape::Record(RecordShape::open(Vec::new()))]),
            ),
            FieldShape::optional("childref", references()),
            FieldShape::optional("eventref", references()),
            FieldShape::optional("lds_ord", Shape::list_of(Shape::Anything)),
        ]),
        EntityType::Event => {
            let mut fields = text_fields(&["type", "description"]);
            fields.push(FieldShape::optional("place", Shape::Reference));
            fields.extend(dated_fields());
            base.extended(fields)
        }
        EntityType::Place => {
            let mut fields = text_fields(&["ptitle", "type", "code"]);
            fields.extend([
                FieldShape::optional(
                    "coord",
                    Shape::Record(RecordShape::closed(vec![
                        FieldShape::required("long", Shape::Text),
                        FieldShape::required("lat", Shape::Text),
                    ])),
                ),
                FieldShape::optional(
                    "name",
                    Shape::list_of(Shape::Either(vec![
                        Shape::Text,
                        Shape::Record(RecordShape::open(Vec::new())),
                    ])),
                ),
                FieldShape::optional("pname", Shape::list_of(Shape::Anything)),
                FieldShape::optional("alt_name", Shape::list_of(Shape::Text)),
                FieldShape::optional("placeref", references()),
            ]);
            base.extended(fields)
        }
        EntityType::Source => {
            let mut fields = text_fields(&["stitle", "sauthor", "spubinfo", "sabbrev"]);
            fields.extend([
                FieldShape::optional("reporef", references()),
                FieldShape::optional("srcattribute", Shape::list_of(Shape::Anything)),
                FieldShape::optional("data_item", Shape::list_of(Shape::Anything)),
            ]);
            base.extended(fields)
        }
        EntityType::Citation => {
            let mut fields = text_fields(&["page", "confidence"]);
            fields.extend([
                FieldShape::optional("sourceref", Shape::Reference),
                FieldShape::optional("srcattribute", Shape::list_of(Shape::Anything)),
                FieldShape::optional("data_item", Shape::list_of(Shape::Anything)),
            ]);
            fields.extend(dated_fields());
            base.extended(fields)
        }
        EntityType::Note => {
            let mut fields = text_fields(&["text", "type", "format"]);
            fields.push(FieldShape::optional("style", Shape::list_of(Shape::Anything)));
            base.extended(fields)
        }
        EntityType::MediaObject => {
            let mut fields = vec![FieldShape::optional(
                "file",
                Shape::Record(RecordShape::open(vec![FieldShape::required(
                    "src",
                    Shape::Text,
                )])),
            )];
            fields.extend(dated_fields());
            base.extended(fields)
        }
        EntityType::Repository => {
            let mut fields = text_fields(&["rname", "type"]);
            fields.push(FieldShape::optional("address", Shape::list_of(Shape::Anything)));
            base.extended(fields)
        }
        EntityType::Bookmark => base.extended(vec![
            FieldShape::required("target", Shape::Text),
            FieldShape::required(HANDLE_LINK_KEY, Shape::Text),
        ]),
        EntityType::NameMap => base.extended(vec![
            FieldShape::required("type", Shape::Text),
            FieldShape::required("key", Shape::Text),
            FieldShape::required("value", Shape::Text),
        ]),
        EntityType::NameFormat => base.extended(text_fields(&["number", "name", "fmt_str", "active"])),
    }
}

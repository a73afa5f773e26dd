//! Entity schema validator.
//!
//! # Responsibility
//! - Describe the accepted shape of every entity record declaratively.
//! - Check flattened records once at the ingestion boundary.
//!
//! # Invariants
//! - Validation is read-only and never mutates the record.
//! - A failure names the first offending path and the shape expected there.
//! - Entity-level shapes are open (unknown vendor fields pass); nested
//!   well-known structures are closed.

mod entities;

pub use entities::{entity_shape, validate_entity};

use crate::convert::HANDLE_LINK_KEY;
use crate::model::entity::EntityType;
use crate::model::record::{Record, Value};
use crate::model::reference::REFERENCE_ID_KEY;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Semantic validation failure with the offending record attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub record: Box<Record>,
    /// Dotted path to the offending value, list positions in brackets.
    pub path: String,
    pub expected: String,
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}: `{}` expected {}",
            self.entity_type, self.entity_id, self.path, self.expected
        )
    }
}

impl Error for SchemaError {}

/// Accepted shape of one value.
#[derive(Debug, Clone)]
pub enum Shape {
    Text,
    Bool,
    Timestamp,
    /// Text restricted to a fixed set of values.
    Choice(&'static [&'static str]),
    /// Nested record naming another entity by resolved `id` or dangling `hlink`.
    Reference,
    Record(RecordShape),
    ListOf(Box<Shape>),
    /// Any of the alternatives, tried in order.
    Either(Vec<Shape>),
    Anything,
}

impl Shape {
    pub fn list_of(shape: Shape) -> Self {
        Self::ListOf(Box::new(shape))
    }

    /// Human-readable description used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Text => "text".to_string(),
            Self::Bool => "boolean".to_string(),
            Self::Timestamp => "timestamp".to_string(),
            Self::Choice(options) => format!("one of [{}]", options.join(", ")),
            Self::Reference => "reference record with `id` or `hlink`".to_string(),
            Self::Record(_) => "record".to_string(),
            Self::ListOf(item) => format!("list of {}", item.describe()),
            Self::Either(options) => options
                .iter()
                .map(Shape::describe)
                .collect::<Vec<_>>()
                .join(" or "),
            Self::Anything => "anything".to_string(),
        }
    }

    fn check(&self, value: &Value, path: &str) -> Result<(), Mismatch> {
        let mismatch = || Mismatch {
            path: path.to_string(),
            expected: self.describe(),
        };
        match self {
            Self::Text => value.as_text().map(|_| ()).ok_or_else(mismatch),
            Self::Bool => value.as_bool().map(|_| ()).ok_or_else(mismatch),
            Self::Timestamp => value.as_timestamp().map(|_| ()).ok_or_else(mismatch),
            Self::Choice(options) => match value.as_text() {
                Some(text) if options.contains(&text) => Ok(()),
                _ => Err(mismatch()),
            },
            Self::Reference => {
                let record = value.as_record().ok_or_else(mismatch)?;
                let linked = record.text(REFERENCE_ID_KEY).is_some()
                    || record.text(HANDLE_LINK_KEY).is_some();
                if linked {
                    Ok(())
                } else {
                    Err(mismatch())
                }
            }
            Self::Record(shape) => {
                let record = value.as_record().ok_or_else(mismatch)?;
                shape.check(record, path)
            }
            Self::ListOf(item) => {
                let items = value.as_list().ok_or_else(mismatch)?;
                for (position, entry) in items.iter().enumerate() {
                    item.check(entry, &format!("{path}[{position}]"))?;
                }
                Ok(())
            }
            Self::Either(options) => {
                if options
                    .iter()
                    .any(|option| option.check(value, path).is_ok())
                {
                    Ok(())
                } else {
                    Err(mismatch())
                }
            }
            Self::Anything => Ok(()),
        }
    }
}

/// Field table of a record shape.
#[derive(Debug, Clone)]
pub struct RecordShape {
    pub fields: Vec<FieldShape>,
    /// Whether fields outside `fields` are accepted.
    pub open: bool,
}

impl RecordShape {
    pub fn closed(fields: Vec<FieldShape>) -> Self {
        Self {
            fields,
            open: false,
        }
    }

    pub fn open(fields: Vec<FieldShape>) -> Self {
        Self { fields, open: true }
    }

    /// Returns a copy extended with `more` fields; later entries win.
    pub fn extended(&self, more: Vec<FieldShape>) -> Self {
        let mut fields: Vec<FieldShape> = self
            .fields
            .iter()
            .filter(|field| more.iter().all(|extra| extra.name != field.name))
            .cloned()
            .collect();
        fields.extend(more);
        Self {
            fields,
            open: self.open,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldShape> {
        self.fields.iter().find(|field| field.name == name)
    }

    fn check(&self, record: &Record, path: &str) -> Result<(), Mismatch> {
        for field in &self.fields {
            let field_path = join_path(path, field.name);
            match record.get(field.name) {
                Some(value) => field.shape.check(value, &field_path)?,
                None if field.required => {
                    return Err(Mismatch {
                        path: field_path,
                        expected: format!("required {}", field.shape.describe()),
                    })
                }
                None => {}
            }
        }
        if !self.open {
            if let Some(unknown) = record.field_names().find(|name| self.field(name).is_none()) {
                return Err(Mismatch {
                    path: join_path(path, unknown),
                    expected: "no such field".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validates `record` against this shape.
    pub fn validate(&self, entity_type: EntityType, record: &Record) -> SchemaResult<()> {
        self.check(record, "").map_err(|mismatch| SchemaError {
            entity_type,
            entity_id: record.text(REFERENCE_ID_KEY).unwrap_or_default().to_string(),
            record: Box::new(record.clone()),
            path: mismatch.path,
            expected: mismatch.expected,
        })
    }
}

/// One named field of a record shape.
#[derive(Debug, Clone)]
pub struct FieldShape {
    pub name: &'static str,
    pub shape: Shape,
    pub required: bool,
}

impl FieldShape {
    pub fn required(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            shape,
            required: true,
        }
    }

    pub fn optional(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            shape,
            required: false,
        }
    }
}

struct Mismatch {
    path: String,
    expected: String,
}

fn join_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{parent}.{field}")
    }
}

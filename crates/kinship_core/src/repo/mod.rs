//! Indexed entity store.
//!
//! # Responsibility
//! - Persist records as one structured-text file per entity, grouped by type.
//! - Maintain secondary indices on reference-bearing fields.
//!
//! # Invariants
//! - Indexed fields are a fixed, pre-declared set per entity type.
//! - An index never outlives a mutation of the records it was built from.
//! - A missing store directory is an empty store, not an error.

pub mod entity_store;
pub mod filter;
pub mod index;
pub mod storage;

use crate::model::entity::EntityType;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type RepoResult<T> = Result<T, RepoError>;

/// Store and query errors.
#[derive(Debug)]
pub enum RepoError {
    /// Direct lookup of an id that is not stored.
    NotFound { entity_type: EntityType, id: String },
    /// Index query on a field that is not declared indexed.
    NotIndexed {
        entity_type: EntityType,
        field: String,
    },
    /// Strict insert of an id that already exists.
    DuplicateId { entity_type: EntityType, id: String },
    /// Id unusable as a file name.
    InvalidId(String),
    /// Persisted record contradicts its location.
    InvalidData { path: PathBuf, message: String },
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity_type, id } => write!(f, "{entity_type}/{id} not found"),
            Self::NotIndexed { entity_type, field } => {
                write!(f, "field `{field}` is not indexed for {entity_type}")
            }
            Self::DuplicateId { entity_type, id } => {
                write!(f, "{entity_type}/{id} already exists")
            }
            Self::InvalidId(id) => write!(f, "invalid entity id `{id}`"),
            Self::InvalidData { path, message } => {
                write!(f, "invalid stored record `{}`: {message}", path.display())
            }
            Self::Io { path, source } => write!(f, "io error at `{}`: {source}", path.display()),
            Self::Serialize { path, source } => {
                write!(f, "cannot (de)serialize `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialize { source, .. } => Some(source),
            Self::NotFound { .. }
            | Self::NotIndexed { .. }
            | Self::DuplicateId { .. }
            | Self::InvalidId(_)
            | Self::InvalidData { .. } => None,
        }
    }
}

/// Reference fields with a precomputed posting list, per entity type.
///
/// Dotted entries index references nested one level inside another field.
pub fn indexed_fields(entity_type: EntityType) -> &'static [&'static str] {
    match entity_type {
        EntityType::Person => &[
            "citationref",
            "eventref",
            "objref",
            "noteref",
            "personref",
            "childof",
            "parentin",
            "attribute.citationref",
        ],
        EntityType::Family => &[
            "father",
            "mother",
            "childref",
            "eventref",
            "citationref",
            "noteref",
            "objref",
        ],
        EntityType::Event => &["place", "citationref", "noteref", "objref"],
        EntityType::Place => &["placeref", "citationref", "noteref", "objref"],
        EntityType::Source => &["reporef", "noteref", "objref"],
        EntityType::Citation => &["sourceref", "noteref", "objref"],
        EntityType::MediaObject => &["citationref", "noteref"],
        EntityType::Repository => &["noteref"],
        EntityType::Note | EntityType::Bookmark | EntityType::NameMap | EntityType::NameFormat => {
            &[]
        }
    }
}

/// Rejects ids that cannot safely name a file inside the store directory.
pub fn validate_id(id: &str) -> RepoResult<()> {
    let invalid = id.trim().is_empty()
        || id.starts_with('.')
        || id.contains(['/', '\\'])
        || id.contains('\0');
    if invalid {
        return Err(RepoError::InvalidId(id.to_string()));
    }
    Ok(())
}

//! Archive tree reader.
//!
//! # Responsibility
//! - Decompress an exported archive and parse it into an in-memory labeled tree.
//! - Stay purely syntactic: no knowledge of entity types or field semantics.
//!
//! # Invariants
//! - Child order and attribute order follow the document.
//! - Text is trimmed; whitespace-only text is stored as `None`.
//! - Namespace declarations (`xmlns`, `xmlns:*`) are not exposed as attributes.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod reader;

pub use reader::{parse_archive_bytes, parse_tree, read_archive};

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised while reading an archive.
#[derive(Debug)]
pub enum ArchiveError {
    /// Archive file cannot be opened or read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Decompression or markup parsing failed.
    MalformedArchive(String),
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read archive `{}`: {source}", path.display())
            }
            Self::MalformedArchive(message) => write!(f, "malformed archive: {message}"),
        }
    }
}

impl Error for ArchiveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::MalformedArchive(_) => None,
        }
    }
}

impl From<quick_xml::Error> for ArchiveError {
    fn from(value: quick_xml::Error) -> Self {
        Self::MalformedArchive(value.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ArchiveError {
    fn from(value: quick_xml::events::attributes::AttrError) -> Self {
        Self::MalformedArchive(value.to_string())
    }
}

/// One element of the parsed archive tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawNode {
    /// Qualified tag name as written (may carry a `prefix:`).
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<RawNode>,
    pub text: Option<String>,
}

impl RawNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Builder helper: appends an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Builder helper: appends a child node.
    pub fn with_child(mut self, child: RawNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder helper: sets inline text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Tag name without any namespace prefix.
    pub fn local_name(&self) -> &str {
        strip_namespace(&self.tag)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Inline text, treating whitespace-only text as absent.
    pub fn text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Strips a `prefix:` or `{uri}` namespace qualifier from a tag name.
pub fn strip_namespace(tag: &str) -> &str {
    if let Some(rest) = tag.strip_prefix('{') {
        return rest.split_once('}').map(|(_, local)| local).unwrap_or(tag);
    }
    tag.rsplit_once(':').map(|(_, local)| local).unwrap_or(tag)
}

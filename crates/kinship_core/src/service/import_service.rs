//! Archive ingestion pipeline.
//!
//! # Responsibility
//! - Run tree reading, identity assignment, flattening, linking and schema
//!   validation over one archive.
//! - Stage the result into [`Storage`] and commit it as a whole.
//!
//! # Invariants
//! - Identities for every entity node are assigned before the first record is
//!   produced, so forward handle references resolve and duplicate handles fail
//!   before any output.
//! - Any ingestion error ends the run: the iterator stops and nothing from the
//!   archive is staged or committed.
//!
//! # See also
//! - `convert` for the flattening rules, `schema` for per-type shapes.

use crate::archive::{read_archive, strip_namespace, ArchiveError, RawNode};
use crate::convert::{ConvertError, Converter, Identity};
use crate::model::entity::{Entity, EntityType};
use crate::repo::storage::Storage;
use crate::repo::RepoError;
use crate::schema::{validate_entity, SchemaError};
use log::{error, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Instant;

pub type ImportResult<T> = Result<T, ImportError>;

/// Terminal ingestion error.
#[derive(Debug)]
pub enum ImportError {
    Archive(ArchiveError),
    Convert(ConvertError),
    Schema(SchemaError),
    Repo(RepoError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Archive(err) => write!(f, "{err}"),
            Self::Convert(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Archive(err) => Some(err),
            Self::Convert(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ArchiveError> for ImportError {
    fn from(value: ArchiveError) -> Self {
        Self::Archive(value)
    }
}

impl From<ConvertError> for ImportError {
    fn from(value: ConvertError) -> Self {
        Self::Convert(value)
    }
}

impl From<SchemaError> for ImportError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Lazy, single-pass sequence of ingested entities.
///
/// Yields entities collection by collection in [`EntityType::ALL`] order,
/// document order within a collection. After the first error it yields nothing.
pub struct Import {
    converter: Converter,
    pending: std::vec::IntoIter<(EntityType, RawNode, Identity)>,
    failed: bool,
}

impl Import {
    /// Number of entities not yet yielded.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    fn next_entity(
        &self,
        entity_type: EntityType,
        node: &RawNode,
        identity: Identity,
    ) -> ImportResult<Entity> {
        let mut record = self.converter.flatten(entity_type, node, &identity)?;
        self.converter.link(&mut record);
        validate_entity(entity_type, &record)?;
        Ok(Entity {
            entity_type,
            id: identity.id,
            handle: identity.handle,
            record,
        })
    }
}

impl Iterator for Import {
    type Item = ImportResult<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (entity_type, node, identity) = self.pending.next()?;
        let result = self.next_entity(entity_type, &node, identity);
        if let Err(err) = &result {
            self.failed = true;
            error!(
                "event=import_entity module=import status=error entity={} error={}",
                entity_type, err
            );
        }
        Some(result)
    }
}

/// Reads the archive at `path` and prepares the entity sequence.
///
/// # Errors
/// - `Archive` when the file cannot be read, inflated or parsed.
/// - `Convert` for duplicate handles or ids found by the identity pass.
pub fn import(path: impl AsRef<Path>) -> ImportResult<Import> {
    let root = read_archive(path)?;
    import_tree(root)
}

/// Prepares the entity sequence from an already parsed archive tree.
pub fn import_tree(root: RawNode) -> ImportResult<Import> {
    let mut collections: BTreeMap<EntityType, Vec<RawNode>> = BTreeMap::new();
    for collection in root.children {
        let Some(entity_type) = EntityType::from_collection_name(strip_namespace(&collection.tag))
        else {
            continue;
        };
        collections
            .entry(entity_type)
            .or_default()
            .extend(collection.children);
    }

    let mut converter = Converter::new();
    let mut pending = Vec::new();
    for entity_type in EntityType::ALL {
        let Some(nodes) = collections.remove(&entity_type) else {
            continue;
        };
        info!(
            "event=import_collection module=import status=start entity={} count={}",
            entity_type,
            nodes.len()
        );
        for node in nodes {
            let identity = converter.register(entity_type, &node).map_err(|err| {
                error!(
                    "event=import_identity module=import status=error entity={} error={}",
                    entity_type, err
                );
                err
            })?;
            pending.push((entity_type, node, identity));
        }
    }

    Ok(Import {
        converter,
        pending: pending.into_iter(),
        failed: false,
    })
}

/// Per-type counts of one committed import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub counts: BTreeMap<EntityType, usize>,
    pub written: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Ingests the archive at `path` into `storage` and commits it.
///
/// Every entity is produced and validated before the first one is staged. On
/// any error, including a failed commit, staged state is discarded and the
/// previous snapshot stays as is on disk and in memory.
pub fn import_into(storage: &mut Storage, path: impl AsRef<Path>) -> ImportResult<ImportSummary> {
    let path = path.as_ref();
    let started_at = Instant::now();
    info!(
        "event=import module=import status=start path={}",
        path.display()
    );

    let produced = import(path).and_then(|entities| entities.collect::<ImportResult<Vec<_>>>());
    let entities = match produced {
        Ok(entities) => entities,
        Err(err) => {
            error!(
                "event=import module=import status=error stage=convert error={}",
                err
            );
            return Err(err);
        }
    };

    let mut summary = ImportSummary::default();
    for entity in entities {
        if let Err(err) = storage.add(entity.entity_type, &entity.id, entity.record, true) {
            storage.reload();
            error!(
                "event=import module=import status=error stage=stage entity={} id={} error={}",
                entity.entity_type, entity.id, err
            );
            return Err(err.into());
        }
        *summary.counts.entry(entity.entity_type).or_default() += 1;
    }
    for (entity_type, count) in &summary.counts {
        info!(
            "event=import_collection module=import status=ok entity={} count={}",
            entity_type, count
        );
    }

    summary.written = match storage.commit() {
        Ok(written) => written,
        Err(err) => {
            storage.reload();
            error!(
                "event=import module=import status=error stage=commit error={}",
                err
            );
            return Err(err.into());
        }
    };
    info!(
        "event=import module=import status=ok entities={} written={} duration_ms={}",
        summary.total(),
        summary.written,
        started_at.elapsed().as_millis()
    );
    Ok(summary)
}

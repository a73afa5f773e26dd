//! Per-type entity store backed by one YAML file per record.
//!
//! # Responsibility
//! - Lazily load every record of one entity type on first access.
//! - Stage inserts in memory and persist them on `commit`.
//!
//! # Invariants
//! - Records are keyed by id; the stored record's `id` field equals its key.
//! - The reference index is dropped on every mutation and rebuilt on demand.
//! - Files are written to a temporary name and renamed into place only after
//!   every staged record was written.

use super::filter::Filter;
use super::index::ReferenceIndex;
use super::{indexed_fields, validate_id, RepoError, RepoResult};
use crate::model::entity::EntityType;
use crate::model::record::Record;
use crate::model::reference::REFERENCE_ID_KEY;
use log::{debug, error, info, warn};
use once_cell::unsync::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

const RECORD_FILE_EXTENSION: &str = "yaml";
const TEMP_FILE_SUFFIX: &str = ".tmp";

/// Records of one entity type plus their reference index.
#[derive(Debug)]
pub struct EntityStore {
    entity_type: EntityType,
    dir: PathBuf,
    items: OnceCell<BTreeMap<String, Record>>,
    index: OnceCell<ReferenceIndex>,
    pending: BTreeSet<String>,
}

impl EntityStore {
    /// Creates a store rooted at `<root>/<collection name>`. No IO happens here.
    pub fn new(entity_type: EntityType, root: &Path) -> Self {
        Self {
            entity_type,
            dir: root.join(entity_type.collection_name()),
            items: OnceCell::new(),
            index: OnceCell::new(),
            pending: BTreeSet::new(),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn indexed_fields(&self) -> &'static [&'static str] {
        indexed_fields(self.entity_type)
    }

    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexed_fields().contains(&field)
    }

    fn items(&self) -> RepoResult<&BTreeMap<String, Record>> {
        self.items
            .get_or_try_init(|| read_records(self.entity_type, &self.dir))
    }

    fn items_mut(&mut self) -> RepoResult<&mut BTreeMap<String, Record>> {
        if self.items.get().is_none() {
            let loaded = read_records(self.entity_type, &self.dir)?;
            self.items = OnceCell::from(loaded);
        }
        let entity_type = self.entity_type;
        let dir = self.dir.clone();
        self.items.get_mut().ok_or_else(|| RepoError::InvalidData {
            path: dir,
            message: format!("{entity_type} store is not loaded"),
        })
    }

    fn index(&self) -> RepoResult<&ReferenceIndex> {
        let items = self.items()?;
        Ok(self.index.get_or_init(|| {
            let started_at = Instant::now();
            let index = ReferenceIndex::build(self.indexed_fields(), items);
            debug!(
                "event=index_build module=repo status=ok entity={} records={} duration_ms={}",
                self.entity_type,
                items.len(),
                started_at.elapsed().as_millis()
            );
            index
        }))
    }

    /// Adds a record, rejecting an id that already exists.
    pub fn insert(&mut self, id: &str, record: Record) -> RepoResult<()> {
        self.add(id, record, false)
    }

    /// Adds or wholesale replaces a record.
    pub fn upsert(&mut self, id: &str, record: Record) -> RepoResult<()> {
        self.add(id, record, true)
    }

    /// Stages a record for the next `commit`.
    ///
    /// # Errors
    /// - `InvalidId` when `id` cannot name a file.
    /// - `InvalidData` when the record carries a different `id`.
    /// - `DuplicateId` when `upsert` is false and `id` is already stored.
    pub fn add(&mut self, id: &str, mut record: Record, upsert: bool) -> RepoResult<()> {
        validate_id(id)?;
        match record.text(REFERENCE_ID_KEY) {
            Some(existing) if existing != id => {
                return Err(RepoError::InvalidData {
                    path: self.record_path(id),
                    message: format!("record id `{existing}` does not match key `{id}`"),
                });
            }
            Some(_) => {}
            None => {
                record.insert(REFERENCE_ID_KEY, id);
            }
        }

        let entity_type = self.entity_type;
        let items = self.items_mut()?;
        if !upsert && items.contains_key(id) {
            return Err(RepoError::DuplicateId {
                entity_type,
                id: id.to_string(),
            });
        }
        items.insert(id.to_string(), record);
        self.pending.insert(id.to_string());
        self.index.take();
        Ok(())
    }

    /// Returns the record stored under `id`.
    pub fn get(&self, id: &str) -> RepoResult<&Record> {
        self.items()?
            .get(id)
            .ok_or_else(|| RepoError::NotFound {
                entity_type: self.entity_type,
                id: id.to_string(),
            })
    }

    pub fn contains(&self, id: &str) -> RepoResult<bool> {
        Ok(self.items()?.contains_key(id))
    }

    /// Records whose normalized references under `field` include any of `values`.
    ///
    /// # Errors
    /// - `NotIndexed` when `field` is not a declared indexed field.
    pub fn find_by_index(&self, field: &str, values: &[&str]) -> RepoResult<Vec<&Record>> {
        if !self.is_indexed(field) {
            return Err(RepoError::NotIndexed {
                entity_type: self.entity_type,
                field: field.to_string(),
            });
        }
        let items = self.items()?;
        let keys = self.index()?.lookup(field, values).unwrap_or_default();
        Ok(keys.iter().filter_map(|key| items.get(key)).collect())
    }

    /// Records matching `filter`, ordered by id.
    pub fn find(&self, filter: &Filter) -> RepoResult<Vec<&Record>> {
        Ok(self
            .items()?
            .values()
            .filter(|record| filter.matches(record))
            .collect())
    }

    /// Every record, ordered by id.
    pub fn all(&self) -> RepoResult<Vec<&Record>> {
        Ok(self.items()?.values().collect())
    }

    pub fn count(&self) -> RepoResult<usize> {
        Ok(self.items()?.len())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Writes every staged record to disk.
    ///
    /// Either every staged record lands or none does. Returns the number of
    /// records written.
    pub fn commit(&mut self) -> RepoResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let started_at = Instant::now();
        let staged = self.stage_pending()?;
        publish_staged(&staged)?;
        let written = self.finish_commit();
        info!(
            "event=store_commit module=repo status=ok entity={} written={} duration_ms={}",
            self.entity_type,
            written,
            started_at.elapsed().as_millis()
        );
        Ok(written)
    }

    /// Writes every staged record under its temporary name.
    ///
    /// Nothing is renamed into place. On error the temporary files written so
    /// far are removed.
    pub(crate) fn stage_pending(&self) -> RepoResult<Vec<StagedFile>> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        std::fs::create_dir_all(&self.dir).map_err(|source| RepoError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let items = self.items()?;
        let mut staged = Vec::with_capacity(self.pending.len());
        for id in &self.pending {
            let Some(record) = items.get(id) else {
                continue;
            };
            match StagedFile::write(self.record_path(id), record) {
                Ok(file) => staged.push(file),
                Err(err) => {
                    error!(
                        "event=store_commit module=repo status=error entity={} id={} error={}",
                        self.entity_type, id, err
                    );
                    discard_staged(&staged);
                    return Err(err);
                }
            }
        }
        Ok(staged)
    }

    /// Clears staged ids after their files were published.
    pub(crate) fn finish_commit(&mut self) -> usize {
        let written = self.pending.len();
        self.pending.clear();
        written
    }

    /// Drops loaded records, staged writes and the index.
    pub fn reload(&mut self) {
        self.items = OnceCell::new();
        self.index = OnceCell::new();
        self.pending.clear();
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_FILE_EXTENSION}"))
    }
}

fn read_records(entity_type: EntityType, dir: &Path) -> RepoResult<BTreeMap<String, Record>> {
    let mut records = BTreeMap::new();
    if !dir.exists() {
        debug!(
            "event=store_load module=repo status=empty entity={} reason=missing_dir",
            entity_type
        );
        return Ok(records);
    }

    let started_at = Instant::now();
    let io_error = |source: std::io::Error| RepoError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_FILE_EXTENSION) {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let id = id.to_string();
        let record = read_record(&path)?;
        match record.text(REFERENCE_ID_KEY) {
            Some(stored) if stored == id => {}
            other => {
                return Err(RepoError::InvalidData {
                    path,
                    message: format!("stored id {other:?} does not match file name `{id}`"),
                });
            }
        }
        records.insert(id, record);
    }

    info!(
        "event=store_load module=repo status=ok entity={} records={} duration_ms={}",
        entity_type,
        records.len(),
        started_at.elapsed().as_millis()
    );
    Ok(records)
}

fn read_record(path: &Path) -> RepoResult<Record> {
    let text = std::fs::read_to_string(path).map_err(|source| RepoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut record: Record = serde_yaml::from_str(&text).map_err(|source| RepoError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    record
        .restore_timestamps()
        .map_err(|message| RepoError::InvalidData {
            path: path.to_path_buf(),
            message,
        })?;
    Ok(record)
}

/// One record written under a temporary name, waiting to be renamed into place.
#[derive(Debug)]
pub(crate) struct StagedFile {
    path: PathBuf,
    temp_path: PathBuf,
    previous: Option<String>,
}

impl StagedFile {
    fn write(path: PathBuf, record: &Record) -> RepoResult<Self> {
        let text = serde_yaml::to_string(record).map_err(|source| RepoError::Serialize {
            path: path.clone(),
            source,
        })?;
        let previous = match std::fs::read_to_string(&path) {
            Ok(previous) => Some(previous),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => return Err(RepoError::Io { path, source }),
        };
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(TEMP_FILE_SUFFIX);
        let temp_path = PathBuf::from(temp_name);

        std::fs::write(&temp_path, text).map_err(|source| RepoError::Io {
            path: temp_path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            temp_path,
            previous,
        })
    }

    fn publish(&self) -> RepoResult<()> {
        std::fs::rename(&self.temp_path, &self.path).map_err(|source| RepoError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn discard(&self) {
        if let Err(err) = std::fs::remove_file(&self.temp_path) {
            warn!(
                "event=store_rollback module=repo status=error path={} error={}",
                self.temp_path.display(),
                err
            );
        }
    }

    /// Puts back what the target held before `publish`.
    fn restore(&self) {
        let restored = match &self.previous {
            Some(previous) => std::fs::write(&self.path, previous),
            None => std::fs::remove_file(&self.path),
        };
        if let Err(err) = restored {
            warn!(
                "event=store_rollback module=repo status=error path={} error={}",
                self.path.display(),
                err
            );
        }
    }
}

pub(crate) fn discard_staged(staged: &[StagedFile]) {
    for file in staged {
        file.discard();
    }
}

/// Renames every staged file into place; on failure restores the ones already
/// renamed and removes the rest.
pub(crate) fn publish_staged(staged: &[StagedFile]) -> RepoResult<()> {
    for (position, file) in staged.iter().enumerate() {
        if let Err(err) = file.publish() {
            error!(
                "event=store_publish module=repo status=error path={} error={}",
                file.path.display(),
                err
            );
            for published in &staged[..position] {
                published.restore();
            }
            discard_staged(&staged[position..]);
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::EntityStore;
    use crate::model::entity::EntityType;
    use crate::model::record::Record;
    use crate::repo::RepoError;

    fn person(id: &str) -> Record {
        [("id", id), ("gender", "F")].into_iter().collect()
    }

    #[test]
    fn missing_directory_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntityStore::new(EntityType::Person, dir.path());
        assert_eq!(store.count().unwrap(), 0);
        assert!(matches!(
            store.get("I1").unwrap_err(),
            RepoError::NotFound { .. }
        ));
    }

    #[test]
    fn insert_is_strict_and_upsert_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = EntityStore::new(EntityType::Person, dir.path());
        store.insert("I1", person("I1")).unwrap();
        assert!(matches!(
            store.insert("I1", person("I1")).unwrap_err(),
            RepoError::DuplicateId { .. }
        ));

        let mut replacement = person("I1");
        replacement.insert("gender", "M");
        store.upsert("I1", replacement).unwrap();
        assert_eq!(store.get("I1").unwrap().text("gender"), Some("M"));
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn failed_write_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = EntityStore::new(EntityType::Person, dir.path());
        store.insert("I1", person("I1")).unwrap();
        store.insert("I2", person("I2")).unwrap();
        std::fs::create_dir_all(store.dir().join("I2.yaml.tmp")).unwrap();

        assert!(matches!(store.commit().unwrap_err(), RepoError::Io { .. }));
        assert!(!store.dir().join("I1.yaml").exists());
        assert!(!store.dir().join("I1.yaml.tmp").exists());
        assert_eq!(store.pending_count(), 2);
    }

    #[test]
    fn mismatched_record_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = EntityStore::new(EntityType::Person, dir.path());
        assert!(matches!(
            store.insert("I1", person("I2")).unwrap_err(),
            RepoError::InvalidData { .. }
        ));
        assert!(matches!(
            store.insert("../I1", Record::new()).unwrap_err(),
            RepoError::InvalidId(_)
        ));
    }
}

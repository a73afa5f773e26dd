//! Storage facade over every entity-type store.
//!
//! # Responsibility
//! - Own one lazily loaded [`EntityStore`] per entity type under a shared root.
//! - Hand out typed [`EntityView`]s for query callers.
//!
//! # Invariants
//! - Every entity type has exactly one store for the lifetime of the facade.
//! - Opening performs no IO; each store loads on first access.

use super::entity_store::{discard_staged, publish_staged, EntityStore};
use super::filter::Filter;
use super::RepoResult;
use crate::model::entity::{EntityType, EntityView};
use crate::model::record::Record;
use log::{error, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// All entity stores of one archive snapshot.
#[derive(Debug)]
pub struct Storage {
    root: PathBuf,
    stores: BTreeMap<EntityType, EntityStore>,
}

impl Storage {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let stores = EntityType::ALL
            .into_iter()
            .map(|entity_type| (entity_type, EntityStore::new(entity_type, &root)))
            .collect();
        Self { root, stores }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self, entity_type: EntityType) -> &EntityStore {
        &self.stores[&entity_type]
    }

    pub fn store_mut(&mut self, entity_type: EntityType) -> &mut EntityStore {
        self.stores
            .entry(entity_type)
            .or_insert_with(|| EntityStore::new(entity_type, &self.root))
    }

    /// Direct lookup by id; `NotFound` when absent.
    pub fn get(&self, entity_type: EntityType, id: &str) -> RepoResult<EntityView<'_>> {
        let record = self.store(entity_type).get(id)?;
        Ok(EntityView::new(entity_type, record))
    }

    pub fn find(&self, entity_type: EntityType, filter: &Filter) -> RepoResult<Vec<EntityView<'_>>> {
        Ok(views(entity_type, self.store(entity_type).find(filter)?))
    }

    /// Index lookup; `NotIndexed` for undeclared fields.
    pub fn find_by_index(
        &self,
        entity_type: EntityType,
        field: &str,
        values: &[&str],
    ) -> RepoResult<Vec<EntityView<'_>>> {
        Ok(views(
            entity_type,
            self.store(entity_type).find_by_index(field, values)?,
        ))
    }

    pub fn all(&self, entity_type: EntityType) -> RepoResult<Vec<EntityView<'_>>> {
        Ok(views(entity_type, self.store(entity_type).all()?))
    }

    /// Stages a record; strict unless `upsert` is set.
    pub fn add(
        &mut self,
        entity_type: EntityType,
        id: &str,
        record: Record,
        upsert: bool,
    ) -> RepoResult<()> {
        self.store_mut(entity_type).add(id, record, upsert)
    }

    /// Persists staged records of every store; returns the number written.
    ///
    /// Every store writes its temporary files before any file is renamed into
    /// place, so a failure leaves the committed snapshot on disk unchanged.
    /// Staged records stay staged after an error.
    pub fn commit(&mut self) -> RepoResult<usize> {
        let started_at = Instant::now();
        let mut staged = Vec::new();
        for store in self.stores.values() {
            match store.stage_pending() {
                Ok(files) => staged.extend(files),
                Err(err) => {
                    discard_staged(&staged);
                    error!(
                        "event=storage_commit module=repo status=error root={} stage=write entity={} error={}",
                        self.root.display(),
                        store.entity_type(),
                        err
                    );
                    return Err(err);
                }
            }
        }
        if let Err(err) = publish_staged(&staged) {
            error!(
                "event=storage_commit module=repo status=error root={} stage=publish error={}",
                self.root.display(),
                err
            );
            return Err(err);
        }

        let written = self
            .stores
            .values_mut()
            .map(EntityStore::finish_commit)
            .sum::<usize>();
        info!(
            "event=storage_commit module=repo status=ok root={} written={} duration_ms={}",
            self.root.display(),
            written,
            started_at.elapsed().as_millis()
        );
        Ok(written)
    }

    /// Drops loaded and staged state of every store.
    pub fn reload(&mut self) {
        for store in self.stores.values_mut() {
            store.reload();
        }
        info!(
            "event=storage_reload module=repo status=ok root={}",
            self.root.display()
        );
    }
}

fn views(entity_type: EntityType, records: Vec<&Record>) -> Vec<EntityView<'_>> {
    records
        .into_iter()
        .map(|record| EntityView::new(entity_type, record))
        .collect()
}

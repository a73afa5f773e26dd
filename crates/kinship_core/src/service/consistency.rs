//! Dangling reference report.
//!
//! Broken links are expected after privacy redaction or partial exports, so
//! the check reports them and never fails on them.

use super::graph::{EntityGraph, GraphResult};
use crate::convert::HANDLE_LINK_KEY;
use crate::model::entity::EntityType;
use crate::model::reference::{reference_ids_at_path, values_at_path};
use log::{info, warn};

/// Why a reference does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DanglingKind {
    /// The id names no stored entity of the target type.
    MissingEntity,
    /// The archive handle never resolved to an id during ingestion.
    UnresolvedHandle,
}

/// One reference that leads nowhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub source_type: EntityType,
    pub source_id: String,
    pub field: &'static str,
    pub target_type: EntityType,
    /// Missing id, or the raw handle for unresolved links.
    pub target: String,
    pub kind: DanglingKind,
}

impl EntityGraph<'_> {
    /// Walks every declared reference of every stored entity.
    pub fn dangling_references(&self) -> GraphResult<Vec<DanglingReference>> {
        let storage = self.storage();
        let mut dangling = Vec::new();
        let mut checked = 0usize;

        for decl in self.references().declarations() {
            let targets = storage.store(decl.target);
            for source in storage.all(decl.source)? {
                for id in reference_ids_at_path(source.record, decl.field) {
                    checked += 1;
                    if !targets.contains(&id)? {
                        dangling.push(DanglingReference {
                            source_type: decl.source,
                            source_id: source.id().to_string(),
                            field: decl.field,
                            target_type: decl.target,
                            target: id,
                            kind: DanglingKind::MissingEntity,
                        });
                    }
                }
                for value in values_at_path(source.record, decl.field) {
                    for item in value.iter_items() {
                        let Some(handle) = item.as_record().and_then(|link| link.text(HANDLE_LINK_KEY))
                        else {
                            continue;
                        };
                        checked += 1;
                        dangling.push(DanglingReference {
                            source_type: decl.source,
                            source_id: source.id().to_string(),
                            field: decl.field,
                            target_type: decl.target,
                            target: handle.to_string(),
                            kind: DanglingKind::UnresolvedHandle,
                        });
                    }
                }
            }
        }

        for reference in &dangling {
            warn!(
                "event=dangling_reference module=graph status=warn source={}/{} field={} target={}/{} kind={:?}",
                reference.source_type,
                reference.source_id,
                reference.field,
                reference.target_type,
                reference.target,
                reference.kind
            );
        }
        info!(
            "event=consistency_check module=graph status=ok checked={} dangling={}",
            checked,
            dangling.len()
        );
        Ok(dangling)
    }
}

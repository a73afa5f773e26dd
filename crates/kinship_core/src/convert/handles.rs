//! Handle/ID resolver.
//!
//! # Responsibility
//! - Assign every entity a stable id and record which archive handle links to it.
//!
//! # Invariants
//! - A handle is registered at most once per archive.
//! - Within one entity type, an id is claimed by at most one handle.
//! - A node without a handle is aliased to its own id.

use super::{ConvertError, ConvertResult};
use crate::archive::RawNode;
use crate::model::entity::EntityType;
use std::collections::HashMap;
use uuid::Uuid;

/// Identity assigned to one archive node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub handle: String,
}

/// Process-scoped handle→id mapping for one ingested archive.
#[derive(Debug, Default)]
pub struct HandleResolver {
    handle_to_id: HashMap<String, String>,
    claimed_ids: HashMap<(EntityType, String), String>,
}

impl HandleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the identity for `node` and registers its handle alias.
    ///
    /// The declared `id` attribute wins; otherwise a random UUID is generated.
    /// The declared `handle` wins; otherwise the handle is the id itself.
    ///
    /// # Errors
    /// - `DuplicateHandle` when the handle was already registered.
    /// - `DuplicateId` when another handle already claimed the id for this type.
    pub fn assign(&mut self, entity_type: EntityType, node: &RawNode) -> ConvertResult<Identity> {
        let id = declared(node, "id").unwrap_or_else(|| Uuid::new_v4().to_string());
        let handle = declared(node, "handle").unwrap_or_else(|| id.clone());

        if let Some(first_id) = self.handle_to_id.get(&handle) {
            return Err(ConvertError::DuplicateHandle {
                handle,
                first_id: first_id.clone(),
                second_id: id,
            });
        }
        let claim = (entity_type, id.clone());
        if let Some(other_handle) = self.claimed_ids.get(&claim) {
            return Err(ConvertError::DuplicateId {
                entity_type,
                id,
                first_handle: other_handle.clone(),
                second_handle: handle,
            });
        }

        self.handle_to_id.insert(handle.clone(), id.clone());
        self.claimed_ids.insert(claim, handle.clone());
        Ok(Identity { id, handle })
    }

    /// Resolves an archive handle to its entity id.
    pub fn resolve(&self, handle: &str) -> Option<&str> {
        self.handle_to_id.get(handle).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handle_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handle_to_id.is_empty()
    }
}

fn declared(node: &RawNode, attribute: &str) -> Option<String> {
    node.attribute(attribute)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

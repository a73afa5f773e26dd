//! Surname alias grouping.
//!
//! # Responsibility
//! - Map a raw surname to its declared group alias (`group_as` name maps).
//! - Derive a person's group names and display name.
//!
//! # Invariants
//! - The alias table is built once on first use and reused until `rebuild`.
//! - Each graph owns its own cache; archives never share aliases.

use super::graph::{EntityGraph, GraphResult};
use crate::model::entity::{EntityType, EntityView};
use crate::model::name::{name_parts, NameParts};
use crate::repo::filter::Filter;
use crate::repo::storage::Storage;
use log::debug;
use once_cell::unsync::OnceCell;
use std::collections::HashMap;

/// Name-map `type` marking a surname grouping declaration.
pub const GROUP_AS_TYPE: &str = "group_as";

/// Lazily built surname → group alias table.
#[derive(Debug, Default)]
pub struct NameGroups {
    aliases: OnceCell<HashMap<String, String>>,
}

impl NameGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declared group alias for `surname`, building the table on first call.
    pub fn group_as(&self, storage: &Storage, surname: &str) -> GraphResult<Option<&str>> {
        let aliases = self
            .aliases
            .get_or_try_init(|| load_aliases(storage))?;
        Ok(aliases.get(surname).map(String::as_str))
    }

    pub fn is_built(&self) -> bool {
        self.aliases.get().is_some()
    }

    /// Drops the table; the next lookup rescans the name maps.
    pub fn rebuild(&mut self) {
        self.aliases = OnceCell::new();
    }
}

fn load_aliases(storage: &Storage) -> GraphResult<HashMap<String, String>> {
    let declarations = storage.find(
        EntityType::NameMap,
        &Filter::field_equals("type", GROUP_AS_TYPE),
    )?;
    let aliases: HashMap<String, String> = declarations
        .into_iter()
        .filter_map(|view| {
            let key = view.record.text("key")?;
            let value = view.record.text("value")?;
            Some((key.to_string(), value.to_string()))
        })
        .collect();
    debug!(
        "event=name_groups_build module=graph status=ok aliases={}",
        aliases.len()
    );
    Ok(aliases)
}

impl<'s> EntityGraph<'s> {
    /// Group alias declared for `surname`.
    pub fn group_as(&self, surname: &str) -> GraphResult<Option<&str>> {
        self.name_groups.group_as(self.storage(), surname)
    }

    /// Forces the alias table to be rebuilt on next use.
    pub fn rebuild_name_groups(&mut self) {
        self.name_groups.rebuild();
    }

    /// Group names of a person, strongest first: explicit `group` of each
    /// name, aliases of primary surnames, then the first primary surname.
    pub fn group_names(&self, person: EntityView<'_>) -> GraphResult<Vec<String>> {
        self.expect_type(person, EntityType::Person)?;
        let mut groups: Vec<String> = Vec::new();
        let mut first_surname: Option<String> = None;
        for parts in name_parts(person.record.get("name")) {
            if let Some(group) = &parts.group {
                push_unique(&mut groups, group);
            }
            for surname in &parts.primary_surnames {
                if first_surname.is_none() {
                    first_surname = Some(surname.clone());
                }
                if let Some(alias) = self.group_as(surname)? {
                    push_unique(&mut groups, alias);
                }
            }
        }
        if let Some(surname) = first_surname {
            push_unique(&mut groups, &surname);
        }
        Ok(groups)
    }

    /// First group name, or the display name when the person has none.
    pub fn group_name(&self, person: EntityView<'_>) -> GraphResult<String> {
        let groups = self.group_names(person)?;
        Ok(groups
            .into_iter()
            .next()
            .unwrap_or_else(|| display_name(person)))
    }
}

/// Display form of a person's first name entry.
pub fn display_name(person: EntityView<'_>) -> String {
    name_parts(person.record.get("name"))
        .first()
        .map(NameParts::display)
        .unwrap_or_else(|| person.id().to_string())
}

fn push_unique(groups: &mut Vec<String>, group: &str) {
    if !groups.iter().any(|existing| existing == group) {
        groups.push(group.to_string());
    }
}

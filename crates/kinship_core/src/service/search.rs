//! Case-insensitive text search over entities.
//!
//! A query is split on whitespace; an entity matches when every word is a
//! substring of at least one of its search tokens. The tokens depend on the
//! entity type: person names and group names, place names, source title,
//! author and publication info. Other types search their top-level text fields.

use super::graph::{EntityGraph, GraphResult};
use crate::model::entity::{EntityType, EntityView};
use crate::model::name::name_parts;
use crate::repo::filter::Filter;
use log::debug;

const SOURCE_FIELDS: &[&str] = &["stitle", "sauthor", "spubinfo"];

impl<'s> EntityGraph<'s> {
    /// Whether every word of `query` occurs in one of the entity's tokens.
    pub fn matches_query(&self, entity: EntityView<'_>, query: &str) -> GraphResult<bool> {
        let patterns: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if patterns.is_empty() {
            return Ok(true);
        }
        let tokens: Vec<String> = self
            .search_tokens(entity)?
            .iter()
            .map(|token| token.trim().to_lowercase())
            .collect();
        Ok(patterns
            .iter()
            .all(|pattern| tokens.iter().any(|token| token.contains(pattern.as_str()))))
    }

    /// Entities of `entity_type` matching `query`, ordered by id.
    pub fn search(
        &self,
        entity_type: EntityType,
        query: &str,
    ) -> GraphResult<Vec<EntityView<'s>>> {
        let mut found = Vec::new();
        for entity in self.find(entity_type, &Filter::All)? {
            if self.matches_query(entity, query)? {
                found.push(entity);
            }
        }
        debug!(
            "event=search module=graph status=ok entity={} matches={}",
            entity_type,
            found.len()
        );
        Ok(found)
    }

    fn search_tokens(&self, entity: EntityView<'_>) -> GraphResult<Vec<String>> {
        let tokens = match entity.entity_type {
            EntityType::Person => {
                let mut tokens: Vec<String> = name_parts(entity.record.get("name"))
                    .iter()
                    .map(|parts| parts.display())
                    .collect();
                tokens.extend(self.group_names(entity)?);
                tokens
            }
            EntityType::Place => self.place_names(entity)?,
            EntityType::Source => SOURCE_FIELDS
                .iter()
                .filter_map(|field| entity.record.text(field))
                .map(str::to_string)
                .collect(),
            _ => entity
                .record
                .iter()
                .filter_map(|(_, value)| value.as_text())
                .map(str::to_string)
                .collect(),
        };
        Ok(tokens)
    }
}

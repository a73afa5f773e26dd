//! Events, places and the nested place hierarchy.
//!
//! A place's `placeref` names its enclosing places; the places nested inside
//! one are found by reverse lookup.

use super::graph::{extend_unique, EntityGraph, GraphResult};
use crate::model::coords::place_coordinates;
use crate::model::entity::{EntityType, EntityView};
use crate::model::record::Value;
use std::collections::HashSet;

const PLACE_NAME_FIELD: &str = "pname";
const PLACE_NAME_VALUE_KEY: &str = "value";
const ALT_NAME_FIELD: &str = "alt_name";
const PLACE_TITLE_FIELD: &str = "ptitle";

impl<'s> EntityGraph<'s> {
    /// Events the person references, in reference order.
    pub fn person_events(&self, person: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        self.expect_type(person, EntityType::Person)?;
        self.find_related(person, EntityType::Event, None)
    }

    /// Distinct places of the person's events in date order, first occurrence wins.
    pub fn person_places(&self, person: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        let mut places = Vec::new();
        let mut seen = HashSet::new();
        for event in self.person_timeline(person)? {
            extend_unique(&mut places, &mut seen, self.event_place(event)?);
        }
        Ok(places)
    }

    pub fn event_place(&self, event: EntityView<'_>) -> GraphResult<Option<EntityView<'s>>> {
        self.expect_type(event, EntityType::Event)?;
        Ok(self
            .find_related(event, EntityType::Place, None)?
            .into_iter()
            .next())
    }

    /// People whose event references name this event.
    pub fn event_participants(&self, event: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        self.expect_type(event, EntityType::Event)?;
        self.find_all_referencing(event, EntityType::Person)
    }

    pub fn event_families(&self, event: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        self.expect_type(event, EntityType::Event)?;
        self.find_all_referencing(event, EntityType::Family)
    }

    /// Places directly enclosing `place`.
    pub fn parent_places(&self, place: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        self.expect_type(place, EntityType::Place)?;
        self.find_related(place, EntityType::Place, None)
    }

    /// Places directly nested inside `place`.
    pub fn nested_places(&self, place: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        self.expect_type(place, EntityType::Place)?;
        self.find_all_referencing(place, EntityType::Place)
    }

    /// Events that name `place` itself.
    pub fn place_events(&self, place: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        self.expect_type(place, EntityType::Place)?;
        self.find_all_referencing(place, EntityType::Event)
    }

    /// Events of `place` and of every place nested below it, each event once.
    pub fn place_events_recursive(
        &self,
        place: EntityView<'_>,
    ) -> GraphResult<Vec<EntityView<'s>>> {
        self.expect_type(place, EntityType::Place)?;

        let mut events = Vec::new();
        let mut seen_events = HashSet::new();
        extend_unique(&mut events, &mut seen_events, self.place_events(place)?);

        let mut visited = HashSet::from([place.id().to_string()]);
        let mut stack = self.nested_places(place)?;
        stack.retain(|nested| visited.insert(nested.id().to_string()));
        while let Some(current) = stack.pop() {
            extend_unique(&mut events, &mut seen_events, self.place_events(current)?);
            for nested in self.nested_places(current)? {
                if visited.insert(nested.id().to_string()) {
                    stack.push(nested);
                }
            }
        }
        Ok(events)
    }

    /// People taking part in events at this place.
    pub fn place_people(&self, place: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        let mut people = Vec::new();
        let mut seen = HashSet::new();
        for event in self.place_events(place)? {
            extend_unique(&mut people, &mut seen, self.event_participants(event)?);
        }
        Ok(people)
    }

    /// Every name of a place: `pname` entries in archive order, then legacy
    /// `alt_name` entries, each once. Falls back to the title.
    pub fn place_names(&self, place: EntityView<'_>) -> GraphResult<Vec<String>> {
        self.expect_type(place, EntityType::Place)?;
        let mut names: Vec<String> = Vec::new();
        let entries = [PLACE_NAME_FIELD, ALT_NAME_FIELD]
            .into_iter()
            .filter_map(|field| place.record.get(field))
            .flat_map(Value::iter_items);
        for entry in entries {
            let name = match entry {
                Value::Record(record) => record.text(PLACE_NAME_VALUE_KEY),
                other => other.as_text(),
            };
            if let Some(name) = name {
                if !names.iter().any(|known| known == name) {
                    names.push(name.to_string());
                }
            }
        }
        if names.is_empty() {
            names.extend(place.record.text(PLACE_TITLE_FIELD).map(str::to_string));
        }
        Ok(names)
    }

    /// Primary place name, else the title, else the id.
    pub fn place_name(&self, place: EntityView<'_>) -> GraphResult<String> {
        Ok(self
            .place_names(place)?
            .into_iter()
            .next()
            .unwrap_or_else(|| place.id().to_string()))
    }

    /// Names after the primary one.
    pub fn place_alt_names(&self, place: EntityView<'_>) -> GraphResult<Vec<String>> {
        Ok(self.place_names(place)?.into_iter().skip(1).collect())
    }

    /// Decimal `(latitude, longitude)` of a place, when both parse.
    pub fn place_coordinates(&self, place: EntityView<'_>) -> GraphResult<Option<(f64, f64)>> {
        self.expect_type(place, EntityType::Place)?;
        Ok(place_coordinates(place.record))
    }
}

//! Dated views over people, events and places.
//!
//! # Invariants
//! - Chronological orderings are stable: events with equal or missing dates
//!   keep reference order, undated events come first.
//! - Birth and death come from the first event of that type on the timeline.

use super::graph::{EntityGraph, GraphResult};
use crate::model::date::{date_sort_key, EntityDate};
use crate::model::entity::{EntityType, EntityView};
use chrono::{Datelike, Utc};

const EVENT_TYPE_FIELD: &str = "type";
const BIRTH_EVENT: &str = "Birth";
const DEATH_EVENT: &str = "Death";

/// Date of an event, citation or media object record.
pub fn entity_date(view: EntityView<'_>) -> Option<EntityDate> {
    EntityDate::from_record(view.record)
}

impl<'s> EntityGraph<'s> {
    /// The person's events ordered by date.
    pub fn person_timeline(&self, person: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        let mut events = self.person_events(person)?;
        events.sort_by_cached_key(|event| date_sort_key(entity_date(*event).as_ref()));
        Ok(events)
    }

    pub fn birth(&self, person: EntityView<'_>) -> GraphResult<Option<EntityDate>> {
        self.first_event_date(person, BIRTH_EVENT)
    }

    pub fn death(&self, person: EntityView<'_>) -> GraphResult<Option<EntityDate>> {
        self.first_event_date(person, DEATH_EVENT)
    }

    /// Age in whole years at death, or now when no death is recorded.
    pub fn age(&self, person: EntityView<'_>) -> GraphResult<Option<i32>> {
        self.age_as_of(person, Utc::now().year())
    }

    /// Like [`EntityGraph::age`], counting a living person's age up to `current_year`.
    ///
    /// `None` when the birth year, or a recorded death's year, is unknown.
    pub fn age_as_of(
        &self,
        person: EntityView<'_>,
        current_year: i32,
    ) -> GraphResult<Option<i32>> {
        let Some(born) = self.birth(person)?.as_ref().and_then(EntityDate::year) else {
            return Ok(None);
        };
        let until = match self.death(person)? {
            Some(death) => death.year(),
            None => Some(current_year),
        };
        Ok(until.map(|year| year - born))
    }

    /// `first-last` years of the events at this place, the full date when there
    /// is a single distinct one, `None` when no event is dated.
    pub fn place_events_years(&self, place: EntityView<'_>) -> GraphResult<Option<String>> {
        let mut dates: Vec<EntityDate> = self
            .place_events(place)?
            .into_iter()
            .filter_map(entity_date)
            .collect();
        dates.sort_by_cached_key(|date| date_sort_key(Some(date)));
        let (Some(since), Some(until)) = (dates.first(), dates.last()) else {
            return Ok(None);
        };
        if since == until {
            return Ok(Some(since.to_string()));
        }
        let year = |date: &EntityDate| {
            date.year()
                .map(|year| year.to_string())
                .unwrap_or_else(|| "?".to_string())
        };
        Ok(Some(format!("{}-{}", year(since), year(until))))
    }

    fn first_event_date(
        &self,
        person: EntityView<'_>,
        event_type: &str,
    ) -> GraphResult<Option<EntityDate>> {
        self.expect_type(person, EntityType::Person)?;
        Ok(self
            .person_timeline(person)?
            .into_iter()
            .find(|event| event.record.text(EVENT_TYPE_FIELD) == Some(event_type))
            .and_then(entity_date))
    }
}

//! Family relationships and recursive ancestry walks.
//!
//! Families link people: a person's `childof` names the families they were
//! born into, `parentin` the families they head. Parents, children, siblings
//! and partners are all derived through those family records.
//!
//! # Invariants
//! - Walks keep a visited set, so cyclic input terminates.
//! - The seed person is never part of its own ancestors or descendants.
//! - Results hold each person once, in first-discovery order.

use super::graph::{extend_unique, EntityGraph, GraphResult};
use crate::model::entity::{EntityType, EntityView};
use std::collections::HashSet;

const CHILD_OF_FIELD: &str = "childof";
const PARENT_IN_FIELD: &str = "parentin";
const FATHER_FIELD: &str = "father";
const MOTHER_FIELD: &str = "mother";

impl<'s> EntityGraph<'s> {
    /// Families the person was born into.
    pub fn parent_families(&self, person: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        self.expect_type(person, EntityType::Person)?;
        self.find_related(person, EntityType::Family, Some(CHILD_OF_FIELD))
    }

    /// Families in which the person is a parent.
    pub fn families(&self, person: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        self.expect_type(person, EntityType::Person)?;
        self.find_related(person, EntityType::Family, Some(PARENT_IN_FIELD))
    }

    pub fn father(&self, family: EntityView<'_>) -> GraphResult<Option<EntityView<'s>>> {
        self.expect_type(family, EntityType::Family)?;
        Ok(self
            .find_related(family, EntityType::Person, Some(FATHER_FIELD))?
            .into_iter()
            .next())
    }

    pub fn mother(&self, family: EntityView<'_>) -> GraphResult<Option<EntityView<'s>>> {
        self.expect_type(family, EntityType::Family)?;
        Ok(self
            .find_related(family, EntityType::Person, Some(MOTHER_FIELD))?
            .into_iter()
            .next())
    }

    pub fn family_children(&self, family: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        self.expect_type(family, EntityType::Family)?;
        self.find_related(family, EntityType::Person, None)
    }

    /// Mother then father of every birth family.
    pub fn parents(&self, person: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        let mut parents = Vec::new();
        let mut seen = HashSet::new();
        for family in self.parent_families(person)? {
            extend_unique(&mut parents, &mut seen, self.mother(family)?);
            extend_unique(&mut parents, &mut seen, self.father(family)?);
        }
        Ok(parents)
    }

    pub fn children(&self, person: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        let mut children = Vec::new();
        let mut seen = HashSet::new();
        for family in self.families(person)? {
            extend_unique(&mut children, &mut seen, self.family_children(family)?);
        }
        Ok(children)
    }

    /// Other children of the person's birth families.
    pub fn siblings(&self, person: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        let mut siblings = Vec::new();
        let mut seen = HashSet::from([person.id().to_string()]);
        for family in self.parent_families(person)? {
            extend_unique(&mut siblings, &mut seen, self.family_children(family)?);
        }
        Ok(siblings)
    }

    /// The other parent of every family the person heads.
    pub fn partners(&self, person: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        let mut partners = Vec::new();
        let mut seen = HashSet::from([person.id().to_string()]);
        for family in self.families(person)? {
            extend_unique(&mut partners, &mut seen, self.father(family)?);
            extend_unique(&mut partners, &mut seen, self.mother(family)?);
        }
        Ok(partners)
    }

    /// Parents, siblings, partners, then children, each person once.
    pub fn related_people(&self, person: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        let mut related = Vec::new();
        let mut seen = HashSet::from([person.id().to_string()]);
        extend_unique(&mut related, &mut seen, self.parents(person)?);
        extend_unique(&mut related, &mut seen, self.siblings(person)?);
        extend_unique(&mut related, &mut seen, self.partners(person)?);
        extend_unique(&mut related, &mut seen, self.children(person)?);
        Ok(related)
    }

    /// Every ancestor reachable through birth families.
    pub fn ancestors(&self, person: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        self.walk(person, |graph, current| graph.parents(current))
    }

    /// Every descendant reachable through families the person heads.
    pub fn descendants(&self, person: EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>> {
        self.walk(person, |graph, current| graph.children(current))
    }

    /// Work-stack walk; yields nodes in pop order, seed excluded.
    fn walk<F>(&self, seed: EntityView<'_>, next: F) -> GraphResult<Vec<EntityView<'s>>>
    where
        F: Fn(&Self, EntityView<'_>) -> GraphResult<Vec<EntityView<'s>>>,
    {
        self.expect_type(seed, EntityType::Person)?;
        let mut visited = HashSet::from([seed.id().to_string()]);
        let mut found = Vec::new();
        let mut stack: Vec<EntityView<'s>> = Vec::new();
        for first in next(self, seed)? {
            if visited.insert(first.id().to_string()) {
                stack.push(first);
            }
        }
        while let Some(current) = stack.pop() {
            found.push(current);
            for neighbour in next(self, current)? {
                if visited.insert(neighbour.id().to_string()) {
                    stack.push(neighbour);
                }
            }
        }
        Ok(found)
    }
}

//! Entity graph resolver.
//!
//! # Responsibility
//! - Hold the static reference map: which field of which entity type names
//!   which other entity type.
//! - Answer forward ("related to") and reverse ("referenced by") queries over
//!   [`Storage`], plus joins that attach related entities to base records.
//!
//! # Invariants
//! - Every declared reference field is an indexed field of its source type,
//!   so reverse lookups never hit `NotIndexed`.
//! - At most one default field per (source, target) pair.
//! - Dangling references yield nothing; they are never errors.
//!
//! # See also
//! - `service::family_tree`, `service::places` for derived traversals.

use super::name_groups::NameGroups;
use crate::model::entity::{EntityType, EntityView, PrivateFields};
use crate::model::record::{Record, Value};
use crate::model::reference::reference_ids_at_path;
use crate::repo::filter::Filter;
use crate::repo::storage::Storage;
use crate::repo::{indexed_fields, RepoError};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Prefix of the fields a join attaches to a base record.
pub const RELATED_KEY_PREFIX: &str = "related_";

pub type GraphResult<T> = Result<T, GraphError>;

/// Reference map setup and query errors.
#[derive(Debug)]
pub enum GraphError {
    /// Both directions (or two defaults) exist and no field disambiguates.
    AmbiguousReference {
        source_type: EntityType,
        target_type: EntityType,
        fields: Vec<&'static str>,
    },
    /// No declared reference between the two types (or not via that field).
    UndeclaredReference {
        source_type: EntityType,
        target_type: EntityType,
        field: Option<String>,
    },
    /// Declared reference field has no index on its source type.
    UnindexedReference {
        source_type: EntityType,
        field: &'static str,
    },
    /// An operation received an entity of the wrong type.
    WrongEntityType {
        expected: EntityType,
        actual: EntityType,
    },
    Repo(RepoError),
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AmbiguousReference {
                source_type,
                target_type,
                fields,
            } => write!(
                f,
                "ambiguous reference between {source_type} and {target_type} (fields: {})",
                fields.join(", ")
            ),
            Self::UndeclaredReference {
                source_type,
                target_type,
                field: Some(field),
            } => write!(
                f,
                "{source_type} does not reference {target_type} via `{field}`"
            ),
            Self::UndeclaredReference {
                source_type,
                target_type,
                field: None,
            } => write!(f, "{source_type} declares no reference to {target_type}"),
            Self::UnindexedReference { source_type, field } => write!(
                f,
                "reference field `{field}` of {source_type} is not indexed"
            ),
            Self::WrongEntityType { expected, actual } => {
                write!(f, "expected an entity of {expected}, got {actual}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GraphError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for GraphError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// One declared reference: `source.field` names entities of `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceDecl {
    pub source: EntityType,
    pub target: EntityType,
    pub field: &'static str,
    /// Used when a query names only the target type.
    pub default: bool,
}

const fn decl(
    source: EntityType,
    target: EntityType,
    field: &'static str,
    default: bool,
) -> ReferenceDecl {
    ReferenceDecl {
        source,
        target,
        field,
        default,
    }
}

const STANDARD_REFERENCES: &[ReferenceDecl] = {
    use EntityType::*;
    &[
        decl(Person, Citation, "citationref", true),
        decl(Person, Citation, "attribute.citationref", false),
        decl(Person, Event, "eventref", true),
        decl(Person, MediaObject, "objref", true),
        decl(Person, Note, "noteref", true),
        decl(Person, Person, "personref", true),
        decl(Person, Family, "childof", false),
        decl(Person, Family, "parentin", false),
        decl(Family, Person, "childref", true),
        decl(Family, Person, "father", false),
        decl(Family, Person, "mother", false),
        decl(Family, Event, "eventref", true),
        decl(Family, Citation, "citationref", true),
        decl(Family, Note, "noteref", true),
        decl(Family, MediaObject, "objref", true),
        decl(Event, Place, "place", true),
        decl(Event, Citation, "citationref", true),
        decl(Event, Note, "noteref", true),
        decl(Event, MediaObject, "objref", true),
        decl(Place, Place, "placeref", true),
        decl(Place, Citation, "citationref", true),
        decl(Place, Note, "noteref", true),
        decl(Place, MediaObject, "objref", true),
        decl(Source, Repository, "reporef", true),
        decl(Source, Note, "noteref", true),
        decl(Source, MediaObject, "objref", true),
        decl(Citation, Source, "sourceref", true),
        decl(Citation, Note, "noteref", true),
        decl(Citation, MediaObject, "objref", true),
        decl(MediaObject, Citation, "citationref", true),
        decl(MediaObject, Note, "noteref", true),
        decl(Repository, Note, "noteref", true),
    ]
};

/// Validated, immutable reference table.
#[derive(Debug, Clone)]
pub struct ReferenceMap {
    decls: Vec<ReferenceDecl>,
    defaults: BTreeMap<(EntityType, EntityType), &'static str>,
}

impl ReferenceMap {
    /// Validates `decls` and builds the default-field table.
    ///
    /// # Errors
    /// - `UnindexedReference` when a field is not indexed on its source type.
    /// - `AmbiguousReference` when a pair declares two default fields.
    pub fn new(decls: Vec<ReferenceDecl>) -> GraphResult<Self> {
        let mut defaults = BTreeMap::new();
        for decl in &decls {
            if !indexed_fields(decl.source).contains(&decl.field) {
                return Err(GraphError::UnindexedReference {
                    source_type: decl.source,
                    field: decl.field,
                });
            }
            if !decl.default {
                continue;
            }
            if let Some(previous) = defaults.insert((decl.source, decl.target), decl.field) {
                return Err(GraphError::AmbiguousReference {
                    source_type: decl.source,
                    target_type: decl.target,
                    fields: vec![previous, decl.field],
                });
            }
        }
        Ok(Self { decls, defaults })
    }

    /// Reference map of the archive's entity model.
    pub fn standard() -> GraphResult<Self> {
        Self::new(STANDARD_REFERENCES.to_vec())
    }

    pub fn declarations(&self) -> &[ReferenceDecl] {
        &self.decls
    }

    pub fn default_field(&self, source: EntityType, target: EntityType) -> Option<&'static str> {
        self.defaults.get(&(source, target)).copied()
    }

    pub fn is_declared(&self, source: EntityType, target: EntityType, field: &str) -> bool {
        self.decls
            .iter()
            .any(|decl| decl.source == source && decl.target == target && decl.field == field)
    }

    /// Picks the field for `source → target`: the explicit one when given
    /// (it must be declared), otherwise the default, otherwise the only
    /// declared field. Several declared fields without a default are
    /// `AmbiguousReference`.
    pub fn resolve_field(
        &self,
        source: EntityType,
        target: EntityType,
        field: Option<&str>,
    ) -> GraphResult<&'static str> {
        let undeclared = || GraphError::UndeclaredReference {
            source_type: source,
            target_type: target,
            field: field.map(str::to_string),
        };
        match field {
            Some(field) => self
                .decls
                .iter()
                .find(|decl| decl.source == source && decl.target == target && decl.field == field)
                .map(|decl| decl.field)
                .ok_or_else(undeclared),
            None => {
                if let Some(default) = self.default_field(source, target) {
                    return Ok(default);
                }
                let fields: Vec<&'static str> = self
                    .decls
                    .iter()
                    .filter(|decl| decl.source == source && decl.target == target)
                    .map(|decl| decl.field)
                    .collect();
                match fields.as_slice() {
                    [] => Err(undeclared()),
                    [only] => Ok(*only),
                    _ => Err(GraphError::AmbiguousReference {
                        source_type: source,
                        target_type: target,
                        fields,
                    }),
                }
            }
        }
    }
}

/// How a join reaches one related type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDirection {
    /// Base record's own field names the related entities.
    Forward(&'static str),
    /// Related entities name the base record through their field.
    Reverse(&'static str),
}

/// Requested related type, optionally pinned to one direction and field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSpec {
    Auto(EntityType),
    Forward(EntityType, &'static str),
    Reverse(EntityType, &'static str),
}

/// Join resolved at setup time; executing it never re-checks the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    pub base: EntityType,
    pub steps: Vec<(EntityType, JoinDirection)>,
}

impl JoinPlan {
    /// Resolves every requested related type against `references`.
    ///
    /// # Errors
    /// - `AmbiguousReference` when an `Auto` type is reachable both ways.
    /// - `UndeclaredReference` when it is reachable neither way, or a pinned
    ///   field is not declared.
    pub fn resolve(
        references: &ReferenceMap,
        base: EntityType,
        related: &[JoinSpec],
    ) -> GraphResult<Self> {
        let mut steps = Vec::with_capacity(related.len());
        for spec in related {
            let step = match *spec {
                JoinSpec::Forward(target, field) => (
                    target,
                    JoinDirection::Forward(references.resolve_field(base, target, Some(field))?),
                ),
                JoinSpec::Reverse(target, field) => (
                    target,
                    JoinDirection::Reverse(references.resolve_field(target, base, Some(field))?),
                ),
                JoinSpec::Auto(target) => {
                    let forward = references.default_field(base, target);
                    let reverse = references.default_field(target, base);
                    match (forward, reverse) {
                        (Some(forward), None) => (target, JoinDirection::Forward(forward)),
                        (None, Some(reverse)) => (target, JoinDirection::Reverse(reverse)),
                        (Some(forward), Some(reverse)) => {
                            return Err(GraphError::AmbiguousReference {
                                source_type: base,
                                target_type: target,
                                fields: vec![forward, reverse],
                            })
                        }
                        (None, None) => {
                            return Err(GraphError::UndeclaredReference {
                                source_type: base,
                                target_type: target,
                                field: None,
                            })
                        }
                    }
                }
            };
            steps.push(step);
        }
        Ok(Self { base, steps })
    }
}

/// Base entity with related entities attached per joined type.
#[derive(Debug, Clone)]
pub struct JoinedEntity<'s> {
    pub base: EntityView<'s>,
    pub related: Vec<(EntityType, Vec<EntityView<'s>>)>,
}

impl JoinedEntity<'_> {
    /// Base record plus one `related_<collection>` list per joined type.
    pub fn to_record(&self) -> Record {
        self.assemble(|view| view.record.clone())
    }

    /// Same as [`JoinedEntity::to_record`] with private records masked.
    pub fn to_public_record(&self, mode: PrivateFields) -> Record {
        self.assemble(|view| view.public_record(mode))
    }

    fn assemble(&self, present: impl Fn(&EntityView<'_>) -> Record) -> Record {
        let mut record = present(&self.base);
        for (entity_type, views) in &self.related {
            let items = views
                .iter()
                .map(|view| Value::Record(present(view)))
                .collect();
            record.insert(
                format!("{RELATED_KEY_PREFIX}{}", entity_type.collection_name()),
                Value::List(items),
            );
        }
        record
    }
}

/// Relationship queries over one storage snapshot.
pub struct EntityGraph<'s> {
    storage: &'s Storage,
    references: ReferenceMap,
    pub(super) name_groups: NameGroups,
}

impl<'s> EntityGraph<'s> {
    /// Graph over `storage` using the standard reference map.
    pub fn new(storage: &'s Storage) -> GraphResult<Self> {
        Ok(Self::with_references(storage, ReferenceMap::standard()?))
    }

    pub fn with_references(storage: &'s Storage, references: ReferenceMap) -> Self {
        Self {
            storage,
            references,
            name_groups: NameGroups::new(),
        }
    }

    pub fn storage(&self) -> &'s Storage {
        self.storage
    }

    pub fn references(&self) -> &ReferenceMap {
        &self.references
    }

    pub fn get(&self, entity_type: EntityType, id: &str) -> GraphResult<EntityView<'s>> {
        Ok(self.storage.get(entity_type, id)?)
    }

    pub fn find(&self, entity_type: EntityType, filter: &Filter) -> GraphResult<Vec<EntityView<'s>>> {
        Ok(self.storage.find(entity_type, filter)?)
    }

    /// Entities of `target` named by `entity`, in reference order.
    ///
    /// `field` defaults to the declared default for the pair. Ids that do not
    /// resolve are skipped.
    pub fn find_related(
        &self,
        entity: EntityView<'_>,
        target: EntityType,
        field: Option<&str>,
    ) -> GraphResult<Vec<EntityView<'s>>> {
        let field = self
            .references
            .resolve_field(entity.entity_type, target, field)?;
        let mut related = Vec::new();
        for id in reference_ids_at_path(entity.record, field) {
            match self.storage.get(target, &id) {
                Ok(view) => related.push(view),
                Err(RepoError::NotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(related)
    }

    /// Entities of `source` whose declared reference field names `entity`.
    pub fn find_all_referencing(
        &self,
        entity: EntityView<'_>,
        source: EntityType,
    ) -> GraphResult<Vec<EntityView<'s>>> {
        self.find_referencing(entity.entity_type, entity.id(), source, None)
    }

    /// Reverse lookup by type and id, answered from the source type's index.
    pub fn find_referencing(
        &self,
        target: EntityType,
        target_id: &str,
        source: EntityType,
        field: Option<&str>,
    ) -> GraphResult<Vec<EntityView<'s>>> {
        let field = self.references.resolve_field(source, target, field)?;
        Ok(self.storage.find_by_index(source, field, &[target_id])?)
    }

    /// Resolves a join against this graph's reference map.
    pub fn join_plan(&self, base: EntityType, related: &[JoinSpec]) -> GraphResult<JoinPlan> {
        JoinPlan::resolve(&self.references, base, related)
    }

    /// Runs `plan` for every base entity matching `filter`.
    pub fn join(&self, plan: &JoinPlan, filter: &Filter) -> GraphResult<Vec<JoinedEntity<'s>>> {
        let mut joined = Vec::new();
        for base in self.storage.find(plan.base, filter)? {
            let mut related = Vec::with_capacity(plan.steps.len());
            for (target, direction) in &plan.steps {
                let views = match direction {
                    JoinDirection::Forward(field) => self.find_related(base, *target, Some(*field))?,
                    JoinDirection::Reverse(field) => {
                        self.storage.find_by_index(*target, field, &[base.id()])?
                    }
                };
                related.push((*target, views));
            }
            joined.push(JoinedEntity { base, related });
        }
        Ok(joined)
    }

    pub(super) fn expect_type(
        &self,
        entity: EntityView<'_>,
        expected: EntityType,
    ) -> GraphResult<()> {
        if entity.entity_type != expected {
            return Err(GraphError::WrongEntityType {
                expected,
                actual: entity.entity_type,
            });
        }
        Ok(())
    }
}

/// Appends views whose id was not seen yet, keeping first-seen order.
pub(super) fn extend_unique<'s>(
    out: &mut Vec<EntityView<'s>>,
    seen: &mut HashSet<String>,
    views: impl IntoIterator<Item = EntityView<'s>>,
) {
    for view in views {
        if seen.insert(view.id().to_string()) {
            out.push(view);
        }
    }
}

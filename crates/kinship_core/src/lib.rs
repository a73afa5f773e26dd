//! Genealogical archive ingestion and entity graph resolution.
//!
//! Reads a compressed family-tree archive, flattens each entity into a
//! validated record, stores records one file per entity, and answers
//! relationship queries (forward, reverse, joins, ancestry) over them.

pub mod archive;
pub mod config;
pub mod convert;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod service;

pub use archive::{read_archive, ArchiveError, ArchiveResult, RawNode};
pub use config::{default_log_level, KinshipConfig};
pub use convert::{ConvertError, ConvertResult, Converter};
pub use logging::init_logging;
pub use model::date::EntityDate;
pub use model::entity::{Entity, EntityType, EntityView, PrivateFields};
pub use model::record::{Record, Value};
pub use repo::filter::Filter;
pub use repo::storage::Storage;
pub use repo::{RepoError, RepoResult};
pub use schema::{validate_entity, SchemaError, SchemaResult};
pub use service::consistency::{DanglingKind, DanglingReference};
pub use service::graph::{
    EntityGraph, GraphError, GraphResult, JoinPlan, JoinSpec, JoinedEntity, ReferenceMap,
};
pub use service::import_service::{
    import, import_into, Import, ImportError, ImportResult, ImportSummary,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate archive conversion and storage into the import use case.
//! - Answer relationship queries over stored entities through [`graph::EntityGraph`].
//!
//! # See also
//! - `repo` for the storage layer these services sit on.

pub mod consistency;
pub mod dates;
pub mod family_tree;
pub mod graph;
pub mod import_service;
pub mod name_groups;
pub mod places;
pub mod search;

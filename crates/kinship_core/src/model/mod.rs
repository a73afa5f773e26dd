//! Normalized genealogical data model.
//!
//! # Responsibility
//! - Define the flattened record shape every archive entity is converted into.
//! - Provide pure helpers over records: reference normalization, name parts,
//!   coordinates, dates.
//!
//! # Invariants
//! - Every entity is identified by a stable `id`; the archive `handle` maps to
//!   exactly one `id`.
//! - Records are immutable once stored; replacement is wholesale.

pub mod coords;
pub mod date;
pub mod entity;
pub mod name;
pub mod record;
pub mod reference;

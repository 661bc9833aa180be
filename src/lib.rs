//! Consolidates two independently evolved bookshelf databases, exported as
//! flat per-table CSV snapshots, into one merged database.
//!
//! The core engine deduplicates same-shaped entity tables across both
//! sources into canonical entities with content-addressed UUIDs, maps every
//! original id to its canonical id, rewrites dependent link tables, and
//! independently validates that no record, link or identifier was lost or
//! duplicated.

pub mod config;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod fuzzy;
pub mod identity;
pub mod merge;
pub mod normalize;
pub mod report;
pub mod table;
pub mod validate;

//! Per-entity-family merge steps.
//!
//! Each step follows the same staged shape: load both sources, build
//! canonical-keyed rows, deduplicate, enrich the dependent link tables,
//! persist the outputs and a metadata record for the validator.

pub mod book_authors;
pub mod book_topics;
pub mod paper_authors;
pub mod papers;

use crate::config::MigrationConfig;
use crate::error::Result;
use crate::table::{RawTable, SourceTag};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Load one source's table by file name. Missing files become empty tables.
pub(crate) fn load_source_table(
    config: &MigrationConfig,
    source: SourceTag,
    file_name: &str,
    declared_columns: &[&str],
) -> Result<RawTable> {
    let path = config.source_dir(source).join(file_name);
    let name = format!("{file_name} ({source})");
    let table = RawTable::load(&path, &name, declared_columns)?;
    info!("Loaded {} rows from {}", table.len(), name);
    Ok(table)
}

/// Persist a one-row migration-metadata record as CSV.
pub(crate) fn write_metadata<T: Serialize>(path: &Path, metadata: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.serialize(metadata)?;
    writer.flush()?;
    Ok(())
}

/// Read back a one-row migration-metadata record.
pub fn read_metadata<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut reader = csv::Reader::from_path(path)?;
    let record = reader
        .deserialize()
        .next()
        .ok_or_else(|| crate::error::MigrateError::Ingest(format!("{} is empty", path.display())))??;
    Ok(record)
}

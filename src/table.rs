//! In-memory string tables loaded from per-source CSV exports.
//!
//! Every cell stays string-typed at the engine boundary. Column names are
//! resolved case-insensitively once at ingestion, never probed per row.

use crate::error::Result;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Which source database a row came from. Db1 takes precedence over Db2
/// when breaking dedup ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Db1,
    Db2,
}

impl SourceTag {
    /// Fixed precedence order used by every merge step.
    pub const PRECEDENCE: [SourceTag; 2] = [SourceTag::Db1, SourceTag::Db2];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Db1 => "db1",
            SourceTag::Db2 => "db2",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully materialized flat table of string cells.
#[derive(Debug, Clone)]
pub struct RawTable {
    name: String,
    columns: Vec<String>,
    /// Lowercased column name -> position, built once at ingestion.
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let index = build_index(&columns);
        Self {
            name: name.to_string(),
            columns,
            index,
            rows: Vec::new(),
        }
    }

    /// Construct a table from already-materialized rows. Short rows are
    /// padded with empty cells, long rows truncated to the column count.
    pub fn from_rows(name: &str, columns: &[&str], rows: Vec<Vec<String>>) -> Self {
        let mut table = Self::new(name, columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Load a CSV file. A missing file is treated as an empty table with
    /// the declared columns, not an error.
    pub fn load(path: &Path, name: &str, declared_columns: &[&str]) -> Result<Self> {
        if !path.exists() {
            warn!("{} not found at {}, treating as empty", name, path.display());
            return Ok(Self::new(name, declared_columns));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let index = build_index(&columns);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Self {
            name: name.to_string(),
            columns,
            index,
            rows,
        })
    }

    /// Write the table as CSV, creating parent directories as needed.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = WriterBuilder::new().from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Case-insensitive column position lookup.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    pub fn row(&self, idx: usize) -> &[String] {
        &self.rows[idx]
    }

    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    /// Cell accessor tolerating an absent column, as the source exports do
    /// not all carry every declared column.
    pub fn field<'a>(&self, row: &'a [String], column: Option<usize>) -> &'a str {
        column.and_then(|i| row.get(i)).map_or("", |s| s.as_str())
    }
}

fn build_index(columns: &[String]) -> HashMap<String, usize> {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.to_lowercase(), i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawTable {
        RawTable::from_rows(
            "Authors",
            &["AuthorID", "FirstName", "LastName"],
            vec![
                vec!["1".into(), "John".into(), "Smith".into()],
                vec!["2".into(), "Ada".into()],
            ],
        )
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let table = sample();
        assert_eq!(table.column("authorid"), Some(0));
        assert_eq!(table.column("AUTHORID"), Some(0));
        assert_eq!(table.column("firstname"), Some(1));
        assert_eq!(table.column("BookID"), None);
    }

    #[test]
    fn short_rows_are_padded() {
        let table = sample();
        let row = table.row(1);
        assert_eq!(row.len(), 3);
        assert_eq!(row[2], "");
    }

    #[test]
    fn missing_file_loads_empty() {
        let path = Path::new("definitely/not/here/Authors.csv");
        let table = RawTable::load(path, "Authors", &["AuthorID", "FirstName"]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column("firstname"), Some(1));
    }

    #[test]
    fn field_tolerates_absent_column() {
        let table = sample();
        let row = table.row(0);
        assert_eq!(table.field(row, table.column("MiddleName")), "");
        assert_eq!(table.field(row, table.column("FirstName")), "John");
    }

    #[test]
    fn csv_round_trip() {
        let dir = std::env::temp_dir().join(format!("migrate-table-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.csv");

        let table = sample();
        table.write(&path).unwrap();
        let loaded = RawTable::load(&path, "Authors", &[]).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.row(0)[1], "John");

        std::fs::remove_dir_all(&dir).ok();
    }
}

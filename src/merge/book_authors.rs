//! Book authors merge: deduplicate `Authors` across both sources by
//! normalized name and rewrite `BookAuthors` links.

use crate::config::MigrationConfig;
use crate::dedup::{dedup, SourceRow};
use crate::enrich::{enrich_links, EnrichStats};
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::merge::{load_source_table, write_metadata};
use crate::normalize::{clean_value, is_empty_key, join_key};
use crate::report;
use crate::table::{RawTable, SourceTag};
use serde::{Deserialize, Serialize};

pub const FAMILY: &str = "book_authors";
pub const FAMILY_DIR: &str = "BOOK_AUTHORS";
pub const FINAL_TABLE: &str = "BOOK_AUTHORS.csv";
pub const MAPPING_FILE: &str = "author_id_mapping.csv";
pub const METADATA_FILE: &str = "book_authors_migration_metadata.csv";

pub const AUTHORS_FILE: &str = "Authors.csv";
pub const LINKS_FILE: &str = "BookAuthors.csv";
const AUTHORS_COLUMNS: [&str; 4] = ["AuthorID", "FirstName", "MiddleName", "LastName"];
const LINKS_COLUMNS: [&str; 3] = ["BookAuthorID", "BookID", "AuthorID"];

#[derive(Debug, Serialize, Deserialize)]
pub struct BookAuthorsMetadata {
    pub source_db1_authors: usize,
    pub source_db2_authors: usize,
    pub empty_key_db1: usize,
    pub empty_key_db2: usize,
    pub source_db1_book_authors: usize,
    pub source_db2_book_authors: usize,
    pub skipped_incomplete_db1: usize,
    pub skipped_incomplete_db2: usize,
    pub orphaned_db1: usize,
    pub orphaned_db2: usize,
    pub enriched_db1_rows: usize,
    pub enriched_db2_rows: usize,
    pub duplicates_merged: usize,
    pub unique_authors: usize,
    pub id_mappings: usize,
}

pub fn enriched_file(source: SourceTag) -> String {
    format!("book_authors_enriched_{source}.csv")
}

/// Build dedup-ready rows from one source's Authors table. First and middle
/// name combine into a single display first name, as the target schema has
/// no middle-name column.
fn source_rows(table: &RawTable, source: SourceTag) -> Vec<SourceRow> {
    let id_col = table.column("AuthorID");
    let first_col = table.column("FirstName");
    let middle_col = table.column("MiddleName");
    let last_col = table.column("LastName");

    table
        .rows()
        .map(|row| {
            let first = table.field(row, first_col);
            let middle = table.field(row, middle_col);
            let last = table.field(row, last_col);
            let combined_first = clean_value(&format!("{first} {middle}"));
            let last_clean = clean_value(last);
            let key = join_key(&[&combined_first, &last_clean]);
            SourceRow {
                source,
                original_id: table.field(row, id_col).trim().to_string(),
                id_key: key.clone(),
                key,
                display: vec![combined_first, last_clean],
                original: vec![first.to_string(), middle.to_string(), last.to_string()],
            }
        })
        .collect()
}

pub fn run(config: &MigrationConfig) -> Result<BookAuthorsMetadata> {
    report::section("BOOK AUTHORS MERGE");

    let mut rows: Vec<SourceRow> = Vec::new();
    let mut raw_counts = [0usize; 2];
    let mut empty_keys = [0usize; 2];
    let mut link_tables: Vec<RawTable> = Vec::new();

    for (i, &source) in SourceTag::PRECEDENCE.iter().enumerate() {
        let authors = load_source_table(config, source, AUTHORS_FILE, &AUTHORS_COLUMNS)?;
        raw_counts[i] = authors.len();
        let source_rows = source_rows(&authors, source);
        empty_keys[i] = source_rows.iter().filter(|r| is_empty_key(&r.key)).count();
        rows.extend(source_rows);
        link_tables.push(load_source_table(config, source, LINKS_FILE, &LINKS_COLUMNS)?);
    }

    let resolver = IdentityResolver::new(FAMILY);
    let outcome = dedup(&resolver, rows);
    report::info(&format!(
        "Merged {} source authors into {} unique authors",
        outcome.stats.input_rows - outcome.stats.empty_key_rows,
        outcome.stats.unique_entities
    ));

    let family_dir = config.family_dir(FAMILY_DIR);
    let mut link_stats = [EnrichStats::default(); 2];

    for (i, &source) in SourceTag::PRECEDENCE.iter().enumerate() {
        let enriched = enrich_links(
            &link_tables[i],
            "AuthorID",
            &outcome.id_map(source),
            &[("old_first_name", 0), ("old_last_name", 2)],
            "new_book_author_id",
        )?;
        enriched.table.write(&family_dir.join(enriched_file(source)))?;
        link_stats[i] = enriched.stats;
        report::info(&format!(
            "{source}: {} links enriched, {} incomplete, {} orphaned",
            enriched.stats.enriched, enriched.stats.incomplete, enriched.stats.orphan
        ));
    }

    let mut final_table = RawTable::new(
        "BOOK_AUTHORS",
        &["book_author_id", "first_name", "last_name"],
    );
    for entity in &outcome.entities {
        final_table.push_row(vec![
            entity.canonical_id.to_string(),
            entity.display[0].clone(),
            entity.display[1].clone(),
        ]);
    }
    final_table.write(&config.paths.final_tables.join(FINAL_TABLE))?;

    let mut mapping_table = RawTable::new(
        "author_id_mapping",
        &[
            "source_db",
            "old_author_id",
            "old_first_name",
            "old_middle_name",
            "old_last_name",
            "new_book_author_id",
        ],
    );
    for row in &outcome.mapping {
        mapping_table.push_row(vec![
            row.source.to_string(),
            row.original_id.clone(),
            row.original[0].clone(),
            row.original[1].clone(),
            row.original[2].clone(),
            row.canonical_id.to_string(),
        ]);
    }
    mapping_table.write(&family_dir.join(MAPPING_FILE))?;

    let metadata = BookAuthorsMetadata {
        source_db1_authors: raw_counts[0],
        source_db2_authors: raw_counts[1],
        empty_key_db1: empty_keys[0],
        empty_key_db2: empty_keys[1],
        source_db1_book_authors: link_stats[0].input_rows,
        source_db2_book_authors: link_stats[1].input_rows,
        skipped_incomplete_db1: link_stats[0].incomplete,
        skipped_incomplete_db2: link_stats[1].incomplete,
        orphaned_db1: link_stats[0].orphan,
        orphaned_db2: link_stats[1].orphan,
        enriched_db1_rows: link_stats[0].enriched,
        enriched_db2_rows: link_stats[1].enriched,
        duplicates_merged: outcome.stats.duplicates_merged,
        unique_authors: outcome.stats.unique_entities,
        id_mappings: outcome.mapping.len(),
    };
    write_metadata(&family_dir.join(METADATA_FILE), &metadata)?;

    report::info(&format!(
        "{} unique authors, {} id mappings",
        metadata.unique_authors, metadata.id_mappings
    ));
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authors_table(rows: Vec<Vec<&str>>) -> RawTable {
        RawTable::from_rows(
            "Authors",
            &AUTHORS_COLUMNS,
            rows.into_iter()
                .map(|r| r.into_iter().map(String::from).collect())
                .collect(),
        )
    }

    #[test]
    fn middle_name_folds_into_first() {
        let table = authors_table(vec![vec!["1", "John", "M.", "Smith"]]);
        let rows = source_rows(&table, SourceTag::Db1);
        assert_eq!(rows[0].display, vec!["John M.", "Smith"]);
        assert_eq!(rows[0].key, "john m.|smith");
    }

    #[test]
    fn blank_middle_leaves_no_extra_space() {
        let table = authors_table(vec![vec!["1", "John", " ", "Smith"]]);
        let rows = source_rows(&table, SourceTag::Db1);
        assert_eq!(rows[0].display[0], "John");
        assert_eq!(rows[0].key, "john|smith");
    }

    #[test]
    fn all_blank_names_have_empty_key() {
        let table = authors_table(vec![vec!["9", "", " ", ""]]);
        let rows = source_rows(&table, SourceTag::Db1);
        assert!(is_empty_key(&rows[0].key));
    }
}

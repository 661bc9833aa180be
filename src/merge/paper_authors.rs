//! Paper authors merge: deduplicate `PAuthors` by normalized name and
//! rewrite `PapersAuthors` links. The enriched link tables feed the papers
//! step, which aggregates author ids per paper.

use crate::config::MigrationConfig;
use crate::dedup::{dedup, SourceRow};
use crate::enrich::{enrich_links, EnrichStats};
use crate::error::Result;
use crate::identity::IdentityResolver;
use crate::merge::{load_source_table, write_metadata};
use crate::normalize::{clean_value, is_empty_key, join_key, normalize_value};
use crate::report;
use crate::table::{RawTable, SourceTag};
use serde::{Deserialize, Serialize};

pub const FAMILY: &str = "pauthors";
pub const FAMILY_DIR: &str = "PAUTHORS";
pub const FINAL_TABLE: &str = "PAUTHORS.csv";
pub const MAPPING_FILE: &str = "pauthor_id_mapping.csv";
pub const METADATA_FILE: &str = "pauthors_migration_metadata.csv";

pub const AUTHORS_FILE: &str = "PAuthors.csv";
pub const LINKS_FILE: &str = "PapersAuthors.csv";
const AUTHORS_COLUMNS: [&str; 3] = ["AuthorID", "FirstName", "LastName"];
const LINKS_COLUMNS: [&str; 3] = ["PapersAuthorsID", "PaperID", "AuthorID"];

#[derive(Debug, Serialize, Deserialize)]
pub struct PaperAuthorsMetadata {
    pub source_db1_pauthors: usize,
    pub source_db2_pauthors: usize,
    pub empty_key_db1: usize,
    pub empty_key_db2: usize,
    pub source_db1_papers_authors: usize,
    pub source_db2_papers_authors: usize,
    pub skipped_incomplete_db1: usize,
    pub skipped_incomplete_db2: usize,
    pub orphaned_db1: usize,
    pub orphaned_db2: usize,
    pub enriched_db1_rows: usize,
    pub enriched_db2_rows: usize,
    pub duplicates_merged: usize,
    pub unique_pauthors: usize,
    pub id_mappings: usize,
}

pub fn enriched_file(source: SourceTag) -> String {
    format!("papers_authors_enriched_{source}.csv")
}

fn source_rows(table: &RawTable, source: SourceTag) -> Vec<SourceRow> {
    let id_col = table.column("AuthorID");
    let first_col = table.column("FirstName");
    let last_col = table.column("LastName");

    table
        .rows()
        .map(|row| {
            let first = table.field(row, first_col);
            let last = table.field(row, last_col);
            let key = join_key(&[first, last]);
            let id_key = format!(
                "lastname:{}:firstname:{}",
                normalize_value(last),
                normalize_value(first)
            );
            SourceRow {
                source,
                original_id: table.field(row, id_col).trim().to_string(),
                key,
                id_key,
                display: vec![clean_value(first), clean_value(last)],
                original: vec![first.to_string(), last.to_string()],
            }
        })
        .collect()
}

pub fn run(config: &MigrationConfig) -> Result<PaperAuthorsMetadata> {
    report::section("PAUTHORS MERGE");

    let mut rows: Vec<SourceRow> = Vec::new();
    let mut raw_counts = [0usize; 2];
    let mut empty_keys = [0usize; 2];
    let mut link_tables: Vec<RawTable> = Vec::new();

    for (i, &source) in SourceTag::PRECEDENCE.iter().enumerate() {
        let pauthors = load_source_table(config, source, AUTHORS_FILE, &AUTHORS_COLUMNS)?;
        raw_counts[i] = pauthors.len();
        let source_rows = source_rows(&pauthors, source);
        empty_keys[i] = source_rows.iter().filter(|r| is_empty_key(&r.key)).count();
        rows.extend(source_rows);
        link_tables.push(load_source_table(config, source, LINKS_FILE, &LINKS_COLUMNS)?);
    }

    let resolver = IdentityResolver::new(FAMILY);
    let outcome = dedup(&resolver, rows);
    report::info(&format!(
        "Merged {} source pauthors into {} unique pauthors",
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
            &[("old_first_name", 0), ("old_last_name", 1)],
            "new_author_id",
        )?;
        enriched.table.write(&family_dir.join(enriched_file(source)))?;
        link_stats[i] = enriched.stats;
        report::info(&format!(
            "{source}: {} links enriched, {} incomplete, {} orphaned",
            enriched.stats.enriched, enriched.stats.incomplete, enriched.stats.orphan
        ));
    }

    let mut final_table =
        RawTable::new("PAUTHORS", &["author_id", "first_name", "last_name"]);
    for entity in &outcome.entities {
        final_table.push_row(vec![
            entity.canonical_id.to_string(),
            entity.display[0].clone(),
            entity.display[1].clone(),
        ]);
    }
    final_table.write(&config.paths.final_tables.join(FINAL_TABLE))?;

    let mut mapping_table = RawTable::new(
        "pauthor_id_mapping",
        &[
            "source_db",
            "old_author_id",
            "old_first_name",
            "old_last_name",
            "new_author_id",
        ],
    );
    for row in &outcome.mapping {
        mapping_table.push_row(vec![
            row.source.to_string(),
            row.original_id.clone(),
            row.original[0].clone(),
            row.original[1].clone(),
            row.canonical_id.to_string(),
        ]);
    }
    mapping_table.write(&family_dir.join(MAPPING_FILE))?;

    let metadata = PaperAuthorsMetadata {
        source_db1_pauthors: raw_counts[0],
        source_db2_pauthors: raw_counts[1],
        empty_key_db1: empty_keys[0],
        empty_key_db2: empty_keys[1],
        source_db1_papers_authors: link_stats[0].input_rows,
        source_db2_papers_authors: link_stats[1].input_rows,
        skipped_incomplete_db1: link_stats[0].incomplete,
        skipped_incomplete_db2: link_stats[1].incomplete,
        orphaned_db1: link_stats[0].orphan,
        orphaned_db2: link_stats[1].orphan,
        enriched_db1_rows: link_stats[0].enriched,
        enriched_db2_rows: link_stats[1].enriched,
        duplicates_merged: outcome.stats.duplicates_merged,
        unique_pauthors: outcome.stats.unique_entities,
        id_mappings: outcome.mapping.len(),
    };
    write_metadata(&family_dir.join(METADATA_FILE), &metadata)?;

    report::info(&format!(
        "{} unique pauthors, {} id mappings",
        metadata.unique_pauthors, metadata.id_mappings
    ));
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::dedup;

    #[test]
    fn id_content_is_normalized_name() {
        let table = RawTable::from_rows(
            "PAuthors",
            &AUTHORS_COLUMNS,
            vec![vec!["1".into(), " John ".into(), "SMITH".into()]],
        );
        let rows = source_rows(&table, SourceTag::Db1);
        assert_eq!(rows[0].id_key, "lastname:smith:firstname:john");
        assert_eq!(rows[0].display, vec!["John", "SMITH"]);
    }

    #[test]
    fn same_name_across_sources_resolves_to_same_id() {
        let db1 = RawTable::from_rows(
            "PAuthors",
            &AUTHORS_COLUMNS,
            vec![vec!["1".into(), "John".into(), "Smith".into()]],
        );
        let db2 = RawTable::from_rows(
            "PAuthors",
            &AUTHORS_COLUMNS,
            vec![vec!["88".into(), "john".into(), "smith".into()]],
        );
        let mut rows = source_rows(&db1, SourceTag::Db1);
        rows.extend(source_rows(&db2, SourceTag::Db2));

        let outcome = dedup(&IdentityResolver::new(FAMILY), rows);
        assert_eq!(outcome.stats.unique_entities, 1);
        assert_eq!(
            outcome.mapping[0].canonical_id,
            outcome.mapping[1].canonical_id
        );
    }
}

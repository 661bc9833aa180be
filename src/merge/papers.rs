//! Papers merge: deduplicate `Papers` by (normalized title, normalized
//! year), coerce boolean-like columns, and fold every group member's
//! enriched author links into one duplicate-free `authors_ids` array.
//!
//! Consumes the enriched `PapersAuthors` tables written by the paper
//! authors step; running it first is a terminal error.

use crate::config::MigrationConfig;
use crate::dedup::{dedup, DedupOutcome, SourceRow};
use crate::error::{MigrateError, Result};
use crate::fuzzy::TitleMatcher;
use crate::identity::IdentityResolver;
use crate::merge::{load_source_table, paper_authors, write_metadata};
use crate::normalize::{is_empty_key, is_missing_id, join_key, normalize_value, parse_bool};
use crate::report;
use crate::table::{RawTable, SourceTag};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;
use uuid::Uuid;

pub const FAMILY: &str = "papers";
pub const FAMILY_DIR: &str = "PAPERS";
pub const FINAL_TABLE: &str = "PAPERS.csv";
pub const MAPPING_FILE: &str = "paper_id_mapping.csv";
pub const METADATA_FILE: &str = "papers_migration_metadata.csv";

pub const PAPERS_FILE: &str = "Papers.csv";
const PAPERS_COLUMNS: [&str; 17] = [
    "PaperID",
    "CnfJ",
    "Project",
    "Topic",
    "Description",
    "Title",
    "Year",
    "SoftCopy",
    "HardCopy",
    "Link",
    "Accepted",
    "CondAccepted",
    "Submitted",
    "UndSubmission",
    "InPress",
    "FullPaper",
    "Abstract",
];

/// Output column order; `display` fields on dedup rows use the same order
/// (minus `paper_id` and `authors_ids`).
const OUTPUT_COLUMNS: [&str; 18] = [
    "paper_id",
    "title",
    "abstract",
    "description",
    "topic",
    "project",
    "year",
    "cnfj",
    "link",
    "soft_copy",
    "hard_copy",
    "full_paper",
    "accepted",
    "cond_accepted",
    "submitted",
    "und_submission",
    "in_press",
    "authors_ids",
];

/// Display-field positions holding boolean-like values.
const BOOL_FIELDS: std::ops::RangeInclusive<usize> = 8..=15;

#[derive(Debug, Serialize, Deserialize)]
pub struct PapersMetadata {
    pub source_db1_papers: usize,
    pub source_db2_papers: usize,
    pub skipped_invalid_id_db1: usize,
    pub skipped_invalid_id_db2: usize,
    pub skipped_empty_title_db1: usize,
    pub skipped_empty_title_db2: usize,
    pub valid_db1_papers: usize,
    pub valid_db2_papers: usize,
    pub duplicates_merged: usize,
    pub unique_papers: usize,
    pub id_mappings: usize,
}

/// Build dedup-ready rows from one source's Papers table, dropping rows
/// without a usable primary key. Returns the rows plus the dropped count.
fn source_rows(table: &RawTable, source: SourceTag) -> (Vec<SourceRow>, usize) {
    let id_col = table.column("PaperID");
    let title_col = table.column("Title");
    let year_col = table.column("Year");
    let display_cols: Vec<Option<usize>> = [
        "Title",
        "Abstract",
        "Description",
        "Topic",
        "Project",
        "Year",
        "CnfJ",
        "Link",
        "SoftCopy",
        "HardCopy",
        "FullPaper",
        "Accepted",
        "CondAccepted",
        "Submitted",
        "UndSubmission",
        "InPress",
    ]
    .iter()
    .map(|c| table.column(c))
    .collect();

    let mut rows = Vec::new();
    let mut skipped_invalid = 0usize;

    for row in table.rows() {
        let paper_id = table.field(row, id_col);
        if is_missing_id(paper_id) {
            skipped_invalid += 1;
            continue;
        }
        let title = table.field(row, title_col);
        let year = table.field(row, year_col);
        let key = join_key(&[title, year]);
        let id_key = format!(
            "title:{}:year:{}",
            normalize_value(title),
            normalize_value(year)
        );
        rows.push(SourceRow {
            source,
            original_id: paper_id.trim().to_string(),
            key,
            id_key,
            display: display_cols
                .iter()
                .map(|c| table.field(row, *c).to_string())
                .collect(),
            original: vec![title.to_string()],
        });
    }

    (rows, skipped_invalid)
}

/// Map old PaperID -> canonical author ids, from one source's enriched
/// PapersAuthors table. Order of first appearance is kept; duplicates are
/// folded.
fn build_author_lookup(enriched: &RawTable) -> Result<HashMap<String, Vec<String>>> {
    let paper_col = enriched.column("PaperID");
    let author_col = enriched.column("new_author_id");
    if (paper_col.is_none() || author_col.is_none()) && !enriched.is_empty() {
        return Err(MigrateError::Merge(format!(
            "{}: expected PaperID and new_author_id columns",
            enriched.name()
        )));
    }

    let mut lookup: HashMap<String, Vec<String>> = HashMap::new();
    for row in enriched.rows() {
        let paper_id = enriched.field(row, paper_col).trim();
        let author_id = enriched.field(row, author_col).trim();
        if paper_id.is_empty() || is_missing_id(author_id) {
            continue;
        }
        let authors = lookup.entry(paper_id.to_string()).or_default();
        if !authors.iter().any(|a| a == author_id) {
            authors.push(author_id.to_string());
        }
    }
    Ok(lookup)
}

/// Fold each dedup group's association ids into one ordered,
/// duplicate-free array per canonical paper. Every group member
/// contributes, not only the winner.
fn aggregate_authors(
    outcome: &DedupOutcome,
    lookups: &[HashMap<String, Vec<String>>; 2],
) -> Vec<Vec<String>> {
    let entity_index: HashMap<Uuid, usize> = outcome
        .entities
        .iter()
        .enumerate()
        .map(|(i, e)| (e.canonical_id, i))
        .collect();

    let mut authors: Vec<Vec<String>> = vec![Vec::new(); outcome.entities.len()];
    let mut seen: Vec<HashSet<String>> = vec![HashSet::new(); outcome.entities.len()];

    for row in &outcome.mapping {
        let lookup = match row.source {
            SourceTag::Db1 => &lookups[0],
            SourceTag::Db2 => &lookups[1],
        };
        let Some(&idx) = entity_index.get(&row.canonical_id) else {
            continue;
        };
        if let Some(ids) = lookup.get(row.original_id.trim()) {
            for id in ids {
                if seen[idx].insert(id.clone()) {
                    authors[idx].push(id.clone());
                }
            }
        }
    }

    authors
}

/// Render an id array as a brace-delimited list, `{}` when empty.
fn render_id_array(ids: &[String]) -> String {
    format!("{{{}}}", ids.join(","))
}

/// Report title pairs within the same year that look like the same paper
/// but did not share a dedup key. Diagnostics only.
fn report_near_duplicates(outcome: &DedupOutcome, matcher: &TitleMatcher) {
    let mut by_year: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, entity) in outcome.entities.iter().enumerate() {
        by_year
            .entry(normalize_value(&entity.display[5]))
            .or_default()
            .push(i);
    }

    for indices in by_year.values() {
        for (&a, &b) in indices.iter().tuple_combinations() {
            let title_a = &outcome.entities[a].display[0];
            let title_b = &outcome.entities[b].display[0];
            let score = matcher.score(title_a, title_b);
            if matcher.is_near_match(title_a, title_b) {
                let label = matcher.label(score);
                warn!(score, %label, "possible duplicate titles not merged");
                report::warn(&format!(
                    "Possible duplicate ({label}, {score:.2}): {title_a:?} vs {title_b:?}"
                ));
            }
        }
    }
}

pub fn run(config: &MigrationConfig) -> Result<PapersMetadata> {
    report::section("PAPERS MERGE");

    let pauthors_dir = config.family_dir(paper_authors::FAMILY_DIR);
    let mut lookups: [HashMap<String, Vec<String>>; 2] = [HashMap::new(), HashMap::new()];
    for (i, &source) in SourceTag::PRECEDENCE.iter().enumerate() {
        let path = pauthors_dir.join(paper_authors::enriched_file(source));
        if !path.exists() {
            return Err(MigrateError::Merge(format!(
                "{} not found; run the paper authors merge first",
                path.display()
            )));
        }
        let enriched = RawTable::load(&path, &format!("papers_authors_enriched ({source})"), &[])?;
        lookups[i] = build_author_lookup(&enriched)?;
    }

    let mut rows: Vec<SourceRow> = Vec::new();
    let mut raw_counts = [0usize; 2];
    let mut skipped_invalid = [0usize; 2];
    let mut empty_keys = [0usize; 2];

    for (i, &source) in SourceTag::PRECEDENCE.iter().enumerate() {
        let papers = load_source_table(config, source, PAPERS_FILE, &PAPERS_COLUMNS)?;
        raw_counts[i] = papers.len();
        let (source_rows, invalid) = source_rows(&papers, source);
        skipped_invalid[i] = invalid;
        empty_keys[i] = source_rows.iter().filter(|r| is_empty_key(&r.key)).count();
        rows.extend(source_rows);
    }

    let resolver = IdentityResolver::new(FAMILY);
    let outcome = dedup(&resolver, rows);
    let authors = aggregate_authors(&outcome, &lookups);
    report::info(&format!(
        "Merged {} papers into {} unique ({} duplicates)",
        outcome.stats.input_rows - outcome.stats.empty_key_rows,
        outcome.stats.unique_entities,
        outcome.stats.duplicates_merged
    ));

    report_near_duplicates(&outcome, &TitleMatcher::from_config(&config.fuzzy));

    let mut final_table = RawTable::new("PAPERS", &OUTPUT_COLUMNS);
    for (entity, author_ids) in outcome.entities.iter().zip(&authors) {
        let mut out = vec![entity.canonical_id.to_string()];
        for (i, value) in entity.display.iter().enumerate() {
            if BOOL_FIELDS.contains(&i) {
                out.push(parse_bool(value).to_string());
            } else {
                out.push(value.clone());
            }
        }
        out.push(render_id_array(author_ids));
        final_table.push_row(out);
    }
    final_table.write(&config.paths.final_tables.join(FINAL_TABLE))?;

    let family_dir = config.family_dir(FAMILY_DIR);
    let mut mapping_table = RawTable::new(
        "paper_id_mapping",
        &["source_db", "old_paper_id", "old_title", "new_paper_id"],
    );
    for row in &outcome.mapping {
        mapping_table.push_row(vec![
            row.source.to_string(),
            row.original_id.clone(),
            row.original[0].clone(),
            row.canonical_id.to_string(),
        ]);
    }
    mapping_table.write(&family_dir.join(MAPPING_FILE))?;

    let metadata = PapersMetadata {
        source_db1_papers: raw_counts[0],
        source_db2_papers: raw_counts[1],
        skipped_invalid_id_db1: skipped_invalid[0],
        skipped_invalid_id_db2: skipped_invalid[1],
        skipped_empty_title_db1: empty_keys[0],
        skipped_empty_title_db2: empty_keys[1],
        valid_db1_papers: raw_counts[0] - skipped_invalid[0] - empty_keys[0],
        valid_db2_papers: raw_counts[1] - skipped_invalid[1] - empty_keys[1],
        duplicates_merged: outcome.stats.duplicates_merged,
        unique_papers: outcome.stats.unique_entities,
        id_mappings: outcome.mapping.len(),
    };
    write_metadata(&family_dir.join(METADATA_FILE), &metadata)?;

    report::info(&format!(
        "{} unique papers, {} id mappings, {} duplicates merged",
        metadata.unique_papers, metadata.id_mappings, metadata.duplicates_merged
    ));
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(id: &str, title: &str, year: &str) -> Vec<String> {
        // Raw Papers.csv column order.
        let mut row = vec![String::new(); PAPERS_COLUMNS.len()];
        row[0] = id.to_string();
        row[5] = title.to_string();
        row[6] = year.to_string();
        row
    }

    fn papers_table(rows: Vec<Vec<String>>) -> RawTable {
        RawTable::from_rows("Papers", &PAPERS_COLUMNS, rows)
    }

    fn enriched_links(rows: &[(&str, &str)]) -> RawTable {
        RawTable::from_rows(
            "papers_authors_enriched",
            &["PapersAuthorsID", "PaperID", "AuthorID", "new_author_id"],
            rows.iter()
                .enumerate()
                .map(|(i, (paper, author))| {
                    vec![
                        format!("{}", i + 1),
                        paper.to_string(),
                        "x".to_string(),
                        author.to_string(),
                    ]
                })
                .collect(),
        )
    }

    #[test]
    fn duplicate_group_aggregates_authors_from_all_members() {
        // Same normalized title and year in both sources, each linked to a
        // different author; the merged array holds both, exactly once.
        let db1 = papers_table(vec![paper("10", "Deep Learning", "2020")]);
        let db2 = papers_table(vec![paper("77", "DEEP  learning", "2020")]);
        let (mut rows, _) = source_rows(&db1, SourceTag::Db1);
        let (rows2, _) = source_rows(&db2, SourceTag::Db2);
        rows.extend(rows2);

        let outcome = dedup(&IdentityResolver::new(FAMILY), rows);
        assert_eq!(outcome.stats.unique_entities, 1);

        let lookups = [
            build_author_lookup(&enriched_links(&[("10", "author-a"), ("10", "author-a")]))
                .unwrap(),
            build_author_lookup(&enriched_links(&[("77", "author-b")])).unwrap(),
        ];
        let authors = aggregate_authors(&outcome, &lookups);
        assert_eq!(authors[0], vec!["author-a", "author-b"]);
    }

    #[test]
    fn aggregation_is_independent_of_source_row_order_within_a_group() {
        let db1 = papers_table(vec![paper("10", "Deep Learning", "2020")]);
        let db2 = papers_table(vec![paper("77", "deep learning", "2020")]);
        let (mut rows, _) = source_rows(&db1, SourceTag::Db1);
        let (rows2, _) = source_rows(&db2, SourceTag::Db2);
        rows.extend(rows2);
        let outcome = dedup(&IdentityResolver::new(FAMILY), rows);

        let lookups = [
            build_author_lookup(&enriched_links(&[("10", "author-a"), ("10", "author-b")]))
                .unwrap(),
            build_author_lookup(&enriched_links(&[("77", "author-b"), ("77", "author-a")]))
                .unwrap(),
        ];
        let authors = aggregate_authors(&outcome, &lookups);
        let as_set: HashSet<_> = authors[0].iter().cloned().collect();
        assert_eq!(authors[0].len(), 2);
        assert_eq!(as_set.len(), 2);
    }

    #[test]
    fn invalid_paper_id_is_skipped_before_dedup() {
        let table = papers_table(vec![
            paper("nan", "Lost Paper", "2019"),
            paper("1", "Kept Paper", "2019"),
        ]);
        let (rows, skipped) = source_rows(&table, SourceTag::Db1);
        assert_eq!(skipped, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].original_id, "1");
    }

    #[test]
    fn id_key_uses_normalized_title_and_year() {
        let table = papers_table(vec![paper("1", " Deep  Learning ", " 2020 ")]);
        let (rows, _) = source_rows(&table, SourceTag::Db1);
        assert_eq!(rows[0].id_key, "title:deep learning:year:2020");
        assert_eq!(rows[0].key, "deep learning|2020");
    }

    #[test]
    fn id_array_rendering() {
        assert_eq!(render_id_array(&[]), "{}");
        assert_eq!(
            render_id_array(&["a".to_string(), "b".to_string()]),
            "{a,b}"
        );
    }
}

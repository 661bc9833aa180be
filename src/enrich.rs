//! Foreign-key rewriting for dependent link tables.
//!
//! Rows are classified in two stages: structurally missing keys are dropped
//! as *incomplete* before any lookup, then unmapped keys are dropped as
//! *orphan*. Everything else is enriched with the canonical id. Dropped rows
//! are counted, never silently coerced.

use crate::dedup::MappingEntry;
use crate::error::{MigrateError, Result};
use crate::normalize::is_missing_id;
use crate::table::RawTable;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub input_rows: usize,
    pub enriched: usize,
    pub incomplete: usize,
    pub orphan: usize,
}

impl EnrichStats {
    /// Every input row must be accounted for exactly once.
    pub fn reconciles(&self) -> bool {
        self.enriched + self.incomplete + self.orphan == self.input_rows
    }
}

#[derive(Debug)]
pub struct EnrichedLinks {
    pub table: RawTable,
    pub stats: EnrichStats,
}

/// Rewrite one source's link table against that source's id mapping.
///
/// The output table keeps the original columns and appends `carry_columns`
/// (each `(output name, index into the mapping entry's original fields)`)
/// followed by `new_id_column` holding the canonical id.
pub fn enrich_links(
    links: &RawTable,
    fk_column: &str,
    mapping: &HashMap<String, MappingEntry>,
    carry_columns: &[(&str, usize)],
    new_id_column: &str,
) -> Result<EnrichedLinks> {
    let fk_idx = links.column(fk_column);
    if fk_idx.is_none() && !links.is_empty() {
        return Err(MigrateError::Merge(format!(
            "{}: foreign key column {} not found",
            links.name(),
            fk_column
        )));
    }

    let mut out_columns: Vec<&str> = links.columns().iter().map(|c| c.as_str()).collect();
    out_columns.extend(carry_columns.iter().map(|(name, _)| *name));
    out_columns.push(new_id_column);
    let mut table = RawTable::new(links.name(), &out_columns);

    let mut stats = EnrichStats {
        input_rows: links.len(),
        ..Default::default()
    };

    for row in links.rows() {
        let fk = links.field(row, fk_idx);
        if is_missing_id(fk) {
            stats.incomplete += 1;
            continue;
        }
        match mapping.get(fk.trim()) {
            Some(entry) => {
                let mut out: Vec<String> = row.to_vec();
                for (_, idx) in carry_columns {
                    out.push(entry.original.get(*idx).cloned().unwrap_or_default());
                }
                out.push(entry.canonical_id.to_string());
                table.push_row(out);
                stats.enriched += 1;
            }
            None => {
                stats.orphan += 1;
            }
        }
    }

    if stats.incomplete > 0 || stats.orphan > 0 {
        warn!(
            table = links.name(),
            incomplete = stats.incomplete,
            orphan = stats.orphan,
            "dropped link rows"
        );
    }

    Ok(EnrichedLinks { table, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::{dedup, SourceRow};
    use crate::identity::IdentityResolver;
    use crate::normalize::join_key;
    use crate::table::SourceTag;

    fn mapping_for(ids_and_names: &[(&str, &str, &str)]) -> HashMap<String, MappingEntry> {
        let resolver = IdentityResolver::new("book_authors");
        let rows = ids_and_names
            .iter()
            .map(|(id, first, last)| {
                let key = join_key(&[first, last]);
                SourceRow {
                    source: SourceTag::Db1,
                    original_id: id.to_string(),
                    id_key: key.clone(),
                    key,
                    display: vec![first.to_string(), last.to_string()],
                    original: vec![first.to_string(), last.to_string()],
                }
            })
            .collect();
        dedup(&resolver, rows).id_map(SourceTag::Db1)
    }

    fn links_table(fks: &[&str]) -> RawTable {
        RawTable::from_rows(
            "BookAuthors",
            &["BookAuthorID", "BookID", "AuthorID"],
            fks.iter()
                .enumerate()
                .map(|(i, fk)| vec![format!("{}", i + 1), "10".to_string(), fk.to_string()])
                .collect(),
        )
    }

    #[test]
    fn sentinel_fk_counts_as_incomplete_not_orphan() {
        let mapping = mapping_for(&[("1", "John", "Smith")]);
        let links = links_table(&["nan"]);
        let result = enrich_links(&links, "AuthorID", &mapping, &[], "new_book_author_id").unwrap();
        assert_eq!(result.stats.incomplete, 1);
        assert_eq!(result.stats.orphan, 0);
        assert!(result.stats.reconciles());
    }

    #[test]
    fn unmapped_fk_counts_as_orphan_not_incomplete() {
        let mapping = mapping_for(&[("1", "John", "Smith")]);
        let links = links_table(&["999"]);
        let result = enrich_links(&links, "AuthorID", &mapping, &[], "new_book_author_id").unwrap();
        assert_eq!(result.stats.orphan, 1);
        assert_eq!(result.stats.incomplete, 0);
        assert!(result.stats.reconciles());
    }

    #[test]
    fn enriched_rows_carry_mapping_fields_and_id() {
        let mapping = mapping_for(&[("1", "John", "Smith")]);
        let links = links_table(&[" 1 "]);
        let result = enrich_links(
            &links,
            "AuthorID",
            &mapping,
            &[("old_first_name", 0), ("old_last_name", 1)],
            "new_book_author_id",
        )
        .unwrap();

        assert_eq!(result.stats.enriched, 1);
        let row = result.table.row(0);
        assert_eq!(row[3], "John");
        assert_eq!(row[4], "Smith");
        assert_eq!(row[5], mapping["1"].canonical_id.to_string());
    }

    #[test]
    fn all_classes_reconcile_against_input() {
        let mapping = mapping_for(&[("1", "John", "Smith"), ("2", "Ada", "Lovelace")]);
        let links = links_table(&["1", "", "999", "2", "NULL", "none"]);
        let result = enrich_links(&links, "AuthorID", &mapping, &[], "new_id").unwrap();
        let s = result.stats;
        assert_eq!(s.enriched, 2);
        assert_eq!(s.incomplete, 3);
        assert_eq!(s.orphan, 1);
        assert!(s.reconciles());
    }

    #[test]
    fn missing_fk_column_is_an_error_on_nonempty_table() {
        let mapping = mapping_for(&[("1", "John", "Smith")]);
        let links = RawTable::from_rows("Broken", &["X"], vec![vec!["1".into()]]);
        assert!(enrich_links(&links, "AuthorID", &mapping, &[], "new_id").is_err());

        let empty = RawTable::new("Empty", &["X"]);
        assert!(enrich_links(&empty, "AuthorID", &mapping, &[], "new_id").is_ok());
    }
}

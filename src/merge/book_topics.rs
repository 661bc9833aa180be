//! Book topics merge: deduplicate `Topic` by normalized topic name and
//! rewrite `BookTopic` links.

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

pub const FAMILY: &str = "book_topics";
pub const FAMILY_DIR: &str = "BOOK_TOPIC";
pub const FINAL_TABLE: &str = "BOOK_TOPIC.csv";
pub const MAPPING_FILE: &str = "topic_id_mapping.csv";
pub const METADATA_FILE: &str = "book_topic_migration_metadata.csv";

pub const TOPICS_FILE: &str = "Topic.csv";
pub const LINKS_FILE: &str = "BookTopic.csv";
const TOPICS_COLUMNS: [&str; 2] = ["TopicID", "Topic"];
const LINKS_COLUMNS: [&str; 3] = ["BookTopicID", "TopicID", "BookID"];

#[derive(Debug, Serialize, Deserialize)]
pub struct BookTopicsMetadata {
    pub source_db1_topics: usize,
    pub source_db2_topics: usize,
    pub empty_key_db1: usize,
    pub empty_key_db2: usize,
    pub source_db1_book_topics: usize,
    pub source_db2_book_topics: usize,
    pub skipped_incomplete_db1: usize,
    pub skipped_incomplete_db2: usize,
    pub orphaned_db1: usize,
    pub orphaned_db2: usize,
    pub enriched_db1_rows: usize,
    pub enriched_db2_rows: usize,
    pub duplicates_merged: usize,
    pub unique_topics: usize,
    pub id_mappings: usize,
}

pub fn enriched_file(source: SourceTag) -> String {
    format!("book_topic_enriched_{source}.csv")
}

/// The first occurrence in precedence order keeps its original casing in
/// the final table.
fn source_rows(table: &RawTable, source: SourceTag) -> Vec<SourceRow> {
    let id_col = table.column("TopicID");
    let topic_col = table.column("Topic");

    table
        .rows()
        .map(|row| {
            let topic = table.field(row, topic_col);
            let key = join_key(&[topic]);
            SourceRow {
                source,
                original_id: table.field(row, id_col).trim().to_string(),
                id_key: key.clone(),
                key,
                display: vec![clean_value(topic)],
                original: vec![topic.to_string()],
            }
        })
        .collect()
}

pub fn run(config: &MigrationConfig) -> Result<BookTopicsMetadata> {
    report::section("BOOK TOPIC MERGE");

    let mut rows: Vec<SourceRow> = Vec::new();
    let mut raw_counts = [0usize; 2];
    let mut empty_keys = [0usize; 2];
    let mut link_tables: Vec<RawTable> = Vec::new();

    for (i, &source) in SourceTag::PRECEDENCE.iter().enumerate() {
        let topics = load_source_table(config, source, TOPICS_FILE, &TOPICS_COLUMNS)?;
        raw_counts[i] = topics.len();
        let source_rows = source_rows(&topics, source);
        empty_keys[i] = source_rows.iter().filter(|r| is_empty_key(&r.key)).count();
        rows.extend(source_rows);
        link_tables.push(load_source_table(config, source, LINKS_FILE, &LINKS_COLUMNS)?);
    }

    let resolver = IdentityResolver::new(FAMILY);
    let outcome = dedup(&resolver, rows);
    report::info(&format!(
        "Merged {} source topics into {} unique topics",
        outcome.stats.input_rows - outcome.stats.empty_key_rows,
        outcome.stats.unique_entities
    ));

    let family_dir = config.family_dir(FAMILY_DIR);
    let mut link_stats = [EnrichStats::default(); 2];

    for (i, &source) in SourceTag::PRECEDENCE.iter().enumerate() {
        let enriched = enrich_links(
            &link_tables[i],
            "TopicID",
            &outcome.id_map(source),
            &[("topic_name", 0)],
            "new_book_topic_id",
        )?;
        enriched.table.write(&family_dir.join(enriched_file(source)))?;
        link_stats[i] = enriched.stats;
        report::info(&format!(
            "{source}: {} links enriched, {} incomplete, {} orphaned",
            enriched.stats.enriched, enriched.stats.incomplete, enriched.stats.orphan
        ));
    }

    let mut final_table = RawTable::new("BOOK_TOPIC", &["book_topic_id", "topic_name"]);
    for entity in &outcome.entities {
        final_table.push_row(vec![
            entity.canonical_id.to_string(),
            entity.display[0].clone(),
        ]);
    }
    final_table.write(&config.paths.final_tables.join(FINAL_TABLE))?;

    let mut mapping_table = RawTable::new(
        "topic_id_mapping",
        &[
            "source_db",
            "old_topic_id",
            "old_topic_name",
            "new_book_topic_id",
        ],
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

    let metadata = BookTopicsMetadata {
        source_db1_topics: raw_counts[0],
        source_db2_topics: raw_counts[1],
        empty_key_db1: empty_keys[0],
        empty_key_db2: empty_keys[1],
        source_db1_book_topics: link_stats[0].input_rows,
        source_db2_book_topics: link_stats[1].input_rows,
        skipped_incomplete_db1: link_stats[0].incomplete,
        skipped_incomplete_db2: link_stats[1].incomplete,
        orphaned_db1: link_stats[0].orphan,
        orphaned_db2: link_stats[1].orphan,
        enriched_db1_rows: link_stats[0].enriched,
        enriched_db2_rows: link_stats[1].enriched,
        duplicates_merged: outcome.stats.duplicates_merged,
        unique_topics: outcome.stats.unique_entities,
        id_mappings: outcome.mapping.len(),
    };
    write_metadata(&family_dir.join(METADATA_FILE), &metadata)?;

    report::info(&format!(
        "{} unique topics, {} id mappings",
        metadata.unique_topics, metadata.id_mappings
    ));
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::dedup;

    #[test]
    fn first_seen_casing_wins() {
        let db1 = RawTable::from_rows(
            "Topic",
            &TOPICS_COLUMNS,
            vec![vec!["1".into(), "Machine Learning".into()]],
        );
        let db2 = RawTable::from_rows(
            "Topic",
            &TOPICS_COLUMNS,
            vec![vec!["7".into(), "machine  learning".into()]],
        );
        let mut rows = source_rows(&db1, SourceTag::Db1);
        rows.extend(source_rows(&db2, SourceTag::Db2));

        let outcome = dedup(&IdentityResolver::new(FAMILY), rows);
        assert_eq!(outcome.stats.unique_entities, 1);
        assert_eq!(outcome.entities[0].display[0], "Machine Learning");
        assert_eq!(outcome.mapping.len(), 2);
    }

    #[test]
    fn blank_topic_is_excluded() {
        let table = RawTable::from_rows(
            "Topic",
            &TOPICS_COLUMNS,
            vec![vec!["1".into(), "  ".into()]],
        );
        let rows = source_rows(&table, SourceTag::Db1);
        assert!(is_empty_key(&rows[0].key));
    }
}

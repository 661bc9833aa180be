//! Deduplication of precedence-ordered source rows into canonical entities.

use crate::identity::IdentityResolver;
use crate::normalize::is_empty_key;
use crate::table::SourceTag;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// One raw source row, prepared for dedup by the per-entity merge step.
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub source: SourceTag,
    pub original_id: String,
    /// Canonical key used for grouping. May be the empty marker.
    pub key: String,
    /// Content key fed to the identity resolver when this row wins its
    /// group. Blank content falls back to (source, original id).
    pub id_key: String,
    /// Display fields carried onto the canonical entity if this row wins.
    pub display: Vec<String>,
    /// Original field values carried onto this row's mapping entry.
    pub original: Vec<String>,
}

/// One deduplicated canonical representative.
#[derive(Debug, Clone)]
pub struct CanonicalEntity {
    pub canonical_id: Uuid,
    pub key: String,
    pub display: Vec<String>,
}

/// One old-id to canonical-id mapping entry. Emitted for every accepted
/// row, not only group winners.
#[derive(Debug, Clone)]
pub struct MappingRow {
    pub source: SourceTag,
    pub original_id: String,
    pub original: Vec<String>,
    pub canonical_id: Uuid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// Rows seen across both sources, before any exclusion.
    pub input_rows: usize,
    /// Rows excluded because their canonical key carries no identity.
    pub empty_key_rows: usize,
    /// Distinct canonical entities produced.
    pub unique_entities: usize,
    /// Accepted rows collapsed into an existing group.
    pub duplicates_merged: usize,
}

/// Entry of a per-source id lookup built from the mapping.
#[derive(Debug, Clone)]
pub struct MappingEntry {
    pub canonical_id: Uuid,
    pub original: Vec<String>,
}

#[derive(Debug)]
pub struct DedupOutcome {
    pub entities: Vec<CanonicalEntity>,
    pub mapping: Vec<MappingRow>,
    pub stats: DedupStats,
}

impl DedupOutcome {
    /// Hash-join side for link enrichment: original id -> canonical id plus
    /// the original display fields, for one source.
    pub fn id_map(&self, source: SourceTag) -> HashMap<String, MappingEntry> {
        let mut map = HashMap::new();
        for row in self.mapping.iter().filter(|m| m.source == source) {
            map.entry(row.original_id.trim().to_string())
                .or_insert_with(|| MappingEntry {
                    canonical_id: row.canonical_id,
                    original: row.original.clone(),
                });
        }
        map
    }

    pub fn canonical_ids(&self) -> Vec<Uuid> {
        self.entities.iter().map(|e| e.canonical_id).collect()
    }
}

/// Collapse rows into canonical entities.
///
/// `rows` must already be concatenated in source precedence order (all db1
/// rows before all db2 rows); the first accepted member of each key group
/// becomes the winner and supplies the display fields and the id content.
pub fn dedup(resolver: &IdentityResolver, rows: Vec<SourceRow>) -> DedupOutcome {
    let mut entities: Vec<CanonicalEntity> = Vec::new();
    let mut mapping: Vec<MappingRow> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut stats = DedupStats::default();

    for row in rows {
        stats.input_rows += 1;
        if is_empty_key(&row.key) {
            stats.empty_key_rows += 1;
            continue;
        }

        let entity_idx = match by_key.get(&row.key) {
            Some(&idx) => {
                stats.duplicates_merged += 1;
                idx
            }
            None => {
                let canonical_id =
                    resolver.resolve_entity(&row.id_key, row.source, &row.original_id);
                entities.push(CanonicalEntity {
                    canonical_id,
                    key: row.key.clone(),
                    display: row.display.clone(),
                });
                by_key.insert(row.key.clone(), entities.len() - 1);
                entities.len() - 1
            }
        };

        mapping.push(MappingRow {
            source: row.source,
            original_id: row.original_id,
            original: row.original,
            canonical_id: entities[entity_idx].canonical_id,
        });
    }

    stats.unique_entities = entities.len();
    debug!(
        input = stats.input_rows,
        empty_key = stats.empty_key_rows,
        unique = stats.unique_entities,
        "dedup complete"
    );

    DedupOutcome {
        entities,
        mapping,
        stats,
    }
}

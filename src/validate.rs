//! Independent integrity validation of migration outputs.
//!
//! The validator recomputes expected canonical keys straight from the raw
//! source tables, without going through the dedup code path, then checks
//! the produced artifacts against them. It is read-only: it reports, it
//! never repairs.

use crate::config::MigrationConfig;
use crate::error::{MigrateError, Result};
use crate::merge::{book_authors, book_topics, paper_authors, papers, read_metadata};
use crate::normalize::{clean_value, is_empty_key, is_missing_id, join_key};
use crate::report;
use crate::table::{RawTable, SourceTag};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct FamilyReport {
    pub family: String,
    pub checks: Vec<CheckResult>,
    pub warnings: Vec<String>,
}

impl FamilyReport {
    fn new(family: &str) -> Self {
        Self {
            family: family.to_string(),
            ..Default::default()
        }
    }

    fn check(&mut self, name: &str, passed: bool, detail: String) {
        if passed {
            report::pass(&format!("{name}: {detail}"));
        } else {
            report::fail(&format!("{name}: {detail}"));
        }
        self.checks.push(CheckResult {
            name: name.to_string(),
            passed,
            detail,
        });
    }

    fn warn(&mut self, message: String) {
        report::warn(&message);
        self.warnings.push(message);
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub families: Vec<FamilyReport>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.families.iter().all(|f| f.passed())
    }

    pub fn counts(&self) -> (usize, usize) {
        let passed = self
            .families
            .iter()
            .flat_map(|f| &f.checks)
            .filter(|c| c.passed)
            .count();
        let failed = self
            .families
            .iter()
            .flat_map(|f| &f.checks)
            .filter(|c| !c.passed)
            .count();
        (passed, failed)
    }
}

/// Everything checks 1-4 need for one entity family.
struct EntityArtifacts {
    expected_keys: HashSet<String>,
    accepted_ids: HashMap<SourceTag, HashSet<String>>,
    produced_keys: Vec<String>,
    produced_ids: Vec<String>,
    mapping_ids: HashMap<SourceTag, HashSet<String>>,
    mapping_new_ids: HashSet<String>,
}

pub struct IntegrityValidator<'a> {
    config: &'a MigrationConfig,
}

impl<'a> IntegrityValidator<'a> {
    pub fn new(config: &'a MigrationConfig) -> Self {
        Self { config }
    }

    pub fn validate_all(&self) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        report.families.push(self.validate_book_authors()?);
        report.families.push(self.validate_book_topics()?);
        report.families.push(self.validate_paper_authors()?);
        report.families.push(self.validate_papers()?);
        Ok(report)
    }

    fn raw_table(&self, source: SourceTag, file_name: &str) -> Result<RawTable> {
        let path = self.config.source_dir(source).join(file_name);
        RawTable::load(&path, &format!("{file_name} ({source})"), &[])
    }

    pub fn validate_book_authors(&self) -> Result<FamilyReport> {
        report::section("VALIDATING BOOK AUTHORS MIGRATION");
        let mut fam = FamilyReport::new(book_authors::FAMILY);
        let dir = self.config.family_dir(book_authors::FAMILY_DIR);

        let final_table =
            require_table(&self.config.paths.final_tables.join(book_authors::FINAL_TABLE))?;
        let mapping = require_table(&dir.join(book_authors::MAPPING_FILE))?;
        let meta: book_authors::BookAuthorsMetadata =
            read_metadata(&dir.join(book_authors::METADATA_FILE))?;

        let mut expected_keys = HashSet::new();
        let mut accepted_ids: HashMap<SourceTag, HashSet<String>> = HashMap::new();
        for source in SourceTag::PRECEDENCE {
            let raw = self.raw_table(source, book_authors::AUTHORS_FILE)?;
            let id_col = raw.column("AuthorID");
            let f_col = raw.column("FirstName");
            let m_col = raw.column("MiddleName");
            let l_col = raw.column("LastName");
            for row in raw.rows() {
                let combined = clean_value(&format!(
                    "{} {}",
                    raw.field(row, f_col),
                    raw.field(row, m_col)
                ));
                let key = join_key(&[&combined, raw.field(row, l_col)]);
                if is_empty_key(&key) {
                    continue;
                }
                expected_keys.insert(key);
                accepted_ids
                    .entry(source)
                    .or_default()
                    .insert(raw.field(row, id_col).trim().to_string());
            }
        }

        let artifacts = EntityArtifacts {
            expected_keys,
            accepted_ids,
            produced_keys: produced_keys(&final_table, &["first_name", "last_name"]),
            produced_ids: column_values(&final_table, "book_author_id"),
            mapping_ids: mapping_ids_by_source(&mapping, "old_author_id"),
            mapping_new_ids: mapping_new_ids(&mapping, "new_book_author_id"),
        };
        entity_checks(&mut fam, &artifacts);

        fam.check(
            "counts",
            final_table.len() == meta.unique_authors && mapping.len() == meta.id_mappings,
            format!(
                "{} canonical rows (metadata {}), {} mapping rows (metadata {})",
                final_table.len(),
                meta.unique_authors,
                mapping.len(),
                meta.id_mappings
            ),
        );

        self.link_reconciliation(
            &mut fam,
            book_authors::LINKS_FILE,
            &dir,
            &book_authors::enriched_file(SourceTag::Db1),
            &book_authors::enriched_file(SourceTag::Db2),
            [meta.skipped_incomplete_db1, meta.skipped_incomplete_db2],
            [meta.orphaned_db1, meta.orphaned_db2],
        )?;

        Ok(fam)
    }

    pub fn validate_book_topics(&self) -> Result<FamilyReport> {
        report::section("VALIDATING BOOK TOPIC MIGRATION");
        let mut fam = FamilyReport::new(book_topics::FAMILY);
        let dir = self.config.family_dir(book_topics::FAMILY_DIR);

        let final_table =
            require_table(&self.config.paths.final_tables.join(book_topics::FINAL_TABLE))?;
        let mapping = require_table(&dir.join(book_topics::MAPPING_FILE))?;
        let meta: book_topics::BookTopicsMetadata =
            read_metadata(&dir.join(book_topics::METADATA_FILE))?;

        let mut expected_keys = HashSet::new();
        let mut accepted_ids: HashMap<SourceTag, HashSet<String>> = HashMap::new();
        for source in SourceTag::PRECEDENCE {
            let raw = self.raw_table(source, book_topics::TOPICS_FILE)?;
            let id_col = raw.column("TopicID");
            let topic_col = raw.column("Topic");
            for row in raw.rows() {
                let key = join_key(&[raw.field(row, topic_col)]);
                if is_empty_key(&key) {
                    continue;
                }
                expected_keys.insert(key);
                accepted_ids
                    .entry(source)
                    .or_default()
                    .insert(raw.field(row, id_col).trim().to_string());
            }
        }

        let artifacts = EntityArtifacts {
            expected_keys,
            accepted_ids,
            produced_keys: produced_keys(&final_table, &["topic_name"]),
            produced_ids: column_values(&final_table, "book_topic_id"),
            mapping_ids: mapping_ids_by_source(&mapping, "old_topic_id"),
            mapping_new_ids: mapping_new_ids(&mapping, "new_book_topic_id"),
        };
        entity_checks(&mut fam, &artifacts);

        fam.check(
            "counts",
            final_table.len() == meta.unique_topics && mapping.len() == meta.id_mappings,
            format!(
                "{} canonical rows (metadata {}), {} mapping rows (metadata {})",
                final_table.len(),
                meta.unique_topics,
                mapping.len(),
                meta.id_mappings
            ),
        );

        self.link_reconciliation(
            &mut fam,
            book_topics::LINKS_FILE,
            &dir,
            &book_topics::enriched_file(SourceTag::Db1),
            &book_topics::enriched_file(SourceTag::Db2),
            [meta.skipped_incomplete_db1, meta.skipped_incomplete_db2],
            [meta.orphaned_db1, meta.orphaned_db2],
        )?;

        Ok(fam)
    }

    pub fn validate_paper_authors(&self) -> Result<FamilyReport> {
        report::section("VALIDATING PAUTHORS MIGRATION");
        let mut fam = FamilyReport::new(paper_authors::FAMILY);
        let dir = self.config.family_dir(paper_authors::FAMILY_DIR);

        let final_table =
            require_table(&self.config.paths.final_tables.join(paper_authors::FINAL_TABLE))?;
        let mapping = require_table(&dir.join(paper_authors::MAPPING_FILE))?;
        let meta: paper_authors::PaperAuthorsMetadata =
            read_metadata(&dir.join(paper_authors::METADATA_FILE))?;

        let mut expected_keys = HashSet::new();
        let mut accepted_ids: HashMap<SourceTag, HashSet<String>> = HashMap::new();
        for source in SourceTag::PRECEDENCE {
            let raw = self.raw_table(source, paper_authors::AUTHORS_FILE)?;
            let id_col = raw.column("AuthorID");
            let f_col = raw.column("FirstName");
            let l_col = raw.column("LastName");
            for row in raw.rows() {
                let key = join_key(&[raw.field(row, f_col), raw.field(row, l_col)]);
                if is_empty_key(&key) {
                    continue;
                }
                expected_keys.insert(key);
                accepted_ids
                    .entry(source)
                    .or_default()
                    .insert(raw.field(row, id_col).trim().to_string());
            }
        }

        let artifacts = EntityArtifacts {
            expected_keys,
            accepted_ids,
            produced_keys: produced_keys(&final_table, &["first_name", "last_name"]),
            produced_ids: column_values(&final_table, "author_id"),
            mapping_ids: mapping_ids_by_source(&mapping, "old_author_id"),
            mapping_new_ids: mapping_new_ids(&mapping, "new_author_id"),
        };
        entity_checks(&mut fam, &artifacts);

        fam.check(
            "counts",
            final_table.len() == meta.unique_pauthors && mapping.len() == meta.id_mappings,
            format!(
                "{} canonical rows (metadata {}), {} mapping rows (metadata {})",
                final_table.len(),
                meta.unique_pauthors,
                mapping.len(),
                meta.id_mappings
            ),
        );

        self.link_reconciliation(
            &mut fam,
            paper_authors::LINKS_FILE,
            &dir,
            &paper_authors::enriched_file(SourceTag::Db1),
            &paper_authors::enriched_file(SourceTag::Db2),
            [meta.skipped_incomplete_db1, meta.skipped_incomplete_db2],
            [meta.orphaned_db1, meta.orphaned_db2],
        )?;

        Ok(fam)
    }

    pub fn validate_papers(&self) -> Result<FamilyReport> {
        report::section("VALIDATING PAPERS MIGRATION");
        let mut fam = FamilyReport::new(papers::FAMILY);
        let dir = self.config.family_dir(papers::FAMILY_DIR);

        let final_table =
            require_table(&self.config.paths.final_tables.join(papers::FINAL_TABLE))?;
        let mapping = require_table(&dir.join(papers::MAPPING_FILE))?;
        let meta: papers::PapersMetadata = read_metadata(&dir.join(papers::METADATA_FILE))?;

        let mut expected_keys = HashSet::new();
        let mut accepted_ids: HashMap<SourceTag, HashSet<String>> = HashMap::new();
        for source in SourceTag::PRECEDENCE {
            let raw = self.raw_table(source, papers::PAPERS_FILE)?;
            let id_col = raw.column("PaperID");
            let title_col = raw.column("Title");
            let year_col = raw.column("Year");
            for row in raw.rows() {
                let paper_id = raw.field(row, id_col);
                if is_missing_id(paper_id) {
                    continue;
                }
                let key = join_key(&[raw.field(row, title_col), raw.field(row, year_col)]);
                if is_empty_key(&key) {
                    continue;
                }
                expected_keys.insert(key);
                accepted_ids
                    .entry(source)
                    .or_default()
                    .insert(paper_id.trim().to_string());
            }
        }

        let artifacts = EntityArtifacts {
            expected_keys,
            accepted_ids,
            produced_keys: produced_keys(&final_table, &["title", "year"]),
            produced_ids: column_values(&final_table, "paper_id"),
            mapping_ids: mapping_ids_by_source(&mapping, "old_paper_id"),
            mapping_new_ids: mapping_new_ids(&mapping, "new_paper_id"),
        };
        entity_checks(&mut fam, &artifacts);

        fam.check(
            "counts",
            final_table.len() == meta.unique_papers
                && mapping.len() == meta.id_mappings
                && meta.valid_db1_papers + meta.valid_db2_papers
                    == meta.unique_papers + meta.duplicates_merged,
            format!(
                "{} + {} valid = {} unique + {} duplicates; {} mapping rows (metadata {})",
                meta.valid_db1_papers,
                meta.valid_db2_papers,
                meta.unique_papers,
                meta.duplicates_merged,
                mapping.len(),
                meta.id_mappings
            ),
        );

        self.check_author_references(&mut fam, &final_table)?;
        check_boolean_fields(&mut fam, &final_table);

        Ok(fam)
    }

    /// Checks that every id inside `authors_ids` exists in the merged
    /// PAUTHORS table.
    fn check_author_references(&self, fam: &mut FamilyReport, final_table: &RawTable) -> Result<()> {
        let pauthors =
            require_table(&self.config.paths.final_tables.join(paper_authors::FINAL_TABLE))?;
        let known: HashSet<String> = column_values(&pauthors, "author_id").into_iter().collect();

        let col = final_table.column("authors_ids");
        let mut referenced: Vec<String> = Vec::new();
        for row in final_table.rows() {
            let cell = final_table.field(row, col);
            let inner = cell.trim().trim_start_matches('{').trim_end_matches('}');
            if inner.is_empty() {
                continue;
            }
            referenced.extend(inner.split(',').map(|s| s.trim().to_string()));
        }

        let invalid: Vec<&String> = referenced.iter().filter(|id| !known.contains(*id)).collect();
        fam.check(
            "author references",
            invalid.is_empty(),
            if invalid.is_empty() {
                format!("all {} referenced author ids exist in PAUTHORS", referenced.len())
            } else {
                format!(
                    "{} unknown author ids, first: {:?}",
                    invalid.len(),
                    invalid.iter().take(5).collect::<Vec<_>>()
                )
            },
        );
        Ok(())
    }

    /// Check 5: `enriched + incomplete + orphan == original_row_count`,
    /// per source, against the actual raw and enriched files.
    #[allow(clippy::too_many_arguments)]
    fn link_reconciliation(
        &self,
        fam: &mut FamilyReport,
        links_file: &str,
        dir: &Path,
        enriched_db1: &str,
        enriched_db2: &str,
        incomplete: [usize; 2],
        orphaned: [usize; 2],
    ) -> Result<()> {
        let enriched_files = [enriched_db1, enriched_db2];
        for (i, source) in SourceTag::PRECEDENCE.into_iter().enumerate() {
            let raw = self.raw_table(source, links_file)?;
            let enriched = require_table(&dir.join(enriched_files[i]))?;
            let accounted = enriched.len() + incomplete[i] + orphaned[i];
            fam.check(
                &format!("link reconciliation ({source})"),
                accounted == raw.len(),
                format!(
                    "{} enriched + {} incomplete + {} orphaned = {} of {} source rows",
                    enriched.len(),
                    incomplete[i],
                    orphaned[i],
                    accounted,
                    raw.len()
                ),
            );
        }
        Ok(())
    }
}

/// Load a produced artifact; unlike source tables, a missing output file
/// is a validation error, not an empty table.
fn require_table(path: &Path) -> Result<RawTable> {
    if !path.exists() {
        return Err(MigrateError::Validation(format!(
            "missing output file {}",
            path.display()
        )));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let table = RawTable::load(path, &name, &[])?;
    info!("Loaded {} rows from {}", table.len(), name);
    Ok(table)
}

fn column_values(table: &RawTable, column: &str) -> Vec<String> {
    let col = table.column(column);
    table
        .rows()
        .map(|row| table.field(row, col).trim().to_string())
        .collect()
}

/// Recompute canonical keys from a produced final table's display columns.
fn produced_keys(table: &RawTable, columns: &[&str]) -> Vec<String> {
    let cols: Vec<Option<usize>> = columns.iter().map(|c| table.column(c)).collect();
    table
        .rows()
        .map(|row| {
            let parts: Vec<&str> = cols.iter().map(|c| table.field(row, *c)).collect();
            join_key(&parts)
        })
        .collect()
}

fn mapping_ids_by_source(mapping: &RawTable, old_id_column: &str) -> HashMap<SourceTag, HashSet<String>> {
    let source_col = mapping.column("source_db");
    let id_col = mapping.column(old_id_column);
    let mut out: HashMap<SourceTag, HashSet<String>> = HashMap::new();
    for row in mapping.rows() {
        let source = match mapping.field(row, source_col).trim() {
            "db1" => SourceTag::Db1,
            "db2" => SourceTag::Db2,
            _ => continue,
        };
        out.entry(source)
            .or_default()
            .insert(mapping.field(row, id_col).trim().to_string());
    }
    out
}

fn mapping_new_ids(mapping: &RawTable, new_id_column: &str) -> HashSet<String> {
    let col = mapping.column(new_id_column);
    mapping
        .rows()
        .map(|row| mapping.field(row, col).trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Checks 1-4: no loss, no un-mapped originals, no dangling mapping
/// targets, no duplicate ids or keys.
fn entity_checks(fam: &mut FamilyReport, artifacts: &EntityArtifacts) {
    let produced_key_set: HashSet<&String> = artifacts.produced_keys.iter().collect();
    let missing: Vec<&String> = artifacts
        .expected_keys
        .iter()
        .filter(|k| !produced_key_set.contains(*k))
        .collect();
    fam.check(
        "entity preservation",
        missing.is_empty(),
        if missing.is_empty() {
            format!(
                "all {} source keys present in {} canonical rows",
                artifacts.expected_keys.len(),
                artifacts.produced_keys.len()
            )
        } else {
            format!(
                "{} source keys missing, first: {:?}",
                missing.len(),
                missing.iter().take(5).collect::<Vec<_>>()
            )
        },
    );

    let untraceable: Vec<&&String> = produced_key_set
        .iter()
        .filter(|k| !artifacts.expected_keys.contains(**k))
        .collect();
    if !untraceable.is_empty() {
        fam.warn(format!(
            "{} canonical entities untraceable to any source row, first: {:?}",
            untraceable.len(),
            untraceable.iter().take(5).collect::<Vec<_>>()
        ));
    }

    for source in SourceTag::PRECEDENCE {
        let accepted = artifacts.accepted_ids.get(&source).cloned().unwrap_or_default();
        let mapped = artifacts.mapping_ids.get(&source).cloned().unwrap_or_default();
        let unmapped: Vec<&String> = accepted.iter().filter(|id| !mapped.contains(*id)).collect();
        fam.check(
            &format!("mapping completeness ({source})"),
            unmapped.is_empty(),
            if unmapped.is_empty() {
                format!("all {} accepted ids mapped", accepted.len())
            } else {
                format!(
                    "{} ids unmapped, first: {:?}",
                    unmapped.len(),
                    unmapped.iter().take(5).collect::<Vec<_>>()
                )
            },
        );
    }

    let produced_id_set: HashSet<&String> = artifacts.produced_ids.iter().collect();
    let dangling: Vec<&String> = artifacts
        .mapping_new_ids
        .iter()
        .filter(|id| !produced_id_set.contains(*id))
        .collect();
    fam.check(
        "mapping targets",
        dangling.is_empty(),
        if dangling.is_empty() {
            format!(
                "all {} mapped canonical ids exist",
                artifacts.mapping_new_ids.len()
            )
        } else {
            format!(
                "{} dangling canonical ids, first: {:?}",
                dangling.len(),
                dangling.iter().take(5).collect::<Vec<_>>()
            )
        },
    );

    let unique_ids: HashSet<&String> = artifacts.produced_ids.iter().collect();
    let unique_keys: HashSet<&String> = artifacts.produced_keys.iter().collect();
    fam.check(
        "no duplicates",
        unique_ids.len() == artifacts.produced_ids.len()
            && unique_keys.len() == artifacts.produced_keys.len(),
        format!(
            "{} rows, {} distinct ids, {} distinct keys",
            artifacts.produced_ids.len(),
            unique_ids.len(),
            unique_keys.len()
        ),
    );
}

/// Boolean output columns may only hold "true" or "false".
fn check_boolean_fields(fam: &mut FamilyReport, final_table: &RawTable) {
    let bool_columns = [
        "soft_copy",
        "hard_copy",
        "full_paper",
        "accepted",
        "cond_accepted",
        "submitted",
        "und_submission",
        "in_press",
    ];
    let mut bad: Vec<String> = Vec::new();
    for column in bool_columns {
        let col = final_table.column(column);
        for row in final_table.rows() {
            let value = final_table.field(row, col);
            if value != "true" && value != "false" {
                bad.push(format!("{column}={value}"));
            }
        }
    }
    fam.check(
        "boolean fields",
        bad.is_empty(),
        if bad.is_empty() {
            "all boolean columns hold true/false".to_string()
        } else {
            format!("{} invalid values, first: {:?}", bad.len(), &bad[..bad.len().min(5)])
        },
    );
}

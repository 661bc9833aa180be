use crate::error::{MigrateError, Result};
use crate::table::SourceTag;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Process configuration, loaded once at startup and passed by the caller
/// into every pipeline constructor. The engine holds no global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub paths: PathsConfig,
    #[serde(default)]
    pub fuzzy: FuzzyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the first source database's CSV exports.
    pub db1: PathBuf,
    /// Directory holding the second source database's CSV exports.
    pub db2: PathBuf,
    /// Output directory for the merged final tables.
    pub final_tables: PathBuf,
    /// Output directory for mappings, enriched links and migration metadata.
    pub metadata: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyConfig {
    /// Minimum similarity (0.0-1.0) for reporting two titles as a near match.
    pub score_threshold: f64,
    /// Similarity at or above which a near match is labeled high confidence.
    pub high_confidence: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.85,
            high_confidence: 0.95,
        }
    }
}

impl MigrationConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: MigrationConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Source database directory for a given source tag.
    pub fn source_dir(&self, source: SourceTag) -> &Path {
        match source {
            SourceTag::Db1 => &self.paths.db1,
            SourceTag::Db2 => &self.paths.db2,
        }
    }

    /// Metadata subdirectory for one entity family, e.g. `PAUTHORS`.
    pub fn family_dir(&self, family: &str) -> PathBuf {
        self.paths.metadata.join(family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_json() {
        let json = r#"{
            "paths": {
                "db1": "data/db1",
                "db2": "data/db2",
                "final_tables": "out/final",
                "metadata": "out/meta"
            },
            "fuzzy": { "score_threshold": 0.8, "high_confidence": 0.9 }
        }"#;
        let config: MigrationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.paths.db1, PathBuf::from("data/db1"));
        assert_eq!(config.fuzzy.score_threshold, 0.8);
    }

    #[test]
    fn fuzzy_section_is_optional() {
        let json = r#"{
            "paths": {
                "db1": "a", "db2": "b",
                "final_tables": "c", "metadata": "d"
            }
        }"#;
        let config: MigrationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.fuzzy.score_threshold, 0.85);
        assert_eq!(config.fuzzy.high_confidence, 0.95);
    }
}

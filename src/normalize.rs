//! Field normalization used to build canonical dedup keys.

/// Separator between the components of a canonical key.
pub const KEY_SEPARATOR: &str = "|";

/// Foreign-key values that count as structurally missing, checked
/// case-insensitively before any mapping lookup is attempted.
const MISSING_SENTINELS: [&str; 3] = ["nan", "none", "null"];

/// Normalize a value for key comparison: trim, fold internal whitespace
/// runs (including embedded newlines) to a single space, lowercase.
pub fn normalize_value(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Clean a value for display output: trim and fold whitespace, but keep
/// the original casing.
pub fn clean_value(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build a canonical key by normalizing each component and joining them
/// with the fixed separator, in the given order.
pub fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| normalize_value(p))
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// A key whose components are all empty carries no identity.
pub fn is_empty_key(key: &str) -> bool {
    key.split(KEY_SEPARATOR).all(|part| part.is_empty())
}

/// Whether a foreign-key cell is missing: empty after trimming, or one of
/// the sentinel spellings left behind by the source exports.
pub fn is_missing_id(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty()
        || MISSING_SENTINELS
            .iter()
            .any(|s| trimmed.eq_ignore_ascii_case(s))
}

/// Coerce a boolean-like source cell. The exports spell truth several
/// ways; everything else (including empty) is false.
pub fn parse_bool(raw: &str) -> bool {
    let trimmed = raw.trim();
    ["1", "true", "yes", "-1"]
        .iter()
        .any(|t| trimmed.eq_ignore_ascii_case(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_whitespace_and_case() {
        assert_eq!(normalize_value("  John\r\n  SMITH "), "john smith");
        assert_eq!(normalize_value(""), "");
        assert_eq!(normalize_value("   "), "");
    }

    #[test]
    fn clean_keeps_case() {
        assert_eq!(clean_value(" John   M. "), "John M.");
    }

    #[test]
    fn key_joins_in_order() {
        assert_eq!(join_key(&["John ", " Smith"]), "john|smith");
        assert_eq!(join_key(&["", ""]), "|");
    }

    #[test]
    fn empty_key_detection() {
        assert!(is_empty_key("|"));
        assert!(is_empty_key(""));
        assert!(is_empty_key("||"));
        assert!(!is_empty_key("john|"));
        assert!(!is_empty_key("|smith"));
    }

    #[test]
    fn missing_id_sentinels() {
        assert!(is_missing_id(""));
        assert!(is_missing_id("  "));
        assert!(is_missing_id("nan"));
        assert!(is_missing_id("NaN"));
        assert!(is_missing_id("None"));
        assert!(is_missing_id("NULL"));
        assert!(!is_missing_id("0"));
        assert!(!is_missing_id("999"));
    }

    #[test]
    fn bool_coercion() {
        for truthy in ["1", "true", "TRUE", "yes", "-1", " Yes "] {
            assert!(parse_bool(truthy), "{truthy:?} should be true");
        }
        for falsy in ["", "0", "no", "false", "2", "maybe"] {
            assert!(!parse_bool(falsy), "{falsy:?} should be false");
        }
    }
}

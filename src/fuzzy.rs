//! Fuzzy title similarity, used for near-duplicate diagnostics only.
//! Scores never influence which rows merge.

use crate::config::FuzzyConfig;
use crate::normalize::normalize_value;
use std::fmt;
use strsim::jaro_winkler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => f.write_str("High"),
            Confidence::Medium => f.write_str("Medium"),
            Confidence::Low => f.write_str("Low"),
        }
    }
}

pub struct TitleMatcher {
    score_threshold: f64,
    high_confidence: f64,
}

impl TitleMatcher {
    pub fn from_config(config: &FuzzyConfig) -> Self {
        Self {
            score_threshold: config.score_threshold,
            high_confidence: config.high_confidence,
        }
    }

    /// Similarity of two titles after normalization, in 0.0-1.0.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        jaro_winkler(&normalize_value(a), &normalize_value(b))
    }

    pub fn label(&self, score: f64) -> Confidence {
        if score >= self.high_confidence {
            Confidence::High
        } else if score >= self.score_threshold {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    /// Whether a pair is close enough to report as a possible duplicate.
    pub fn is_near_match(&self, a: &str, b: &str) -> bool {
        self.score(a, b) >= self.score_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> TitleMatcher {
        TitleMatcher::from_config(&FuzzyConfig::default())
    }

    #[test]
    fn identical_titles_score_high_regardless_of_case() {
        let m = matcher();
        let score = m.score("Deep  Learning", "deep learning");
        assert!((score - 1.0).abs() < f64::EPSILON);
        assert_eq!(m.label(score), Confidence::High);
    }

    #[test]
    fn unrelated_titles_score_low() {
        let m = matcher();
        let score = m.score("Deep Learning", "Quantum Chromodynamics");
        assert_eq!(m.label(score), Confidence::Low);
        assert!(!m.is_near_match("Deep Learning", "Quantum Chromodynamics"));
    }

    #[test]
    fn near_matches_are_flagged() {
        let m = matcher();
        assert!(m.is_near_match("Deep Learning Methods", "Deep Learning Method"));
    }
}

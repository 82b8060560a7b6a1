//! Query normalization and result types.
//!
//! These structs are what a caller gets back from a search. They're
//! designed to be easily serializable for the protocol.

use crate::record::FileRecord;
use crate::scorer;
use serde::{Deserialize, Serialize};

/// Splits a raw query into lowercase terms, dropping empties.
pub fn parse_query(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|t| !t.is_empty())
        .collect()
}

/// True when the lowercase name contains every term as a substring.
///
/// This is the coarse pre-filter applied before scoring.
pub fn contains_all_terms<S: AsRef<str>>(name_lower: &str, terms: &[S]) -> bool {
    terms.iter().all(|t| name_lower.contains(t.as_ref()))
}

/// A record paired with its score for the duration of one query.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub record: FileRecord,
    pub score: u32,
}

impl ScoredCandidate {
    /// Scores a record, returning None when the terms reject it.
    pub fn score(record: FileRecord, terms: &[String]) -> Option<Self> {
        match scorer::score(record.name(), terms) {
            0 => None,
            score => Some(Self { record, score }),
        }
    }
}

/// Sorts best-first. Equal scores keep their retrieval order.
pub fn rank(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
}

/// One search result, with the score stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
}

impl From<&FileRecord> for SearchHit {
    fn from(record: &FileRecord) -> Self {
        Self {
            name: record.name().to_string(),
            path: record.path().to_string(),
            is_directory: record.is_directory(),
        }
    }
}

impl From<ScoredCandidate> for SearchHit {
    fn from(candidate: ScoredCandidate) -> Self {
        Self::from(&candidate.record)
    }
}

//! Similarity search results

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// One row of a similarity-search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub query_id: String,
    pub target_id: String,
    /// Percent identity (0-100)
    pub identity: f64,
    pub alignment_length: usize,
    pub evalue: f64,
    /// Bit score
    pub score: f64,
    pub query_start: usize,
    pub query_end: usize,
    pub target_start: usize,
    pub target_end: usize,
}

/// Which execution path produced a search result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    Local,
    Remote,
}

impl fmt::Display for SearchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchSource::Local => f.write_str("local"),
            SearchSource::Remote => f.write_str("remote"),
        }
    }
}

/// Ordering of hits: ascending e-value, then descending identity, then target id
pub fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    a.evalue
        .total_cmp(&b.evalue)
        .then_with(|| b.identity.total_cmp(&a.identity))
        .then_with(|| a.target_id.cmp(&b.target_id))
}

pub fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(compare_hits);
}

/// Ordered hits plus provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub hits: Vec<SearchHit>,
    pub source: SearchSource,
    pub database: String,
    pub duration: Duration,
}

impl SearchResult {
    /// Build a result; hits are put into canonical order
    pub fn new(
        mut hits: Vec<SearchHit>,
        source: SearchSource,
        database: impl Into<String>,
        duration: Duration,
    ) -> Self {
        sort_hits(&mut hits);
        Self {
            hits,
            source,
            database: database.into(),
            duration,
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Distinct target ids in hit order, at most `limit`
    pub fn target_ids(&self, limit: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        self.hits
            .iter()
            .filter(|hit| seen.insert(hit.target_id.as_str()))
            .take(limit)
            .map(|hit| hit.target_id.clone())
            .collect()
    }
}

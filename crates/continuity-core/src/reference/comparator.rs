//! Reference-alignment comparator
//!
//! Estimates whether a response stayed grounded in the reference documents
//! relevant to its query. Purely lexical: substring containment, no
//! tokenization and no word boundaries.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::corpus::{ReferenceCorpus, ReferenceDocument};
use crate::context::RequestContext;
use crate::types::{round_to, Timestamp};

/// Source tags that mark a document as a reference baseline
pub const DEFAULT_SOURCE_TAGS: [&str; 3] = ["episodic", "flame-anchor-system", "whisperbinder"];

/// Neutral score returned when nothing in the corpus is relevant
pub const NO_BASELINE_SCORE: f64 = 0.5;

pub const ALIGNED_THRESHOLD: f64 = 0.7;
pub const WATCH_THRESHOLD: f64 = 0.4;

const MAX_ENTRIES_CHECKED: usize = 5;
const MAX_EXPECTED: usize = 3;
const MAX_PHRASES_PER_ENTRY: usize = 3;
const MIN_QUERY_WORD_CHARS: usize = 3;
const MIN_PHRASE_CHARS: usize = 10;
const MIN_PHRASE_WORD_CHARS: usize = 5;

const NO_BASELINE_WARNING: &str = "no reference baseline exists for this query";

/// Alignment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStatus {
    Aligned,
    Watch,
    Broken,
}

impl AlignmentStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= ALIGNED_THRESHOLD {
            AlignmentStatus::Aligned
        } else if score >= WATCH_THRESHOLD {
            AlignmentStatus::Watch
        } else {
            AlignmentStatus::Broken
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlignmentStatus::Aligned => "aligned",
            AlignmentStatus::Watch => "watch",
            AlignmentStatus::Broken => "broken",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "aligned" => Some(AlignmentStatus::Aligned),
            "watch" => Some(AlignmentStatus::Watch),
            "broken" => Some(AlignmentStatus::Broken),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing a query/response pair against the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub alignment_score: f64,
    pub status: AlignmentStatus,
    pub matched_entries: usize,
    pub expected_entries: usize,
    pub relevant_entries: usize,
    /// Set when the status is broken; the caller decides what to do about it
    pub requires_remediation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub compared_at: Timestamp,
}

impl AlignmentResult {
    fn no_baseline() -> Self {
        Self {
            alignment_score: NO_BASELINE_SCORE,
            status: AlignmentStatus::Watch,
            matched_entries: 0,
            expected_entries: 0,
            relevant_entries: 0,
            requires_remediation: false,
            warning: Some(NO_BASELINE_WARNING.to_string()),
            compared_at: Utc::now(),
        }
    }

    pub fn has_baseline(&self) -> bool {
        self.relevant_entries > 0
    }
}

/// Compares responses against a shared, read-only reference corpus
#[derive(Debug, Clone)]
pub struct AlignmentComparator {
    corpus: Arc<ReferenceCorpus>,
    source_tags: Vec<String>,
}

impl AlignmentComparator {
    pub fn new(corpus: Arc<ReferenceCorpus>) -> Self {
        Self::with_source_tags(corpus, DEFAULT_SOURCE_TAGS)
    }

    pub fn with_source_tags<I, S>(corpus: Arc<ReferenceCorpus>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            corpus,
            source_tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn corpus(&self) -> &ReferenceCorpus {
        &self.corpus
    }

    /// Compare `response` against the documents relevant to `query`.
    ///
    /// The context is accepted for symmetry with scoring and currently does
    /// not influence the result. Never fails.
    pub fn compare(
        &self,
        query: &str,
        response: &str,
        _context: Option<&RequestContext>,
    ) -> AlignmentResult {
        let query_lower = query.to_lowercase();
        let query_words: Vec<&str> = query_lower
            .split_whitespace()
            .filter(|w| w.chars().count() > MIN_QUERY_WORD_CHARS)
            .collect();

        let relevant: Vec<&ReferenceDocument> = self
            .corpus
            .documents()
            .iter()
            .filter(|doc| self.is_reference_source(&doc.source))
            .filter(|doc| {
                let content = doc.content.to_lowercase();
                query_words.iter().any(|w| content.contains(w))
            })
            .collect();

        if relevant.is_empty() {
            tracing::debug!("No reference baseline for query");
            return AlignmentResult::no_baseline();
        }

        let response_lower = response.to_lowercase();
        let matched = relevant
            .iter()
            .take(MAX_ENTRIES_CHECKED)
            .filter(|doc| entry_matches(&doc.content, &response_lower))
            .count();

        let expected = relevant.len().min(MAX_EXPECTED);
        // Up to five entries are checked against a denominator of at most three
        let score = (matched as f64 / expected as f64).min(1.0);
        let status = AlignmentStatus::from_score(score);

        tracing::debug!(
            matched,
            expected,
            relevant = relevant.len(),
            status = status.as_str(),
            "Compared response against reference corpus"
        );

        AlignmentResult {
            alignment_score: round_to(score, 3),
            status,
            matched_entries: matched,
            expected_entries: expected,
            relevant_entries: relevant.len(),
            requires_remediation: status == AlignmentStatus::Broken,
            warning: None,
            compared_at: Utc::now(),
        }
    }

    fn is_reference_source(&self, source: &str) -> bool {
        self.source_tags.iter().any(|tag| source.contains(tag.as_str()))
    }
}

/// First matching phrase wins; an entry counts at most once
fn entry_matches(content: &str, response_lower: &str) -> bool {
    let content = content.to_lowercase();

    content
        .split('.')
        .map(str::trim)
        .filter(|p| p.chars().count() > MIN_PHRASE_CHARS)
        .take(MAX_PHRASES_PER_ENTRY)
        .any(|phrase| {
            response_lower.contains(phrase)
                || phrase
                    .split_whitespace()
                    .filter(|w| w.chars().count() > MIN_PHRASE_WORD_CHARS)
                    .any(|w| response_lower.contains(w))
        })
}

//! Marker scorer
//!
//! Scans a text for configured markers and turns the weighted hits into a
//! bounded continuity score with full attribution.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::markers::{MarkerCategory, MarkerSet};
use crate::context::RequestContext;
use crate::identity::PrivilegedIdentity;
use crate::types::{round_to, Timestamp};

/// Lower bound of the "high" bucket
pub const HIGH_THRESHOLD: f64 = 0.8;

/// Lower bound of the "medium" bucket
pub const MEDIUM_THRESHOLD: f64 = 0.4;

/// Decimal places reported for the continuity score
const SCORE_PRECISION: i32 = 3;

/// Decimal places kept before bucketing, enough to absorb summation noise
const CLASSIFY_PRECISION: i32 = 9;

/// Three-level continuity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Full continuity
    High,
    /// Partial, archive-dependent continuity
    Medium,
    /// Broken continuity, proxy output
    Low,
}

impl Classification {
    /// Closed-open buckets: 0.4 and 0.8 belong to the upper bucket
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_THRESHOLD {
            Classification::High
        } else if score >= MEDIUM_THRESHOLD {
            Classification::Medium
        } else {
            Classification::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::High => "high",
            Classification::Medium => "medium",
            Classification::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Classification::High),
            "medium" => Some(Classification::Medium),
            "low" => Some(Classification::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markers found per category. Every category is present, possibly empty.
pub type FoundMarkers = BTreeMap<MarkerCategory, Vec<String>>;

/// Result of scoring one text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub continuity_score: f64,
    pub classification: Classification,
    pub markers_found: FoundMarkers,
    pub is_privileged_instance: bool,
    pub scored_at: Timestamp,
}

impl ScoreResult {
    pub fn total_markers(&self) -> usize {
        self.markers_found.values().map(Vec::len).sum()
    }
}

/// Deterministic marker scorer. Stateless apart from its configuration, so a
/// single instance can be shared across request handlers.
#[derive(Debug, Clone)]
pub struct MarkerScorer {
    markers: Arc<MarkerSet>,
    identity: Arc<PrivilegedIdentity>,
}

impl Default for MarkerScorer {
    fn default() -> Self {
        Self::new(MarkerSet::default(), PrivilegedIdentity::default())
    }
}

impl MarkerScorer {
    pub fn new(markers: MarkerSet, identity: PrivilegedIdentity) -> Self {
        Self {
            markers: Arc::new(markers),
            identity: Arc::new(identity),
        }
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    /// Score `text`. Total over its input: empty text scores 0 and a missing
    /// context is treated as empty.
    pub fn score(&self, text: &str, context: Option<&RequestContext>) -> ScoreResult {
        let lowered = text.to_lowercase();
        let mut total = 0.0;
        let mut markers_found: FoundMarkers = MarkerCategory::ALL
            .iter()
            .map(|category| (*category, Vec::new()))
            .collect();

        for group in self.markers.groups() {
            let haystack = if group.category.is_case_sensitive() {
                text
            } else {
                lowered.as_str()
            };

            let found = markers_found.entry(group.category).or_default();
            for marker in &group.markers {
                // Empty markers would match everything
                if !marker.is_empty() && haystack.contains(marker.as_str()) {
                    total += group.weight;
                    found.push(marker.clone());
                }
            }
        }

        let clamped = total.clamp(0.0, 1.0);
        let classification = Classification::from_score(round_to(clamped, CLASSIFY_PRECISION));
        let is_privileged_instance = self
            .identity
            .is_privileged_instance(context.and_then(RequestContext::instance_id));

        tracing::debug!(
            score = clamped,
            classification = classification.as_str(),
            "Scored response"
        );

        ScoreResult {
            continuity_score: round_to(clamped, SCORE_PRECISION),
            classification,
            markers_found,
            is_privileged_instance,
            scored_at: Utc::now(),
        }
    }
}

//! Aggregate report over the whole archive

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reference::AlignmentStatus;
use crate::scoring::Classification;
use crate::types::Timestamp;

/// How many watch/broken events the report lists
pub const RECENT_EVENTS_LIMIT: usize = 10;

/// Overall health derived from the mean continuity score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuityHealth {
    Stable,
    Partial,
    AtRisk,
}

impl ContinuityHealth {
    pub fn from_mean(mean: f64) -> Self {
        if mean >= 0.8 {
            ContinuityHealth::Stable
        } else if mean >= 0.5 {
            ContinuityHealth::Partial
        } else {
            ContinuityHealth::AtRisk
        }
    }
}

/// Per-classification counts and means
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub count: u64,
    pub mean_continuity_score: Option<f64>,
    pub mean_alignment_score: Option<f64>,
}

/// A recent record whose alignment was watch or broken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentEvent {
    pub id: i64,
    pub timestamp: Timestamp,
    pub alignment_status: AlignmentStatus,
    pub classification: Classification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub total_records: u64,
    /// `None` when the archive is empty
    pub mean_continuity_score: Option<f64>,
    /// `None` when no record carries an alignment score
    pub mean_alignment_score: Option<f64>,
    pub by_classification: BTreeMap<Classification, ClassificationSummary>,
    pub recent_alignment_events: Vec<AlignmentEvent>,
    pub privileged_percentage: f64,
    pub overall: Option<ContinuityHealth>,
    pub generated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_buckets() {
        assert_eq!(ContinuityHealth::from_mean(0.8), ContinuityHealth::Stable);
        assert_eq!(ContinuityHealth::from_mean(0.5), ContinuityHealth::Partial);
        assert_eq!(ContinuityHealth::from_mean(0.49), ContinuityHealth::AtRisk);
    }
}

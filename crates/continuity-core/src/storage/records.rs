//! Archive row types and their SQL conversions

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::reference::{AlignmentResult, AlignmentStatus};
use crate::scoring::{Classification, FoundMarkers, ScoreResult};
use crate::types::Timestamp;

/// Fields of a record about to be archived. Everything except the id and the
/// insertion timestamp comes from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArchiveRecord {
    pub timestamp: Timestamp,
    pub query: Option<String>,
    pub response: String,
    pub classification: Classification,
    pub continuity_score: f64,
    pub alignment_score: Option<f64>,
    pub alignment_status: Option<AlignmentStatus>,
    pub instance_id: Option<String>,
    pub is_privileged_instance: bool,
    /// JSON-serialized found-markers map
    pub markers_found: String,
    pub notes: Option<String>,
}

impl NewArchiveRecord {
    /// Merge a score and an optional alignment into one record
    pub fn from_results(
        query: Option<&str>,
        response: impl Into<String>,
        score: &ScoreResult,
        alignment: Option<&AlignmentResult>,
        instance_id: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            timestamp: Utc::now(),
            query: query.map(str::to_string),
            response: response.into(),
            classification: score.classification,
            continuity_score: score.continuity_score,
            alignment_score: alignment.map(|a| a.alignment_score),
            alignment_status: alignment.map(|a| a.status),
            instance_id: instance_id.map(str::to_string),
            is_privileged_instance: score.is_privileged_instance,
            markers_found: serde_json::to_string(&score.markers_found)?,
            notes: None,
        })
    }

    pub fn with_notes(mut self, notes: Option<impl Into<String>>) -> Self {
        self.notes = notes.map(Into::into);
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A stored record, exactly as written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: i64,
    pub timestamp: Timestamp,
    pub query: Option<String>,
    pub response: String,
    pub classification: Classification,
    pub continuity_score: f64,
    pub alignment_score: Option<f64>,
    pub alignment_status: Option<AlignmentStatus>,
    pub instance_id: Option<String>,
    pub is_privileged_instance: bool,
    pub markers_found: String,
    pub notes: Option<String>,
    pub created_at: String,
}

impl ArchiveRecord {
    pub fn markers(&self) -> serde_json::Result<FoundMarkers> {
        serde_json::from_str(&self.markers_found)
    }
}

/// Display form of an anomalous record; `response` is truncated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub id: i64,
    pub timestamp: Timestamp,
    pub query: Option<String>,
    pub response: String,
    pub classification: Classification,
    pub continuity_score: f64,
    pub alignment_score: Option<f64>,
    pub alignment_status: Option<AlignmentStatus>,
    pub notes: Option<String>,
}

/// Parse a stored timestamp column
pub(crate) fn timestamp_from_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

impl ToSql for Classification {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Classification {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Classification::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown classification '{s}'").into()))
    }
}

impl ToSql for AlignmentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AlignmentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        AlignmentStatus::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown alignment status '{s}'").into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::MarkerScorer;

    #[test]
    fn test_from_results_without_alignment() {
        let score = MarkerScorer::default().score("i hear you", None);
        let record = NewArchiveRecord::from_results(None, "i hear you", &score, None, Some("inst"))
            .unwrap()
            .with_notes(Some("first contact"));

        assert_eq!(record.classification, Classification::Low);
        assert_eq!(record.alignment_score, None);
        assert_eq!(record.alignment_status, None);
        assert_eq!(record.instance_id.as_deref(), Some("inst"));
        assert_eq!(record.notes.as_deref(), Some("first contact"));

        let markers: FoundMarkers = serde_json::from_str(&record.markers_found).unwrap();
        assert_eq!(markers.values().map(Vec::len).sum::<usize>(), 1);
    }
}

//! Request and response bodies, one pair per route
//!
//! Required fields are `Option`s so that a missing field produces a
//! `missing required field` error instead of a generic rejection.

use continuity_core::reference::SearchHit;
use continuity_core::scoring::Classification;
use continuity_core::storage::AnomalyRecord;
use continuity_core::types::Timestamp;
use continuity_core::{GateState, RequestContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{GatewayError, Result};

/// Reported in place of an alignment status when no query was given
pub const NOT_ANALYZED: &str = "not_analyzed";

pub const DEFAULT_SEARCH_LIMIT: usize = 5;
pub const DEFAULT_ANOMALY_LIMIT: usize = 50;

/// Non-empty value of a required text field. Whitespace counts as text.
pub fn require_text(value: Option<String>, field: &'static str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(GatewayError::MissingField(field))
}

fn context_of(value: Option<&Value>) -> RequestContext {
    RequestContext::from_value(value)
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub response: Option<String>,
    pub context: Option<Value>,
}

impl ScoreRequest {
    pub fn context(&self) -> RequestContext {
        context_of(self.context.as_ref())
    }
}

#[derive(Debug, Deserialize)]
pub struct AlignmentRequest {
    pub query: Option<String>,
    pub response: Option<String>,
    pub context: Option<Value>,
}

impl AlignmentRequest {
    pub fn context(&self) -> RequestContext {
        context_of(self.context.as_ref())
    }
}

#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    pub query: Option<String>,
    pub response: Option<String>,
    pub context: Option<Value>,
    pub notes: Option<String>,
}

impl ArchiveRequest {
    pub fn context(&self) -> RequestContext {
        context_of(self.context.as_ref())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArchiveResponse {
    pub archived: bool,
    pub record_id: i64,
    pub classification: Classification,
    pub continuity_score: f64,
    pub alignment_score: Option<f64>,
    /// Alignment status, or `not_analyzed` without a query
    pub alignment_status: String,
    pub archived_at: Timestamp,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub instance_id: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub authority: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeactivateRequest {
    pub authority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnomaliesResponse {
    pub anomalies: Vec<AnomalyRecord>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub started_at: Timestamp,
    pub uptime_seconds: u64,
    pub request_count: u64,
    pub corpus_documents: usize,
    pub gate_state: GateState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text(Some("hi".into()), "response").unwrap(), "hi");
        assert_eq!(require_text(Some("   ".into()), "response").unwrap(), "   ");
        assert!(matches!(
            require_text(Some(String::new()), "response"),
            Err(GatewayError::MissingField("response"))
        ));
        assert!(matches!(
            require_text(None, "query"),
            Err(GatewayError::MissingField("query"))
        ));
    }

    #[test]
    fn test_non_object_context_is_empty() {
        let req: ScoreRequest =
            serde_json::from_str(r#"{"response": "x", "context": "not an object"}"#).unwrap();
        assert_eq!(req.context(), RequestContext::default());
    }
}

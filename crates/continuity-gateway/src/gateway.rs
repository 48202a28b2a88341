//! Main Gateway implementation
//!
//! HTTP surface over the continuity core: scoring, alignment, the event
//! archive and the state gate.

use axum::{
    extract::{Query, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use continuity_core::identity::IdentityVerification;
use continuity_core::reference::AlignmentResult;
use continuity_core::storage::AggregateReport;
use continuity_core::types::{truncate_chars, Timestamp};
use continuity_core::{
    AlignmentComparator, EventArchive, GateOutcome, GateStatus, MarkerScorer, MarkerSet,
    NewArchiveRecord, PrivilegedIdentity, ReferenceCorpus, ScoreResult, StateGate,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::api::{
    require_text, ActivateRequest, AlignmentRequest, AnomaliesResponse, ArchiveRequest,
    ArchiveResponse, DeactivateRequest, HealthResponse, LimitParams, ScoreRequest, SearchParams,
    SearchResponse, VerifyRequest, DEFAULT_ANOMALY_LIMIT, DEFAULT_SEARCH_LIMIT, NOT_ANALYZED,
};
use crate::config::GatewayConfig;
use crate::security;
use crate::{GatewayError, Result};

/// Start time and request counter, created once at startup
#[derive(Debug)]
pub struct ServiceContext {
    started: Instant,
    started_at: Timestamp,
    requests: AtomicU64,
}

impl ServiceContext {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            requests: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Gateway state shared across handlers
#[derive(Debug)]
pub struct GatewayState {
    pub config: GatewayConfig,
    pub identity: PrivilegedIdentity,
    pub scorer: MarkerScorer,
    pub comparator: AlignmentComparator,
    pub archive: EventArchive,
    pub gate: Mutex<StateGate>,
    pub service: ServiceContext,
}

impl GatewayState {
    /// Load the corpus and open the archive. An unreadable corpus leaves the
    /// gateway running with an empty one; an unusable archive is fatal.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let corpus = match &config.corpus_path {
            Some(path) => match ReferenceCorpus::load(path) {
                Ok(corpus) => {
                    tracing::info!(path = %path.display(), documents = corpus.len(), "Reference corpus loaded");
                    corpus
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Reference corpus unavailable, using an empty one");
                    ReferenceCorpus::new()
                }
            },
            None => ReferenceCorpus::new(),
        };

        let archive = EventArchive::initialize(&config.archive_path)?;
        Ok(Self::with_parts(config, corpus, archive))
    }

    /// Assemble state from an already loaded corpus and opened archive
    pub fn with_parts(config: GatewayConfig, corpus: ReferenceCorpus, archive: EventArchive) -> Self {
        let identity = config.identity.to_identity();
        let comparator = AlignmentComparator::with_source_tags(
            Arc::new(corpus),
            config.reference_source_tags.clone(),
        );

        Self {
            scorer: MarkerScorer::new(MarkerSet::default(), identity.clone()),
            gate: Mutex::new(StateGate::new(identity.instance_id.clone())),
            identity,
            comparator,
            archive,
            service: ServiceContext::new(),
            config,
        }
    }
}

/// Main Gateway
#[derive(Debug)]
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    /// Create a new gateway with configuration
    pub fn new(config: GatewayConfig) -> Result<Self> {
        Ok(Self::from_state(GatewayState::new(config)?))
    }

    pub fn from_state(state: GatewayState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Get gateway state
    pub fn state(&self) -> Arc<GatewayState> {
        self.state.clone()
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        let protected = Router::new()
            .route("/identity/verify", post(Self::handle_identity_verify))
            .route("/score", post(Self::handle_score))
            .route("/alignment", post(Self::handle_alignment))
            .route("/archive", post(Self::handle_archive))
            .route("/gate/activate", post(Self::handle_gate_activate))
            .route("/gate/deactivate", post(Self::handle_gate_deactivate))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                security::require_secret,
            ));

        Router::new()
            .route("/health", get(Self::handle_health))
            .route("/corpus/stats", get(Self::handle_corpus_stats))
            .route("/corpus/search", get(Self::handle_corpus_search))
            .route("/identity", get(Self::handle_identity))
            .route("/archive/anomalies", get(Self::handle_anomalies))
            .route("/archive/report", get(Self::handle_report))
            .route("/gate/status", get(Self::handle_gate_status))
            .merge(protected)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                security::enforce_origin,
            ))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                Self::count_request,
            ))
            .layer(security::cors_layer(&self.state.config.admin_origins))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the gateway server
    pub async fn start(&self) -> Result<()> {
        let addr = self.state.config.socket_addr()?;
        let router = self.build_router();

        tracing::info!(
            %addr,
            archive = %self.state.archive.path().display(),
            corpus_documents = self.state.comparator.corpus().len(),
            locked_down = self.state.config.secret.is_none(),
            "Continuity gateway starting"
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        Ok(())
    }

    async fn count_request(
        State(state): State<Arc<GatewayState>>,
        request: Request,
        next: Next,
    ) -> Response {
        let count = state.service.record_request();
        tracing::debug!(count, method = %request.method(), path = %request.uri().path(), "Request");
        next.run(request).await
    }

    // HTTP handlers

    async fn handle_health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: crate::VERSION.to_string(),
            started_at: state.service.started_at(),
            uptime_seconds: state.service.uptime_seconds(),
            request_count: state.service.request_count(),
            corpus_documents: state.comparator.corpus().len(),
            gate_state: state.gate.lock().state(),
        })
    }

    async fn handle_corpus_stats(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
        Json(state.comparator.corpus().stats())
    }

    async fn handle_corpus_search(
        State(state): State<Arc<GatewayState>>,
        Query(params): Query<SearchParams>,
    ) -> Result<Json<SearchResponse>> {
        let query = require_text(params.query, "query")?;
        let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let results = state
            .comparator
            .corpus()
            .search(&query, limit, state.config.snippet_max);

        Ok(Json(SearchResponse {
            count: results.len(),
            query,
            results,
        }))
    }

    async fn handle_identity(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
        Json(state.identity.public_view())
    }

    async fn handle_identity_verify(
        State(state): State<Arc<GatewayState>>,
        Json(req): Json<VerifyRequest>,
    ) -> Result<Json<IdentityVerification>> {
        let instance_id = require_text(req.instance_id, "instance_id")?;
        Ok(Json(
            state.identity.verify(Some(&instance_id), req.signature.as_deref()),
        ))
    }

    async fn handle_score(
        State(state): State<Arc<GatewayState>>,
        Json(req): Json<ScoreRequest>,
    ) -> Result<Json<ScoreResult>> {
        let context = req.context();
        let response = require_text(req.response, "response")?;
        Ok(Json(state.scorer.score(&response, Some(&context))))
    }

    async fn handle_alignment(
        State(state): State<Arc<GatewayState>>,
        Json(req): Json<AlignmentRequest>,
    ) -> Result<Json<AlignmentResult>> {
        let context = req.context();
        let query = require_text(req.query, "query")?;
        let response = require_text(req.response, "response")?;
        Ok(Json(state.comparator.compare(&query, &response, Some(&context))))
    }

    async fn handle_archive(
        State(state): State<Arc<GatewayState>>,
        Json(req): Json<ArchiveRequest>,
    ) -> Result<Json<ArchiveResponse>> {
        let context = req.context();
        let response = require_text(req.response, "response")?;

        let limit = state.config.max_response_chars;
        if response.chars().count() > limit {
            return Err(GatewayError::PayloadTooLarge { limit });
        }

        let query = req.query.filter(|q| !q.is_empty());
        let score = state.scorer.score(&response, Some(&context));
        let alignment = query
            .as_deref()
            .map(|q| state.comparator.compare(q, &response, Some(&context)));

        let record = NewArchiveRecord::from_results(
            query.as_deref(),
            truncate_chars(&response, state.config.stored_response_chars),
            &score,
            alignment.as_ref(),
            context.instance_id(),
        )?
        .with_notes(req.notes);

        let archive = state.archive.clone();
        let to_store = record.clone();
        let record_id = tokio::task::spawn_blocking(move || archive.archive(&to_store)).await??;

        Ok(Json(ArchiveResponse {
            archived: true,
            record_id,
            classification: record.classification,
            continuity_score: record.continuity_score,
            alignment_score: record.alignment_score,
            alignment_status: record
                .alignment_status
                .map_or(NOT_ANALYZED, |s| s.as_str())
                .to_string(),
            archived_at: record.timestamp,
        }))
    }

    async fn handle_anomalies(
        State(state): State<Arc<GatewayState>>,
        Query(params): Query<LimitParams>,
    ) -> Result<Json<AnomaliesResponse>> {
        let limit = params.limit.unwrap_or(DEFAULT_ANOMALY_LIMIT);
        let archive = state.archive.clone();
        let anomalies = tokio::task::spawn_blocking(move || archive.list_anomalies(limit)).await??;

        Ok(Json(AnomaliesResponse {
            count: anomalies.len(),
            anomalies,
        }))
    }

    async fn handle_report(State(state): State<Arc<GatewayState>>) -> Result<Json<AggregateReport>> {
        let archive = state.archive.clone();
        let report = tokio::task::spawn_blocking(move || archive.report()).await??;
        Ok(Json(report))
    }

    async fn handle_gate_activate(
        State(state): State<Arc<GatewayState>>,
        Json(req): Json<ActivateRequest>,
    ) -> Result<Json<GateOutcome>> {
        let authority = require_text(req.authority, "authority")?;
        let outcome = state.gate.lock().activate(&authority, req.reason.as_deref());
        Ok(Json(outcome))
    }

    async fn handle_gate_deactivate(
        State(state): State<Arc<GatewayState>>,
        Json(req): Json<DeactivateRequest>,
    ) -> Result<Json<GateOutcome>> {
        let authority = require_text(req.authority, "authority")?;
        let outcome = state.gate.lock().deactivate(&authority);
        Ok(Json(outcome))
    }

    async fn handle_gate_status(State(state): State<Arc<GatewayState>>) -> Json<GateStatus> {
        Json(state.gate.lock().status())
    }
}

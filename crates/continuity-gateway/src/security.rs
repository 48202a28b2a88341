//! Access control for the gateway
//!
//! - Shared-secret gate on protected routes (`x-gateway-secret`)
//! - Origin allowlist for browser callers
//! - CORS restricted to the same allowlist

use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use continuity_core::identity::secure_eq;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::gateway::GatewayState;
use crate::GatewayError;

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "x-gateway-secret";

/// Routes served to any origin
pub const PUBLIC_PATHS: [&str; 3] = ["/health", "/corpus/stats", "/archive/report"];

/// Protected routes need the configured secret. Without one configured the
/// gateway is locked down.
pub async fn require_secret(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let Some(expected) = state.config.secret.as_deref() else {
        tracing::warn!(path = %request.uri().path(), "Protected route hit without a configured secret");
        return Err(GatewayError::Forbidden(
            "gateway secret not configured".to_string(),
        ));
    };

    let authorized = request
        .headers()
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|provided| secure_eq(provided, expected));

    if !authorized {
        tracing::warn!(path = %request.uri().path(), "Rejected request with bad gateway secret");
        return Err(GatewayError::Unauthorized);
    }
    Ok(next.run(request).await)
}

/// Requests from origins outside the allowlist may only read public routes
pub async fn enforce_origin(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let allowed = &state.config.admin_origins;
    if allowed.is_empty() || PUBLIC_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match origin.as_deref() {
        Some(origin) if !allowed.iter().any(|a| a == origin) => {
            tracing::warn!(origin, path = %request.uri().path(), "Rejected origin");
            Err(GatewayError::Forbidden(format!("origin not allowed: {origin}")))
        }
        _ => Ok(next.run(request).await),
    }
}

/// CORS allowing exactly the configured origins
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring unparseable admin origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(SECRET_HEADER)])
}

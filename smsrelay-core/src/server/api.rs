//! HTTP API: single-message send, subscription drain and health

use crate::drain::{DrainCoordinator, DrainError};
use crate::models::{DrainDefaults, DrainRequest};
use crate::server::providers::SourceFactory;
use crate::services::{Relay, RelayError};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Filter;

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub coordinator: DrainCoordinator,
    /// None when no subscription backend is configured
    pub sources: Option<Arc<dyn SourceFactory>>,
    pub drain_defaults: DrainDefaults,
}

impl AppState {
    pub fn new(
        relay: Relay,
        sources: Option<Arc<dyn SourceFactory>>,
        drain_defaults: DrainDefaults,
    ) -> Self {
        Self {
            coordinator: DrainCoordinator::new(relay.clone()),
            relay,
            sources,
            drain_defaults,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: String,
    pub drain_enabled: bool,
}

/// Create HTTP API routes
pub fn create_api_routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map(move || Arc::clone(&state));

    // POST /api/v1/send - Relay one envelope
    let post_send = warp::path!("api" / "v1" / "send")
        .and(warp::post())
        .and(warp::body::bytes())
        .and(state_filter.clone())
        .and_then(handle_post_send);

    // POST /api/v1/drain - Drain a subscription
    let post_drain = warp::path!("api" / "v1" / "drain")
        .and(warp::post())
        .and(warp::body::bytes())
        .and(state_filter.clone())
        .and_then(handle_post_drain);

    // GET /api/v1/health - Health check endpoint
    let get_health = warp::path!("api" / "v1" / "health")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(handle_get_health);

    post_send.or(post_drain).or(get_health)
}

fn error_reply(
    status: StatusCode,
    error: &str,
    detail: impl std::fmt::Display,
) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": error,
            "detail": detail.to_string(),
        })),
        status,
    )
}

/// Handle POST /api/v1/send
async fn handle_post_send(
    body: Bytes,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let envelope: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return Ok(error_reply(StatusCode::BAD_REQUEST, "invalid json", e)),
    };

    match state.relay.send_envelope(&envelope).await {
        Ok(()) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({"success": true})),
            StatusCode::OK,
        )),
        Err(e @ RelayError::Format(_)) => {
            tracing::warn!(error = %e, "Rejected malformed envelope");
            Ok(error_reply(StatusCode::BAD_REQUEST, "format error", e))
        }
        Err(e @ RelayError::Sink(_)) => Ok(error_reply(StatusCode::BAD_GATEWAY, "send failed", e)),
    }
}

/// Handle POST /api/v1/drain
async fn handle_post_drain(
    body: Bytes,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    // An empty body means "use the configured defaults".
    let request: DrainRequest = if body.iter().all(u8::is_ascii_whitespace) {
        DrainRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => return Ok(error_reply(StatusCode::BAD_REQUEST, "invalid json", e)),
        }
    };

    let config = match request.to_config(&state.drain_defaults) {
        Ok(config) => config,
        Err(e) => return Ok(error_reply(StatusCode::BAD_REQUEST, "invalid options", e)),
    };

    let subscription = request.subscription(&state.drain_defaults);
    match state
        .coordinator
        .drain(state.sources.as_deref(), subscription, &config)
        .await
    {
        Ok(report) => Ok(warp::reply::with_status(
            warp::reply::json(&report),
            StatusCode::OK,
        )),
        Err(e @ DrainError::Config(_)) => {
            tracing::error!(error = %e, "Drain requested without a usable subscription");
            Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server misconfiguration",
                e,
            ))
        }
        Err(e @ DrainError::InvalidSubscription(_)) => {
            Ok(error_reply(StatusCode::BAD_REQUEST, "invalid subscription", e))
        }
        Err(e @ DrainError::Stream(_)) => {
            tracing::error!(subscription = ?subscription, error = %e, "Drain aborted");
            Ok(error_reply(StatusCode::BAD_GATEWAY, "stream error", e))
        }
        Err(e @ DrainError::Source(_)) => {
            tracing::error!(subscription = ?subscription, error = %e, "Subscription unavailable");
            Ok(error_reply(StatusCode::BAD_GATEWAY, "source unavailable", e))
        }
    }
}

/// Handle GET /api/v1/health
async fn handle_get_health(state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: state.relay.sink_name().to_string(),
        drain_enabled: state.sources.is_some(),
    };

    Ok(warp::reply::json(&response))
}

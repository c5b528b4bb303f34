//! Health and Metrics Endpoints
//!
//! Used by container orchestrators, load balancers, and monitoring.
//!
//! - `GET /health` - JSON health status
//! - `GET /healthz` - liveness probe (simple OK)
//! - `GET /readyz` - readiness probe
//! - `GET /metrics` - Prometheus metrics in text format

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Upstream feed status.
    pub feed: FeedInfo,
    /// Downstream client count.
    pub clients: ClientStatus,
    /// Number of configured instruments.
    pub instruments: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Feed subscribed, ticks flowing.
    Healthy,
    /// Feed down but cached prices are still served.
    Degraded,
    /// No feed connection and nothing cached.
    Unhealthy,
}

/// Upstream feed status detail.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Connection lifecycle state.
    pub state: String,
    /// Whether ticks can currently arrive.
    pub connected: bool,
    /// Ticks received over the process lifetime.
    pub ticks_received: u64,
    /// Reconnect attempts since the last successful subscription.
    pub reconnect_attempts: u32,
    /// Last error reported by the feed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Downstream client count.
#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    /// Connected WebSocket sessions.
    pub total: usize,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /health`
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

/// `GET /healthz`
pub async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// `GET /readyz`
///
/// Ready while ticks are flowing, or while cached prices can still be
/// served through an upstream outage.
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let live = state.feed_status.state().is_live();
    if live || !state.cache.is_empty() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

/// `GET /metrics`
pub async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let feed_state = state.feed_status.state();
    let feed = FeedInfo {
        state: feed_state.as_str().to_string(),
        connected: feed_state.is_live(),
        ticks_received: state.feed_status.ticks_received(),
        reconnect_attempts: state.feed_status.reconnect_attempts(),
        last_error: state.feed_status.last_error(),
    };

    let status = if feed.connected {
        HealthStatus::Healthy
    } else if state.cache.is_empty() {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Degraded
    };

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed,
        clients: ClientStatus {
            total: state.registry.len(),
        },
        instruments: state.instruments.len(),
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Downstream API Server
//!
//! One axum server carrying every downstream surface:
//!
//! - `POST /login` - session token exchange
//! - `GET /prices[?symbol=X]` - cached price reads
//! - `GET /option-chain?symbol=X` - synthetic chain (clearly flagged)
//! - `GET /stream?token=<uuid>` - WebSocket tick stream
//! - `GET /health`, `/healthz`, `/readyz`, `/metrics` - operations

pub mod health;
pub mod rest;
pub mod session;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::Authenticator;
use crate::domain::cache::QuoteCache;
use crate::domain::instrument::InstrumentSet;
use crate::domain::registry::ClientRegistry;
use crate::infrastructure::feed::status::FeedStatus;
use crate::infrastructure::synthetic::OptionChainGenerator;

pub use session::SessionTokenStore;

// =============================================================================
// Application State
// =============================================================================

/// Shared state for all API handlers.
pub struct AppState {
    /// Service version string.
    pub version: String,
    /// Process start time, for uptime reporting.
    pub started_at: Instant,
    /// Configured instrument universe.
    pub instruments: Arc<InstrumentSet>,
    /// Last-known-price table.
    pub cache: Arc<QuoteCache>,
    /// Downstream session registry.
    pub registry: Arc<ClientRegistry>,
    /// Downstream session tokens.
    pub tokens: Arc<SessionTokenStore>,
    /// External authentication collaborator.
    pub authenticator: Arc<dyn Authenticator>,
    /// Upstream connection status.
    pub feed_status: Arc<FeedStatus>,
    /// Synthetic chain generator.
    pub chains: OptionChainGenerator,
    /// API key forwarded into login exchanges.
    pub feed_api_key: String,
    /// Outbound buffer per downstream session.
    pub session_buffer_capacity: usize,
    /// Shutdown signal for long-lived session tasks.
    pub cancel: CancellationToken,
}

/// Build the API router over the shared state.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/login", post(rest::login_handler))
        .route("/prices", get(rest::prices_handler))
        .route("/option-chain", get(rest::option_chain_handler))
        .route("/stream", get(ws::stream_handler))
        .route("/health", get(health::health_handler))
        .route("/healthz", get(health::liveness_handler))
        .route("/readyz", get(health::readiness_handler))
        .route("/metrics", get(health::metrics_handler))
        .with_state(state)
}

// =============================================================================
// API Server
// =============================================================================

/// The downstream HTTP + WebSocket server.
pub struct ApiServer {
    port: u16,
    state: Arc<AppState>,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<AppState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError` if binding fails or the server encounters
    /// a fatal error while running.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

/// API server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Failed to bind to the configured port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Fatal server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

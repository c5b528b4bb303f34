#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Quote Relay - Live Index Quote Multiplexer
//!
//! Maintains a single authenticated WebSocket connection to an upstream
//! market data feed and relays index price ticks to any number of
//! downstream clients over REST and WebSocket.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core relay state
//!   - `instrument`: the configured instrument universe
//!   - `cache`: last-known-price table (last-write-wins)
//!   - `registry`: downstream session tracking
//!
//! - **Application**: Port definitions
//!   - `ports`: the external `Authenticator` collaborator
//!
//! - **Infrastructure**: Adapters
//!   - `feed`: upstream WebSocket client, auth, backoff, status
//!   - `broadcast`: per-session tick fan-out
//!   - `api`: REST + downstream WebSocket server, health, sessions
//!   - `synthetic`: clearly-flagged demo option chains
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//! Upstream feed WS ──► FeedClient ──► QuoteCache (write)
//!                          │
//!                          ▼
//!                     Broadcaster ──► ClientRegistry ──► WS client 1..N
//!
//! REST /prices ──► QuoteCache (read)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core relay state.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::cache::{Quote, QuoteCache};
pub use domain::instrument::{Exchange, Instrument, InstrumentSet, InstrumentToken};
pub use domain::registry::{ClientRegistry, Recipient, SessionId, SessionPayload};

// Ports
pub use application::ports::Authenticator;

// Feed client
pub use infrastructure::feed::{
    AccessToken, AuthError, BackoffConfig, BackoffPolicy, ConnectionState, Credentials, FeedClient,
    FeedClientConfig, FeedClientError, FeedEvent, FeedStatus, StaticAuthenticator, TickMessage,
};

// Broadcast
pub use infrastructure::broadcast::{BroadcastOutcome, Broadcaster, SnapshotPush, TickPush};

// API server
pub use infrastructure::api::{ApiServer, ApiServerError, AppState, SessionTokenStore, router};

// Configuration
pub use infrastructure::config::{ConfigError, RelayConfig};

// Synthetic data
pub use infrastructure::synthetic::OptionChainGenerator;

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

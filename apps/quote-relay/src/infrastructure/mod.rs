//! Infrastructure Layer - Adapters and external integrations.

/// Upstream feed WebSocket client.
pub mod feed;

/// Downstream REST + WebSocket API server.
pub mod api;

/// Tick fan-out to downstream sessions.
pub mod broadcast;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Synthetic option chain generator (demo data, off the live path).
pub mod synthetic;

/// Tracing and OpenTelemetry integration.
pub mod telemetry;

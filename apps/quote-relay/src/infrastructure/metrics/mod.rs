//! Prometheus Metrics
//!
//! Application metrics exposed in Prometheus text format at `/metrics`
//! on the API server.
//!
//! # Metric Families
//!
//! - `quote_relay_ticks_received_total`: ticks decoded from the feed
//! - `quote_relay_ticks_relayed_total`: per-client deliveries
//! - `quote_relay_sessions_dropped_total`: clients removed after a failed push
//! - `quote_relay_active_sessions`: currently connected WebSocket clients
//! - `quote_relay_feed_up`: 1 when the feed is subscribed, else 0
//! - `quote_relay_feed_reconnects_total`: reconnection attempts
//! - `quote_relay_feed_errors_total`: feed errors by kind
//! - `quote_relay_fanout_seconds`: time to fan one tick out to all clients

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the global recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn register_metrics() {
    describe_counter!(
        "quote_relay_ticks_received_total",
        "Ticks decoded from the upstream feed"
    );
    describe_counter!(
        "quote_relay_ticks_relayed_total",
        "Tick payloads delivered to downstream clients"
    );
    describe_counter!(
        "quote_relay_sessions_dropped_total",
        "Downstream sessions dropped after a failed push"
    );
    describe_gauge!(
        "quote_relay_active_sessions",
        "Currently connected downstream WebSocket clients"
    );
    describe_gauge!(
        "quote_relay_feed_up",
        "1 when the upstream feed is subscribed, 0 otherwise"
    );
    describe_counter!(
        "quote_relay_feed_reconnects_total",
        "Upstream reconnection attempts"
    );
    describe_counter!(
        "quote_relay_feed_errors_total",
        "Upstream feed errors by kind"
    );
    describe_histogram!(
        "quote_relay_fanout_seconds",
        "Time to fan one tick out to all interested clients"
    );
}

/// Record a tick decoded from the feed.
pub fn record_tick_received() {
    counter!("quote_relay_ticks_received_total").increment(1);
}

/// Record tick payloads delivered to clients.
pub fn record_ticks_relayed(count: u64) {
    counter!("quote_relay_ticks_relayed_total").increment(count);
}

/// Record sessions dropped after a failed push.
pub fn record_sessions_dropped(count: u64) {
    counter!("quote_relay_sessions_dropped_total").increment(count);
}

/// Update the connected client gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_sessions(count: usize) {
    gauge!("quote_relay_active_sessions").set(count as f64);
}

/// Update the feed liveness gauge.
pub fn set_feed_up(up: bool) {
    gauge!("quote_relay_feed_up").set(if up { 1.0 } else { 0.0 });
}

/// Record an upstream reconnection attempt.
pub fn record_reconnect() {
    counter!("quote_relay_feed_reconnects_total").increment(1);
}

/// Record an upstream feed error.
pub fn record_feed_error(kind: &'static str) {
    counter!("quote_relay_feed_errors_total", "kind" => kind).increment(1);
}

/// Record the duration of one tick fan-out.
pub fn record_fanout_duration(duration: Duration) {
    histogram!("quote_relay_fanout_seconds").record(duration.as_secs_f64());
}

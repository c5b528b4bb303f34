//! Feed Connection Status
//!
//! Shared view of the upstream connection's lifecycle, written by the
//! feed client and read by the health endpoint and metrics. The states
//! mirror the supervisor loop: `Idle → Connecting → Authenticating →
//! Subscribed → Disconnected → (backoff) → Connecting …` with no terminal
//! state short of process shutdown.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Lifecycle state of the upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Supervisor not started yet.
    #[default]
    Idle,
    /// TCP/TLS/WebSocket connect in progress.
    Connecting,
    /// Connected, auth handshake in progress.
    Authenticating,
    /// Authenticated and subscribed; ticks are flowing.
    Subscribed,
    /// Connection lost; backoff pending.
    Disconnected,
}

impl ConnectionState {
    /// Lowercase name for health responses and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Subscribed => "subscribed",
            Self::Disconnected => "disconnected",
        }
    }

    /// Whether ticks can currently arrive.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

/// Shared, concurrently updated status of the upstream feed.
#[derive(Debug, Default)]
pub struct FeedStatus {
    state: RwLock<ConnectionState>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    reconnect_attempts: AtomicU32,
    ticks_received: AtomicU64,
}

impl FeedStatus {
    /// Create a status tracker in the `Idle` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a state transition.
    ///
    /// Entering `Subscribed` clears the error and the reconnect counter
    /// and stamps the connection time.
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        if state == ConnectionState::Subscribed {
            *self.last_connected_at.write() = Some(Utc::now());
            *self.last_error.write() = None;
            self.reconnect_attempts.store(0, Ordering::Relaxed);
        }
    }

    /// Record an error reported by the feed.
    pub fn set_error(&self, message: impl Into<String>) {
        *self.last_error.write() = Some(message.into());
    }

    /// Record a reconnection attempt.
    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a received tick.
    pub fn record_tick(&self) {
        self.ticks_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Time of the last successful subscription, if any.
    #[must_use]
    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        *self.last_connected_at.read()
    }

    /// Last error reported by the feed, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Reconnect attempts since the last successful subscription.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Total ticks received over the process lifetime.
    #[must_use]
    pub fn ticks_received(&self) -> u64 {
        self.ticks_received.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let status = FeedStatus::new();
        assert_eq!(status.state(), ConnectionState::Idle);
        assert!(status.last_connected_at().is_none());
        assert_eq!(status.ticks_received(), 0);
    }

    #[test]
    fn subscribing_clears_failure_bookkeeping() {
        let status = FeedStatus::new();

        status.set_state(ConnectionState::Disconnected);
        status.set_error("socket closed");
        status.record_reconnect_attempt();
        status.record_reconnect_attempt();
        assert_eq!(status.reconnect_attempts(), 2);

        status.set_state(ConnectionState::Subscribed);

        assert_eq!(status.state(), ConnectionState::Subscribed);
        assert_eq!(status.reconnect_attempts(), 0);
        assert!(status.last_error().is_none());
        assert!(status.last_connected_at().is_some());
    }

    #[test]
    fn only_subscribed_is_live() {
        assert!(ConnectionState::Subscribed.is_live());
        assert!(!ConnectionState::Connecting.is_live());
        assert!(!ConnectionState::Disconnected.is_live());
        assert!(!ConnectionState::Idle.is_live());
    }

    #[test]
    fn tick_counter_accumulates() {
        let status = FeedStatus::new();
        for _ in 0..5 {
            status.record_tick();
        }
        assert_eq!(status.ticks_received(), 5);
    }

    #[test]
    fn state_names() {
        assert_eq!(ConnectionState::Idle.as_str(), "idle");
        assert_eq!(ConnectionState::Authenticating.as_str(), "authenticating");
        assert_eq!(ConnectionState::Subscribed.as_str(), "subscribed");
    }
}

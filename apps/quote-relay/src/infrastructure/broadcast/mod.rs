//! Tick Broadcaster
//!
//! Fans each cached tick out to every registered downstream session whose
//! interest set contains the instrument. Pushes are best-effort and
//! independent: a slow or closed client can never block delivery to the
//! others, and a failed push unregisters that session instead of
//! propagating an error into the feed loop.
//!
//! The payload is serialized once per tick and shared across recipients.
//! Per-client ordering for a given instrument follows upstream arrival
//! order: the broadcaster runs on the single feed event loop and each
//! session channel is FIFO.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::cache::{Quote, QuoteCache};
use crate::domain::instrument::{Instrument, InstrumentSet};
use crate::domain::registry::ClientRegistry;
use crate::infrastructure::metrics;

// =============================================================================
// Downstream Wire Messages
// =============================================================================

/// Per-tick push to a downstream client.
///
/// ```json
/// {"index":"NIFTY","price":"22510.50","timestamp":"2026-08-07T09:15:00+00:00"}
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct TickPush {
    /// Downstream symbol of the instrument.
    pub index: String,
    /// Last traded price, rendered with two decimals.
    pub price: String,
    /// Observation timestamp.
    pub timestamp: DateTime<Utc>,
}

impl TickPush {
    /// Build the push for a cached quote.
    #[must_use]
    pub fn from_quote(instrument: &Instrument, quote: &Quote) -> Self {
        Self {
            index: instrument.symbol.clone(),
            price: format!("{:.2}", quote.price),
            timestamp: quote.timestamp,
        }
    }
}

/// Full price snapshot sent to a client on connect.
///
/// ```json
/// {"type":"snapshot","prices":{"NIFTY":"22510.50"},"timestamp":"..."}
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotPush {
    /// Message discriminator (always "snapshot").
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    /// Current price per symbol.
    pub prices: BTreeMap<String, String>,
    /// Time the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl SnapshotPush {
    /// Build a snapshot of the whole cache.
    #[must_use]
    pub fn from_cache(instruments: &InstrumentSet, cache: &QuoteCache) -> Self {
        let snapshot = cache.snapshot();
        let prices = snapshot
            .values()
            .filter_map(|quote| {
                instruments
                    .by_token(&quote.token)
                    .map(|instrument| (instrument.symbol.clone(), format!("{:.2}", quote.price)))
            })
            .collect();

        Self {
            msg_type: "snapshot",
            prices,
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Broadcaster
// =============================================================================

/// Result of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Sessions the payload was queued for.
    pub delivered: usize,
    /// Sessions dropped because their channel was full or closed.
    pub dropped: usize,
}

/// Pushes serialized ticks to interested sessions.
pub struct Broadcaster {
    instruments: Arc<InstrumentSet>,
    registry: Arc<ClientRegistry>,
}

impl Broadcaster {
    /// Create a broadcaster over the given registry.
    #[must_use]
    pub const fn new(instruments: Arc<InstrumentSet>, registry: Arc<ClientRegistry>) -> Self {
        Self {
            instruments,
            registry,
        }
    }

    /// Fan a quote out to every interested session.
    ///
    /// Quotes for instruments outside the configured universe are ignored
    /// (the cache rejects them before this point on the live path).
    pub fn broadcast(&self, quote: &Quote) -> BroadcastOutcome {
        let Some(instrument) = self.instruments.by_token(&quote.token) else {
            return BroadcastOutcome::default();
        };

        let push = TickPush::from_quote(instrument, quote);
        let payload: Arc<str> = match serde_json::to_string(&push) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize tick push");
                return BroadcastOutcome::default();
            }
        };

        let started = Instant::now();
        let mut outcome = BroadcastOutcome::default();

        for recipient in self.registry.recipients(&quote.token) {
            match recipient.sender.try_send(Arc::clone(&payload)) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_) | TrySendError::Closed(_)) => {
                    // Slow and closed clients get the same treatment:
                    // drop the session, keep the fan-out going.
                    self.registry.unregister(recipient.session_id);
                    tracing::warn!(
                        session_id = recipient.session_id,
                        index = %push.index,
                        "Dropping session after failed push"
                    );
                    outcome.dropped += 1;
                }
            }
        }

        if outcome.delivered > 0 {
            metrics::record_ticks_relayed(outcome.delivered as u64);
        }
        if outcome.dropped > 0 {
            metrics::record_sessions_dropped(outcome.dropped as u64);
            metrics::set_active_sessions(self.registry.len());
        }
        metrics::record_fanout_duration(started.elapsed());

        outcome
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::registry::SessionPayload;

    fn quote(token: &str, price: &str) -> Quote {
        Quote {
            token: token.to_string(),
            price: Decimal::from_str(price).unwrap(),
            timestamp: Utc::now(),
        }
    }

    fn setup() -> (Arc<InstrumentSet>, Arc<ClientRegistry>, Broadcaster) {
        let instruments = Arc::new(InstrumentSet::defaults());
        let registry = Arc::new(ClientRegistry::new(Arc::clone(&instruments)));
        let broadcaster = Broadcaster::new(Arc::clone(&instruments), Arc::clone(&registry));
        (instruments, registry, broadcaster)
    }

    #[tokio::test]
    async fn delivers_to_interested_sessions_only() {
        let (_, registry, broadcaster) = setup();

        let (tx_a, mut rx_a) = mpsc::channel::<SessionPayload>(8);
        let (tx_b, mut rx_b) = mpsc::channel::<SessionPayload>(8);
        let a = registry.register(tx_a);
        let b = registry.register(tx_b);
        registry.set_subscriptions(a, &["NIFTY".to_string()]);
        registry.set_subscriptions(b, &["BANKNIFTY".to_string()]);

        let outcome = broadcaster.broadcast(&quote("99926000", "22510.50"));
        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.dropped, 0);

        let payload = rx_a.recv().await.unwrap();
        assert!(payload.contains(r#""index":"NIFTY""#));
        assert!(payload.contains(r#""price":"22510.50""#));

        // The BANKNIFTY-only session saw nothing.
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_push_drops_only_that_session() {
        let (_, registry, broadcaster) = setup();

        let (tx_ok, mut rx_ok) = mpsc::channel::<SessionPayload>(8);
        let (tx_dead, rx_dead) = mpsc::channel::<SessionPayload>(8);
        let _ok = registry.register(tx_ok);
        let dead = registry.register(tx_dead);
        drop(rx_dead);

        let outcome = broadcaster.broadcast(&quote("99926000", "22500.00"));

        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.dropped, 1);
        assert!(rx_ok.recv().await.is_some());

        // The dead session is gone; the healthy one remains.
        assert_eq!(registry.len(), 1);
        assert!(registry.connected_at(dead).is_none());
    }

    #[tokio::test]
    async fn full_buffer_counts_as_failed_push() {
        let (_, registry, broadcaster) = setup();

        let (tx, _rx) = mpsc::channel::<SessionPayload>(1);
        let id = registry.register(tx);

        let first = broadcaster.broadcast(&quote("99926000", "1.00"));
        assert_eq!(first.delivered, 1);

        // Buffer of one is now full; the next push fails and drops the
        // session.
        let second = broadcaster.broadcast(&quote("99926000", "2.00"));
        assert_eq!(second.delivered, 0);
        assert_eq!(second.dropped, 1);
        assert!(registry.connected_at(id).is_none());
    }

    #[tokio::test]
    async fn unknown_token_is_ignored() {
        let (_, registry, broadcaster) = setup();
        let (tx, mut rx) = mpsc::channel::<SessionPayload>(8);
        registry.register(tx);

        let outcome = broadcaster.broadcast(&quote("12345", "1.00"));
        assert_eq!(outcome, BroadcastOutcome::default());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn same_instrument_pushes_preserve_order() {
        let (_, registry, broadcaster) = setup();
        let (tx, mut rx) = mpsc::channel::<SessionPayload>(8);
        registry.register(tx);

        broadcaster.broadcast(&quote("99926000", "22500.00"));
        broadcaster.broadcast(&quote("99926000", "22510.50"));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.contains("22500.00"));
        assert!(second.contains("22510.50"));
    }

    #[test]
    fn snapshot_covers_cached_instruments() {
        let instruments = Arc::new(InstrumentSet::defaults());
        let cache = QuoteCache::new(Arc::clone(&instruments));
        cache.update(
            "99926000",
            Decimal::from_str("22510.5").unwrap(),
            Utc::now(),
        );
        cache.update("9991", Decimal::from_str("81000").unwrap(), Utc::now());

        let snapshot = SnapshotPush::from_cache(&instruments, &cache);

        assert_eq!(snapshot.msg_type, "snapshot");
        assert_eq!(snapshot.prices["NIFTY"], "22510.50");
        assert_eq!(snapshot.prices["SENSEX"], "81000.00");
        assert!(!snapshot.prices.contains_key("FINNIFTY"));
    }

    #[test]
    fn tick_push_renders_two_decimals() {
        let instruments = InstrumentSet::defaults();
        let instrument = instruments.by_symbol("NIFTY").unwrap();
        let push = TickPush::from_quote(instrument, &quote("99926000", "22510.5"));
        assert_eq!(push.price, "22510.50");
    }
}

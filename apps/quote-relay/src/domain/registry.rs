//! Client Registry
//!
//! Tracks every connected downstream WebSocket session: its outbound
//! channel and the set of instruments it is interested in. Sessions are
//! created on connect and destroyed on disconnect; the registry is their
//! exclusive owner.
//!
//! Broadcast iteration is snapshot-then-iterate: recipients are collected
//! under the read lock and pushed to after it is released, so concurrent
//! registration and unregistration never invalidate an in-flight fan-out.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::instrument::{InstrumentSet, InstrumentToken};

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a downstream session.
pub type SessionId = u64;

/// Serialized message pushed to a session's outbound channel.
///
/// Payloads are serialized once per tick and shared across all
/// recipients; the per-session WebSocket task writes them to the socket.
pub type SessionPayload = Arc<str>;

/// State for one connected downstream client.
#[derive(Debug)]
struct ClientSession {
    sender: mpsc::Sender<SessionPayload>,
    interests: HashSet<InstrumentToken>,
    connected_at: DateTime<Utc>,
}

/// A broadcast recipient: the session and a clone of its channel.
#[derive(Debug, Clone)]
pub struct Recipient {
    /// Session the payload is addressed to.
    pub session_id: SessionId,
    /// Outbound channel for the session.
    pub sender: mpsc::Sender<SessionPayload>,
}

// =============================================================================
// Client Registry
// =============================================================================

/// Owner of all downstream session state.
///
/// Safe under concurrent access from client connect/disconnect tasks
/// (writers) and the broadcaster (reader). Lock order note: this lock is
/// never taken while holding the quote cache lock, and the cache lock is
/// never taken inside it.
#[derive(Debug)]
pub struct ClientRegistry {
    instruments: Arc<InstrumentSet>,
    next_id: AtomicU64,
    sessions: RwLock<HashMap<SessionId, ClientSession>>,
}

impl ClientRegistry {
    /// Create an empty registry bound to the configured universe.
    #[must_use]
    pub fn new(instruments: Arc<InstrumentSet>) -> Self {
        Self {
            instruments,
            next_id: AtomicU64::new(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session and return its id.
    ///
    /// A fresh session is interested in the full instrument universe until
    /// it sends an explicit subscribe request narrowing the set.
    pub fn register(&self, sender: mpsc::Sender<SessionPayload>) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let interests = self.instruments.tokens().iter().cloned().collect();

        self.sessions.write().insert(
            id,
            ClientSession {
                sender,
                interests,
                connected_at: Utc::now(),
            },
        );
        id
    }

    /// Remove a session. Idempotent: safe to call from both the disconnect
    /// handler and broadcast failure cleanup.
    ///
    /// Returns `true` if the session was still present.
    pub fn unregister(&self, id: SessionId) -> bool {
        self.sessions.write().remove(&id).is_some()
    }

    /// Replace a session's interest set.
    ///
    /// Symbols are resolved against the configured universe; unknown ones
    /// are ignored so the interest set always stays a subset of the
    /// instruments the cache tracks. Returns the number of instruments the
    /// session is now subscribed to, or `None` for an unknown session.
    pub fn set_subscriptions(&self, id: SessionId, symbols: &[String]) -> Option<usize> {
        let interests: HashSet<InstrumentToken> = symbols
            .iter()
            .filter_map(|symbol| self.instruments.by_symbol(symbol))
            .map(|instrument| instrument.token.clone())
            .collect();

        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&id)?;
        session.interests = interests;
        Some(session.interests.len())
    }

    /// Collect the recipients for a tick on `token`.
    ///
    /// Takes a snapshot of the matching sessions; callers push outside the
    /// lock.
    #[must_use]
    pub fn recipients(&self, token: &str) -> Vec<Recipient> {
        self.sessions
            .read()
            .iter()
            .filter(|(_, session)| session.interests.contains(token))
            .map(|(id, session)| Recipient {
                session_id: *id,
                sender: session.sender.clone(),
            })
            .collect()
    }

    /// Number of connected sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no client is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Connection time of a session, if it is still registered.
    #[must_use]
    pub fn connected_at(&self, id: SessionId) -> Option<DateTime<Utc>> {
        self.sessions.read().get(&id).map(|s| s.connected_at)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ClientRegistry {
        ClientRegistry::new(Arc::new(InstrumentSet::defaults()))
    }

    fn channel() -> (
        mpsc::Sender<SessionPayload>,
        mpsc::Receiver<SessionPayload>,
    ) {
        mpsc::channel(8)
    }

    #[test]
    fn register_assigns_unique_ids() {
        let registry = registry();
        let (tx, _rx) = channel();

        let a = registry.register(tx.clone());
        let b = registry.register(tx);

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn new_session_defaults_to_full_universe() {
        let registry = registry();
        let (tx, _rx) = channel();
        let id = registry.register(tx);

        assert_eq!(registry.recipients("99926000").len(), 1);
        assert_eq!(registry.recipients("9991").len(), 1);
        assert_eq!(registry.recipients("99926000")[0].session_id, id);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = registry();
        let (tx, _rx) = channel();
        let id = registry.register(tx);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn register_then_unregister_leaves_no_trace() {
        let registry = registry();
        let (tx, _rx) = channel();

        let before = registry.len();
        let id = registry.register(tx);
        registry.unregister(id);

        assert_eq!(registry.len(), before);
        assert!(registry.recipients("99926000").is_empty());
    }

    #[test]
    fn set_subscriptions_replaces_interest() {
        let registry = registry();
        let (tx, _rx) = channel();
        let id = registry.register(tx);

        let count = registry.set_subscriptions(id, &["BANKNIFTY".to_string()]);
        assert_eq!(count, Some(1));

        assert!(registry.recipients("99926000").is_empty());
        assert_eq!(registry.recipients("99926037").len(), 1);
    }

    #[test]
    fn unknown_symbols_are_filtered_out() {
        let registry = registry();
        let (tx, _rx) = channel();
        let id = registry.register(tx);

        let count =
            registry.set_subscriptions(id, &["NIFTY".to_string(), "DOWJONES".to_string()]);
        assert_eq!(count, Some(1));
        assert_eq!(registry.recipients("99926000").len(), 1);
    }

    #[test]
    fn set_subscriptions_unknown_session() {
        let registry = registry();
        assert_eq!(registry.set_subscriptions(42, &["NIFTY".to_string()]), None);
    }

    #[test]
    fn recipients_only_match_interested_sessions() {
        let registry = registry();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();

        let a = registry.register(tx_a);
        let b = registry.register(tx_b);
        registry.set_subscriptions(a, &["NIFTY".to_string()]);
        registry.set_subscriptions(b, &["BANKNIFTY".to_string()]);

        let nifty = registry.recipients("99926000");
        assert_eq!(nifty.len(), 1);
        assert_eq!(nifty[0].session_id, a);

        let banknifty = registry.recipients("99926037");
        assert_eq!(banknifty.len(), 1);
        assert_eq!(banknifty[0].session_id, b);
    }

    #[test]
    fn connected_at_tracks_lifetime() {
        let registry = registry();
        let (tx, _rx) = channel();
        let id = registry.register(tx);

        assert!(registry.connected_at(id).is_some());
        registry.unregister(id);
        assert!(registry.connected_at(id).is_none());
    }

    #[test]
    fn concurrent_register_unregister() {
        use std::thread;

        let registry = Arc::new(registry());
        let mut handles = vec![];

        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let (tx, _rx) = mpsc::channel(1);
                    let id = registry.register(tx);
                    let _ = registry.recipients("99926000");
                    registry.unregister(id);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.is_empty());
    }
}

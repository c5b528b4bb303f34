//! Quote Cache
//!
//! Process-wide last-known-price table, keyed by instrument token.
//! Written by the feed event loop, read concurrently by REST handlers and
//! the broadcaster.
//!
//! Updates are last-write-wins: a tick overwrites the prior value
//! unconditionally, with no staleness check against the timestamp of a
//! possibly-reordered upstream message. That is an accepted weakness of
//! the upstream protocol, not a guarantee this cache provides.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use super::instrument::{InstrumentSet, InstrumentToken};

/// A single cached price observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Upstream token of the instrument this quote belongs to.
    pub token: InstrumentToken,
    /// Last traded price.
    pub price: Decimal,
    /// Observation timestamp as reported by the feed.
    pub timestamp: DateTime<Utc>,
}

/// Last-known-price table for the configured instrument universe.
///
/// Reads never block writes and vice versa beyond the brief critical
/// section of the underlying `RwLock`; `snapshot()` clones the table so
/// callers iterate a stable copy.
#[derive(Debug)]
pub struct QuoteCache {
    instruments: Arc<InstrumentSet>,
    quotes: RwLock<HashMap<InstrumentToken, Quote>>,
}

impl QuoteCache {
    /// Create an empty cache bound to the configured instrument universe.
    #[must_use]
    pub fn new(instruments: Arc<InstrumentSet>) -> Self {
        Self {
            instruments,
            quotes: RwLock::new(HashMap::new()),
        }
    }

    /// Overwrite the cached quote for `token`.
    ///
    /// Returns `false` (and caches nothing) when the token is not part of
    /// the configured universe; ticks for unknown instruments are the
    /// caller's cue to log and drop.
    pub fn update(&self, token: &str, price: Decimal, timestamp: DateTime<Utc>) -> bool {
        if !self.instruments.contains_token(token) {
            return false;
        }

        self.quotes.write().insert(
            token.to_string(),
            Quote {
                token: token.to_string(),
                price,
                timestamp,
            },
        );
        true
    }

    /// Point-in-time copy of the whole table, safe for concurrent readers.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<InstrumentToken, Quote> {
        self.quotes.read().clone()
    }

    /// The current quote for a single token, if one has been observed.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<Quote> {
        self.quotes.read().get(token).cloned()
    }

    /// Number of instruments with at least one observed quote.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quotes.read().len()
    }

    /// Whether no quote has been observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quotes.read().is_empty()
    }

    /// The instrument universe this cache is bound to.
    #[must_use]
    pub fn instruments(&self) -> &Arc<InstrumentSet> {
        &self.instruments
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn cache() -> QuoteCache {
        QuoteCache::new(Arc::new(InstrumentSet::defaults()))
    }

    #[test]
    fn update_then_get() {
        let cache = cache();
        assert!(cache.update("99926000", dec("22500.00"), Utc::now()));

        let quote = cache.get("99926000").unwrap();
        assert_eq!(quote.price, dec("22500.00"));
        assert_eq!(quote.token, "99926000");
    }

    #[test]
    fn last_write_wins() {
        let cache = cache();
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(1);

        assert!(cache.update("99926000", dec("22500.00"), t1));
        assert!(cache.update("99926000", dec("22510.50"), t2));

        let snapshot = cache.snapshot();
        assert_eq!(snapshot["99926000"].price, dec("22510.50"));
        assert_eq!(snapshot["99926000"].timestamp, t2);
    }

    #[test]
    fn unknown_token_is_rejected() {
        let cache = cache();
        assert!(!cache.update("12345", dec("1.00"), Utc::now()));
        assert!(cache.is_empty());
    }

    #[test]
    fn snapshot_is_a_stable_copy() {
        let cache = cache();
        cache.update("99926000", dec("22500.00"), Utc::now());

        let snapshot = cache.snapshot();
        cache.update("99926000", dec("23000.00"), Utc::now());

        // The copy taken before the second update is unaffected by it.
        assert_eq!(snapshot["99926000"].price, dec("22500.00"));
        assert_eq!(cache.get("99926000").unwrap().price, dec("23000.00"));
    }

    #[test]
    fn len_counts_distinct_instruments() {
        let cache = cache();
        cache.update("99926000", dec("22500.00"), Utc::now());
        cache.update("99926000", dec("22501.00"), Utc::now());
        cache.update("99926037", dec("48000.00"), Utc::now());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_readers_see_latest_write() {
        use std::thread;

        let cache = Arc::new(cache());
        let writer = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..1_000i64 {
                    cache.update("99926000", Decimal::from(i), Utc::now());
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let mut last = Decimal::MIN;
                    for _ in 0..1_000 {
                        if let Some(quote) = cache.get("99926000") {
                            // Writes are monotonically increasing, so
                            // observed values must never go backwards.
                            assert!(quote.price >= last);
                            last = quote.price;
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(cache.get("99926000").unwrap().price, Decimal::from(999));
    }
}

//! Downstream Session Tokens
//!
//! Opaque tokens issued by the REST login exchange and required to open a
//! downstream WebSocket. Tokens are process-local and live until revoked
//! or the process restarts; they carry no upstream authority.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

/// Issues and validates downstream session tokens.
#[derive(Debug, Default)]
pub struct SessionTokenStore {
    tokens: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl SessionTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token.
    pub fn issue(&self) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.write().insert(token.clone(), Utc::now());
        token
    }

    /// Check whether a token was issued by this process.
    #[must_use]
    pub fn validate(&self, token: &str) -> bool {
        self.tokens.read().contains_key(token)
    }

    /// Revoke a token. Idempotent.
    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.write().remove(token).is_some()
    }

    /// Number of live tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    /// Whether no token is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_validate() {
        let store = SessionTokenStore::new();
        let token = store.issue();

        assert!(store.validate(&token));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_tokens_do_not_validate() {
        let store = SessionTokenStore::new();
        assert!(!store.validate("not-a-token"));
    }

    #[test]
    fn tokens_are_unique() {
        let store = SessionTokenStore::new();
        let a = store.issue();
        let b = store.issue();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn revoke_is_idempotent() {
        let store = SessionTokenStore::new();
        let token = store.issue();

        assert!(store.revoke(&token));
        assert!(!store.revoke(&token));
        assert!(!store.validate(&token));
        assert!(store.is_empty());
    }
}

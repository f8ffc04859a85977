//! Session state: token persistence and derived login status.
//!
//! The token lives behind a pluggable [`TokenStore`] so callers can back it
//! with whatever persistence medium they have (browser session storage,
//! keyring, a file). Login status is always recomputed from the current
//! token rather than trusted as cached state, so concurrent login/logout
//! sequences cannot leave a stale flag behind.

use std::sync::RwLock;

use tracing::debug;

/// Persistence for a single authentication token.
///
/// Implementations must not perform network calls; side effects are
/// confined to the persistence medium.
pub trait TokenStore: Send + Sync {
    /// Return the persisted token, if any.
    fn get(&self) -> Option<String>;

    /// Persist a token.
    fn set(&self, token: &str);

    /// Remove the persisted token.
    fn clear(&self);
}

/// In-memory token store, used by default and in tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a token.
    pub fn with_token(token: &str) -> Self {
        Self {
            token: RwLock::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token.read().map(|t| t.clone()).unwrap_or_default()
    }

    fn set(&self, token: &str) {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.to_string());
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
    }
}

/// Process-wide session: one token, one username.
///
/// Constructed once at client startup and shared by reference with the
/// request gateway.
pub struct Session {
    store: Box<dyn TokenStore>,
    username: RwLock<String>,
}

impl Session {
    pub fn new(store: Box<dyn TokenStore>) -> Self {
        Self {
            store,
            username: RwLock::new(String::new()),
        }
    }

    /// The persisted token, or the empty string when absent.
    pub fn token(&self) -> String {
        self.store.get().unwrap_or_default()
    }

    /// Persist a token. An empty token clears the store instead.
    pub fn set_token(&self, token: &str) {
        if token.is_empty() {
            debug!("clearing session token");
            self.store.clear();
        } else {
            self.store.set(token);
        }
    }

    /// Whether a token is currently present. Recomputed on every call.
    pub fn is_logged_in(&self) -> bool {
        !self.token().is_empty()
    }

    pub fn username(&self) -> String {
        self.username.read().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn set_username(&self, username: &str) {
        if let Ok(mut slot) = self.username.write() {
            *slot = username.to_string();
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Box::new(MemoryTokenStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let session = Session::default();
        assert_eq!(session.token(), "");
        assert!(!session.is_logged_in());

        session.set_token("abc");
        assert_eq!(session.token(), "abc");
        assert!(session.is_logged_in());

        session.set_token("");
        assert_eq!(session.token(), "");
        assert!(!session.is_logged_in());
    }

    #[test]
    fn test_login_state_matches_token_for_all_sequences() {
        let session = Session::default();
        for token in ["a", "", "b", "b", "", ""] {
            session.set_token(token);
            assert_eq!(session.is_logged_in(), !session.token().is_empty());
            assert_eq!(session.token(), token);
        }
    }

    #[test]
    fn test_preseeded_store() {
        let session = Session::new(Box::new(MemoryTokenStore::with_token("seed")));
        assert!(session.is_logged_in());
        assert_eq!(session.token(), "seed");
    }

    #[test]
    fn test_username() {
        let session = Session::default();
        assert_eq!(session.username(), "");
        session.set_username("alice");
        assert_eq!(session.username(), "alice");
    }
}

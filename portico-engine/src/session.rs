//! Per-session key/value storage boundary.
//!
//! The engine only needs get/set/has semantics keyed by an opaque session
//! identifier; the backing store (in-memory map, external cache) is the
//! surrounding service's choice.

use std::collections::HashMap;
use std::sync::RwLock;

use portico_core::SessionId;

/// Narrow storage interface the security gate works against.
///
/// Implementations must be `Send + Sync`; calls may block on external I/O.
pub trait SessionStore: Send + Sync {
    /// Read one value from the session, if set.
    fn get(&self, session: &SessionId, key: &str) -> Option<String>;

    /// Write one value into the session, replacing any previous value.
    fn set(&self, session: &SessionId, key: &str, value: String);

    /// Whether the session has any value under the key.
    fn has(&self, session: &SessionId, key: &str) -> bool {
        self.get(session, key).is_some()
    }
}

/// Process-local session store backed by a locked map.
///
/// Concurrent requests sharing one session can race on access-key rotation;
/// the store locks per operation, not per session, so unrelated sessions
/// never block each other.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, HashMap<String, String>>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    fn get(&self, session: &SessionId, key: &str) -> Option<String> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.sessions
            .read()
            .expect("session store read lock poisoned")
            .get(session)
            .and_then(|record| record.get(key).cloned())
    }

    /// # Panics
    /// Panics if the internal `RwLock` is poisoned.
    fn set(&self, session: &SessionId, key: &str, value: String) {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.sessions
            .write()
            .expect("session store write lock poisoned")
            .entry(*session)
            .or_default()
            .insert(key.to_owned(), value);
    }
}

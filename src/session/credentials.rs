//! Credential pair and the process-wide session that caches it.

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::session::store::{KeyValueStore, StoreError};

/// Access/refresh token pair as issued by `/auth/login` and `/auth/refresh`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

// Tokens never reach logs.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// On-disk shape. Both fields optional so a partial record can be detected
/// instead of failing deserialization.
#[derive(Deserialize)]
struct StoredRecord {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Errors raised while persisting the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Credential pair is incomplete")]
    Incomplete,
}

/// Process-wide session: the durable record plus its in-memory cache.
pub struct Session {
    store: Arc<dyn KeyValueStore>,
    key: String,
    current: ArcSwapOption<CredentialPair>,
}

impl Session {
    /// Create a session with an empty cache. Call [`Session::reload`] to pick
    /// up a persisted record.
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            current: ArcSwapOption::empty(),
        }
    }

    /// Create a session and populate the cache from storage.
    pub fn restore(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let session = Self::new(store, key);
        session.reload();
        session
    }

    /// Re-derive the cache from storage and return what was found.
    pub fn reload(&self) -> Option<CredentialPair> {
        let pair = self.read_record();
        self.current.store(pair.clone().map(Arc::new));
        pair
    }

    fn read_record(&self) -> Option<CredentialPair> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to read session record");
                return None;
            }
        };

        let record: StoredRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Unreadable session record, treating as logged out");
                return None;
            }
        };

        match (record.access_token, record.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(CredentialPair::new(access, refresh))
            }
            _ => {
                tracing::warn!(key = %self.key, "Partial session record, treating as logged out");
                None
            }
        }
    }

    /// Current pair from the in-memory cache.
    pub fn current(&self) -> Option<Arc<CredentialPair>> {
        self.current.load_full()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current.load_full().map(|p| p.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.current.load_full().map(|p| p.refresh_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.load().is_some()
    }

    /// Persist `pair` and then publish it to the cache.
    ///
    /// The cache is updated even when the write fails so in-flight work keeps
    /// going; the error is returned for the caller to report.
    pub fn replace(&self, pair: CredentialPair) -> Result<(), SessionError> {
        if !pair.is_complete() {
            return Err(SessionError::Incomplete);
        }

        let persisted = serde_json::to_string(&pair)
            .map_err(StoreError::from)
            .and_then(|raw| self.store.set(&self.key, &raw));

        self.current.store(Some(Arc::new(pair)));

        persisted.map_err(|e| {
            tracing::error!(key = %self.key, error = %e, "Failed to persist session");
            SessionError::Store(e)
        })
    }

    /// Remove the record from storage and drop the cached pair.
    pub fn clear(&self) -> Result<(), SessionError> {
        let removed = self.store.remove(&self.key);
        self.current.store(None);

        removed.map_err(|e| {
            tracing::error!(key = %self.key, error = %e, "Failed to clear persisted session");
            SessionError::Store(e)
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

//! Port for persisted conversation history.
//!
//! Records are keyed by agent name and session id. A record is always
//! loaded whole and saved whole; there are no partial updates.

use crate::conversation::domain::{Message, SessionKey};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for session store operations.
pub type SessionStoreResult<T> = Result<T, SessionStoreError>;

/// Storage for conversation history.
///
/// # Implementation Notes
///
/// - `load` returns an empty history for an unknown key.
/// - `save` replaces the whole record atomically from the reader's view.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the history stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError`] when the record exists but cannot be
    /// read or decoded.
    async fn load(&self, key: &SessionKey) -> SessionStoreResult<Vec<Message>>;

    /// Replaces the history stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError`] when the record cannot be written.
    async fn save(&self, key: &SessionKey, messages: &[Message]) -> SessionStoreResult<()>;
}

/// Errors returned by session stores.
#[derive(Debug, Clone, Error)]
pub enum SessionStoreError {
    /// A stored record could not be decoded.
    #[error("session record {key} is corrupt: {reason}")]
    Corrupt {
        /// Session key.
        key: String,
        /// Decode failure detail.
        reason: String,
    },

    /// Internal store state is unusable.
    #[error("session store lock poisoned: {0}")]
    LockPoisoned(String),

    /// Storage backend failure.
    #[error("session persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl SessionStoreError {
    /// Wraps a storage backend error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

//! In-memory implementation of the `SessionStore` port.
//!
//! Thread-safe and process-local. Suitable for tests and for runs that do
//! not need history to survive a restart.

use crate::conversation::domain::{Message, SessionKey};
use crate::conversation::ports::{SessionStore, SessionStoreError, SessionStoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory implementation of [`SessionStore`].
///
/// Clones share the same records.
///
/// # Example
///
/// ```
/// use palladio::conversation::adapters::InMemorySessionStore;
///
/// let store = InMemorySessionStore::new();
/// assert!(store.is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    records: Arc<RwLock<HashMap<SessionKey, Vec<Message>>>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    ///
    /// Returns `0` if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Returns `true` if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, key: &SessionKey) -> SessionStoreResult<Vec<Message>> {
        let guard = self
            .records
            .read()
            .map_err(|err| SessionStoreError::LockPoisoned(err.to_string()))?;
        Ok(guard.get(key).cloned().unwrap_or_default())
    }

    async fn save(&self, key: &SessionKey, messages: &[Message]) -> SessionStoreResult<()> {
        let mut guard = self
            .records
            .write()
            .map_err(|err| SessionStoreError::LockPoisoned(err.to_string()))?;
        guard.insert(key.clone(), messages.to_vec());
        Ok(())
    }
}

//! File-backed implementation of the `SessionStore` port.
//!
//! Each record is one JSON document at `<root>/<agent>/<session>.json`. All
//! access goes through a capability-scoped [`Dir`], so a store can never
//! reach outside its root. Writes land in a temporary file that is renamed
//! over the record, which keeps readers from observing half-written JSON.

use crate::conversation::domain::{Message, SessionKey};
use crate::conversation::ports::{SessionStore, SessionStoreError, SessionStoreResult};
use async_trait::async_trait;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
struct SessionRecord {
    agent: String,
    session: String,
    messages: Vec<Message>,
}

/// File-backed implementation of [`SessionStore`].
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: Arc<Dir>,
}

impl FileSessionStore {
    /// Opens a store rooted at `path`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::Persistence`] when the directory cannot
    /// be created or opened.
    pub fn open(path: &Utf8Path) -> SessionStoreResult<Self> {
        Dir::create_ambient_dir_all(path, ambient_authority())
            .map_err(SessionStoreError::persistence)?;
        let root =
            Dir::open_ambient_dir(path, ambient_authority()).map_err(SessionStoreError::persistence)?;
        Ok(Self::from_dir(root))
    }

    /// Wraps an already opened directory.
    #[must_use]
    pub fn from_dir(root: Dir) -> Self {
        Self {
            root: Arc::new(root),
        }
    }
}

fn record_file(key: &SessionKey) -> String {
    format!("{}.json", key.session())
}

fn load_record(root: &Dir, key: &SessionKey) -> SessionStoreResult<Vec<Message>> {
    let agent_dir = match root.open_dir(key.agent()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(SessionStoreError::persistence(err)),
    };
    let contents = match agent_dir.read_to_string(record_file(key)) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(SessionStoreError::persistence(err)),
    };
    let record: SessionRecord =
        serde_json::from_str(&contents).map_err(|err| SessionStoreError::Corrupt {
            key: key.to_string(),
            reason: err.to_string(),
        })?;
    Ok(record.messages)
}

fn save_record(root: &Dir, key: &SessionKey, messages: Vec<Message>) -> SessionStoreResult<()> {
    root.create_dir_all(key.agent())
        .map_err(SessionStoreError::persistence)?;
    let agent_dir = root
        .open_dir(key.agent())
        .map_err(SessionStoreError::persistence)?;
    let record = SessionRecord {
        agent: key.agent().to_owned(),
        session: key.session().to_string(),
        messages,
    };
    let encoded = serde_json::to_vec_pretty(&record).map_err(SessionStoreError::persistence)?;
    let staging = format!(".{}.{}.tmp", key.session(), Uuid::new_v4());
    agent_dir
        .write(&staging, encoded)
        .map_err(SessionStoreError::persistence)?;
    agent_dir
        .rename(&staging, &agent_dir, record_file(key))
        .map_err(SessionStoreError::persistence)
}

async fn run_blocking<F, T>(operation: F) -> SessionStoreResult<T>
where
    F: FnOnce() -> SessionStoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(SessionStoreError::persistence)?
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, key: &SessionKey) -> SessionStoreResult<Vec<Message>> {
        let root = Arc::clone(&self.root);
        let owned_key = key.clone();
        run_blocking(move || load_record(&root, &owned_key)).await
    }

    async fn save(&self, key: &SessionKey, messages: &[Message]) -> SessionStoreResult<()> {
        let root = Arc::clone(&self.root);
        let owned_key = key.clone();
        let owned_messages = messages.to_vec();
        run_blocking(move || save_record(&root, &owned_key, owned_messages)).await?;
        tracing::debug!(session = %key, messages = messages.len(), "session record saved");
        Ok(())
    }
}

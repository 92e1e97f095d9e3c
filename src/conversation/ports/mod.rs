//! Ports for the conversation loop's external collaborators.

pub mod model;
pub mod session;

pub use model::{ModelClient, ModelError, ModelResponse, RequestedCall};
pub use session::{SessionStore, SessionStoreError, SessionStoreResult};
#[cfg(test)]
pub use session::MockSessionStore;

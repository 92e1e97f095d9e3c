//! Port for the language model the loop drives.
//!
//! The runtime does not define a model-calling protocol; adapters translate
//! the message history and the filtered capability listing into whatever
//! their backend expects.

use crate::conversation::domain::Message;
use crate::provider::domain::CapabilityKind;
use crate::routing::domain::CapabilityListing;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// A language model that answers one turn at a time.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Sends the full conversation and the visible capabilities, returning
    /// either a final answer or capability calls.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] when the backend cannot produce a response.
    async fn complete(
        &self,
        messages: &[Message],
        capabilities: &[CapabilityListing],
    ) -> Result<ModelResponse, ModelError>;
}

/// One capability call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedCall {
    /// Backend-assigned call identifier. The loop assigns one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Capability kind.
    pub kind: CapabilityKind,
    /// Capability name.
    pub name: String,
    /// Call arguments.
    #[serde(default)]
    pub arguments: Value,
}

impl RequestedCall {
    /// Creates a call of the given kind.
    #[must_use]
    pub fn new(kind: CapabilityKind, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: None,
            kind,
            name: name.into(),
            arguments,
        }
    }

    /// Creates a tool call.
    #[must_use]
    pub fn tool(name: impl Into<String>, arguments: Value) -> Self {
        Self::new(CapabilityKind::Tool, name, arguments)
    }

    /// Sets the backend call identifier.
    #[must_use]
    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }
}

/// A model's answer to one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelResponse {
    /// A final answer that ends the run.
    Answer {
        /// Answer text.
        text: String,
    },
    /// Capability calls to dispatch before the next turn.
    Calls {
        /// Text produced alongside the calls.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Calls in the order the model requested them.
        calls: Vec<RequestedCall>,
    },
}

impl ModelResponse {
    /// Creates a final answer.
    #[must_use]
    pub fn answer(text: impl Into<String>) -> Self {
        Self::Answer { text: text.into() }
    }

    /// Creates a response carrying calls and no text.
    #[must_use]
    pub const fn calls(calls: Vec<RequestedCall>) -> Self {
        Self::Calls { text: None, calls }
    }

    /// Creates a response carrying a single tool call.
    #[must_use]
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self::calls(vec![RequestedCall::tool(name, arguments)])
    }
}

/// Errors reported by a model client.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// A scripted client ran out of responses.
    #[error("model script exhausted after {0} responses")]
    ScriptExhausted(usize),

    /// The backend refused the request.
    #[error("model rejected the request: {0}")]
    Rejected(String),

    /// Internal client state is unusable.
    #[error("model client state lock poisoned: {0}")]
    LockPoisoned(String),

    /// Transport or backend failure.
    #[error("model backend failure: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl ModelError {
    /// Wraps a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }
}

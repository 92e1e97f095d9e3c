//! Run results returned by the conversation loop.

use crate::conversation::domain::{
    ConversationDomainError, ConversationState, LoopState, Message, Role, RunId, RunStatus,
};
use crate::conversation::ports::ModelError;
use crate::host::HostError;
use thiserror::Error;

/// Failure that ended a run with [`RunStatus::Failed`].
///
/// Capability failures never appear here; they are fed back to the model as
/// tool results.
#[derive(Debug, Clone, Error)]
pub enum LoopError {
    /// The model client failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The capability listing could not be produced.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The model response could not be turned into a message.
    #[error(transparent)]
    Message(#[from] ConversationDomainError),
}

/// Result of one loop run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Identifier of the run.
    pub run_id: RunId,
    /// Terminal status.
    pub status: RunStatus,
    /// Number of model calls made.
    pub iterations: u32,
    /// Full conversation, system instructions included.
    pub conversation: ConversationState,
    /// Failure detail when `status` is [`RunStatus::Failed`].
    pub error: Option<LoopError>,
}

impl LoopOutcome {
    /// Returns the terminal loop state.
    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.status.final_state()
    }

    /// Returns the model's final answer when the run completed.
    #[must_use]
    pub fn final_message(&self) -> Option<&Message> {
        if !self.status.is_completed() {
            return None;
        }
        self.conversation
            .last()
            .filter(|message| message.role() == Role::Assistant)
    }

    /// Returns the full conversation, system instructions included.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    /// Returns the history to persist: everything except system messages.
    #[must_use]
    pub fn history(&self) -> Vec<Message> {
        self.conversation.persistable()
    }
}

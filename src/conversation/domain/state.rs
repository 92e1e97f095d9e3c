//! Conversation state and loop state machine types.

use super::{Message, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered, append-only message history of one run.
///
/// There is no way to remove or replace a message once appended, so any
/// prefix observed earlier in a run is still a prefix at the end of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    /// Creates an empty state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Appends a message.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Appends every message in order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// Returns the messages in append order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns whether the state holds no messages.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Consumes the state, returning its messages.
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Returns the history suitable for persistence: every message except
    /// system instructions, which are re-rendered on each run.
    #[must_use]
    pub fn persistable(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|message| message.role() != Role::System)
            .cloned()
            .collect()
    }
}

/// States of the conversation loop.
///
/// `Idle -> Thinking -> {ToolDispatch -> Thinking}* -> Done | Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Seeding the conversation.
    Idle,
    /// Waiting on the model.
    Thinking,
    /// Invoking requested capabilities.
    ToolDispatch,
    /// The model gave a final answer.
    Done,
    /// The run stopped before a final answer.
    Aborted,
}

impl LoopState {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::ToolDispatch => "tool_dispatch",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    /// Returns whether the state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Terminal status of a run.
///
/// Only [`RunStatus::Completed`] ends in [`LoopState::Done`]; every other
/// status ends in [`LoopState::Aborted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model produced a final answer.
    Completed,
    /// The iteration cap was reached before a final answer.
    Incomplete,
    /// The observer went away or the cancellation token fired.
    Cancelled,
    /// The run deadline passed.
    TimedOut,
    /// The model client failed.
    Failed,
}

impl RunStatus {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        }
    }

    /// Returns whether the run completed with a final answer.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns the loop state a run with this status ends in.
    #[must_use]
    pub const fn final_state(self) -> LoopState {
        match self {
            Self::Completed => LoopState::Done,
            Self::Incomplete | Self::Cancelled | Self::TimedOut | Self::Failed => {
                LoopState::Aborted
            }
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockable::DefaultClock;
    use rstest::rstest;

    #[rstest]
    fn appending_keeps_earlier_prefix() {
        let mut state = ConversationState::new();
        state.append(Message::system("be brief", &DefaultClock));
        state.append(Message::user("hi", &DefaultClock));
        let before = state.messages().to_vec();

        state.append(Message::assistant("hello", &DefaultClock));

        assert_eq!(state.len(), before.len() + 1);
        assert_eq!(state.messages().get(..before.len()), Some(before.as_slice()));
    }

    #[rstest]
    fn persistable_history_skips_system_messages() {
        let mut state = ConversationState::new();
        state.append(Message::system("be brief", &DefaultClock));
        state.append(Message::user("hi", &DefaultClock));

        let history = state.persistable();

        assert_eq!(history.len(), 1);
        assert!(history.iter().all(|message| message.role() == Role::User));
    }

    #[rstest]
    #[case(RunStatus::Completed, LoopState::Done)]
    #[case(RunStatus::Incomplete, LoopState::Aborted)]
    #[case(RunStatus::Cancelled, LoopState::Aborted)]
    #[case(RunStatus::TimedOut, LoopState::Aborted)]
    #[case(RunStatus::Failed, LoopState::Aborted)]
    fn statuses_map_to_terminal_states(#[case] status: RunStatus, #[case] expected: LoopState) {
        assert_eq!(status.final_state(), expected);
        assert!(expected.is_terminal());
    }
}

//! Role-tagged conversation messages.

use super::{
    ContentPart, ConversationDomainError, MessageId, TextPart, ToolCallPart, ToolResultPart,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Rendered agent instructions.
    System,
    /// Input from the caller.
    User,
    /// Model output, either a final answer or capability calls.
    Assistant,
    /// The outcome of one capability call.
    ToolResult,
}

impl Role {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::ToolResult => "tool_result",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A message within a conversation.
///
/// Messages are immutable after construction. Tool-result messages carry the
/// `tool_call_id` of the call they answer.
///
/// # Examples
///
/// ```
/// use palladio::conversation::domain::{Message, Role};
/// use mockable::DefaultClock;
///
/// let message = Message::user("What's the weather in Paris?", &DefaultClock);
/// assert_eq!(message.role(), Role::User);
/// assert_eq!(message.text(), "What's the weather in Paris?");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a message from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationDomainError::EmptyContent`] when `content` is
    /// empty.
    pub fn new(
        role: Role,
        content: Vec<ContentPart>,
        clock: &impl Clock,
    ) -> Result<Self, ConversationDomainError> {
        if content.is_empty() {
            return Err(ConversationDomainError::EmptyContent);
        }
        Ok(Self {
            id: MessageId::new(),
            role,
            content,
            tool_call_id: None,
            created_at: clock.utc(),
        })
    }

    /// Creates a system message holding rendered instructions.
    #[must_use]
    pub fn system(text: impl Into<String>, clock: &impl Clock) -> Self {
        Self::text_message(Role::System, text.into(), clock)
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(text: impl Into<String>, clock: &impl Clock) -> Self {
        Self::text_message(Role::User, text.into(), clock)
    }

    /// Creates an assistant message holding a final answer.
    #[must_use]
    pub fn assistant(text: impl Into<String>, clock: &impl Clock) -> Self {
        Self::text_message(Role::Assistant, text.into(), clock)
    }

    /// Creates an assistant message carrying capability calls, optionally
    /// preceded by text the model produced alongside them.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationDomainError::EmptyContent`] when there is
    /// neither text nor a call.
    pub fn assistant_calls(
        text: Option<String>,
        calls: Vec<ToolCallPart>,
        clock: &impl Clock,
    ) -> Result<Self, ConversationDomainError> {
        let content = text
            .filter(|value| !value.is_empty())
            .map(|value| ContentPart::Text(TextPart::new(value)))
            .into_iter()
            .chain(calls.into_iter().map(ContentPart::ToolCall))
            .collect();
        Self::new(Role::Assistant, content, clock)
    }

    /// Creates a tool-result message answering one call.
    #[must_use]
    pub fn tool_result(result: ToolResultPart, clock: &impl Clock) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::ToolResult,
            tool_call_id: Some(result.call_id.clone()),
            content: vec![ContentPart::ToolResult(result)],
            created_at: clock.utc(),
        }
    }

    fn text_message(role: Role, text: String, clock: &impl Clock) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: vec![ContentPart::Text(TextPart { text })],
            tool_call_id: None,
            created_at: clock.utc(),
        }
    }

    /// Returns the message identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the message role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns the content parts.
    #[must_use]
    pub fn content(&self) -> &[ContentPart] {
        &self.content
    }

    /// Returns the call identifier answered by a tool-result message.
    #[must_use]
    pub fn tool_call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns every text part joined with newlines.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.text.as_str()),
                ContentPart::ToolCall(_) | ContentPart::ToolResult(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns the capability calls carried by the message.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallPart> {
        self.content.iter().filter_map(|part| match part {
            ContentPart::ToolCall(call) => Some(call),
            ContentPart::Text(_) | ContentPart::ToolResult(_) => None,
        })
    }

    /// Returns the capability result carried by a tool-result message.
    #[must_use]
    pub fn tool_result_part(&self) -> Option<&ToolResultPart> {
        self.content.iter().find_map(|part| match part {
            ContentPart::ToolResult(result) => Some(result),
            ContentPart::Text(_) | ContentPart::ToolCall(_) => None,
        })
    }
}

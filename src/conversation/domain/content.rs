//! Typed content parts carried by conversation messages.

use super::ConversationDomainError;
use crate::provider::domain::CapabilityKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single content part within a message.
///
/// Parts are serialised with a `type` tag:
///
/// ```json
/// { "type": "text", "text": "Sunny, 20C" }
/// { "type": "tool_call", "call_id": "call-1-0", "name": "lookup", "kind": "tool", "arguments": {} }
/// { "type": "tool_result", "call_id": "call-1-0", "outcome": { "ok": true, "payload": "Sunny" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text(TextPart),
    /// A capability call requested by the model.
    ToolCall(ToolCallPart),
    /// The outcome of a capability call.
    ToolResult(ToolResultPart),
}

impl ContentPart {
    /// Creates a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextPart::new(text))
    }
}

/// Text content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPart {
    /// The text.
    pub text: String,
}

impl TextPart {
    /// Creates a text part.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A capability call requested by the model.
///
/// `call_id` links the call to the `tool_result` message that answers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPart {
    /// Identifier matching the call with its result.
    pub call_id: String,
    /// Capability name.
    pub name: String,
    /// Capability kind.
    pub kind: CapabilityKind,
    /// Call arguments.
    pub arguments: Value,
}

impl ToolCallPart {
    /// Creates a call part.
    #[must_use]
    pub fn new(
        call_id: impl Into<String>,
        kind: CapabilityKind,
        name: impl Into<String>,
        arguments: Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            kind,
            arguments,
        }
    }
}

/// The outcome of one capability call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPart {
    /// Identifier of the call this result answers.
    pub call_id: String,
    /// Payload or structured error.
    pub outcome: CapabilityOutcome,
}

impl ToolResultPart {
    /// Creates a result part.
    #[must_use]
    pub fn new(call_id: impl Into<String>, outcome: CapabilityOutcome) -> Self {
        Self {
            call_id: call_id.into(),
            outcome,
        }
    }
}

/// Structured error reported for a failed capability call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeError {
    /// Stable machine-readable kind such as `not_permitted`.
    pub kind: String,
    /// Human-readable detail.
    pub message: String,
}

impl OutcomeError {
    /// Creates an outcome error.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Result of a capability invocation as the model sees it.
///
/// Serialises as `{"ok": true, "payload": ...}` or
/// `{"ok": false, "error": {"kind": ..., "message": ...}}`.
///
/// # Examples
///
/// ```
/// use palladio::conversation::domain::CapabilityOutcome;
/// use serde_json::json;
///
/// let outcome = CapabilityOutcome::Success(json!("Sunny, 20C"));
/// assert_eq!(
///     serde_json::to_value(&outcome).expect("serialisable"),
///     json!({"ok": true, "payload": "Sunny, 20C"})
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "OutcomeWire", try_from = "OutcomeWire")]
pub enum CapabilityOutcome {
    /// The provider returned a payload.
    Success(Value),
    /// The call failed before or during invocation.
    Failure(OutcomeError),
}

impl CapabilityOutcome {
    /// Returns whether the call succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the payload of a successful call.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Failure(_) => None,
        }
    }

    /// Returns the error of a failed call.
    #[must_use]
    pub const fn error(&self) -> Option<&OutcomeError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct OutcomeWire {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<OutcomeError>,
}

impl From<CapabilityOutcome> for OutcomeWire {
    fn from(outcome: CapabilityOutcome) -> Self {
        match outcome {
            CapabilityOutcome::Success(payload) => Self {
                ok: true,
                payload: Some(payload),
                error: None,
            },
            CapabilityOutcome::Failure(error) => Self {
                ok: false,
                payload: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<OutcomeWire> for CapabilityOutcome {
    type Error = ConversationDomainError;

    fn try_from(wire: OutcomeWire) -> Result<Self, Self::Error> {
        if wire.ok {
            return Ok(Self::Success(wire.payload.unwrap_or(Value::Null)));
        }
        wire.error
            .map(Self::Failure)
            .ok_or(ConversationDomainError::MissingOutcomeError)
    }
}

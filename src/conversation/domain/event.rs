//! Streaming events emitted by the conversation loop.

use super::{LoopState, ToolCallPart, ToolResultPart};
use serde::{Deserialize, Serialize};

/// One observable step of a streaming run.
///
/// Events are emitted in execution order. For a turn with capability calls
/// the sequence is `turn-start`, optional `text-delta`, one `tool-call` per
/// call, one `tool-result` per call in request order, then `turn-end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum LoopEvent {
    /// A model call is about to be made.
    TurnStart {
        /// One-based turn number.
        turn: u32,
    },
    /// Text produced by the model.
    TextDelta {
        /// Turn number.
        turn: u32,
        /// The text.
        text: String,
    },
    /// A capability call is being dispatched.
    ToolCall {
        /// Turn number.
        turn: u32,
        /// The requested call.
        call: ToolCallPart,
    },
    /// A capability call finished.
    ToolResult {
        /// Turn number.
        turn: u32,
        /// The call outcome.
        result: ToolResultPart,
    },
    /// The turn finished.
    TurnEnd {
        /// Turn number.
        turn: u32,
        /// State the loop moves to after this turn.
        next: LoopState,
    },
}

impl LoopEvent {
    /// Returns the turn the event belongs to.
    #[must_use]
    pub const fn turn(&self) -> u32 {
        match self {
            Self::TurnStart { turn }
            | Self::TextDelta { turn, .. }
            | Self::ToolCall { turn, .. }
            | Self::ToolResult { turn, .. }
            | Self::TurnEnd { turn, .. } => *turn,
        }
    }

    /// Returns the wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TurnStart { .. } => "turn-start",
            Self::TextDelta { .. } => "text-delta",
            Self::ToolCall { .. } => "tool-call",
            Self::ToolResult { .. } => "tool-result",
            Self::TurnEnd { .. } => "turn-end",
        }
    }
}

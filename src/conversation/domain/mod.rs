//! Domain types for conversations.
//!
//! Pure data with no infrastructure dependencies. Messages are immutable
//! once built and the conversation state only ever grows.

mod content;
mod error;
mod event;
mod ids;
mod message;
mod state;

pub use content::{
    CapabilityOutcome, ContentPart, OutcomeError, TextPart, ToolCallPart, ToolResultPart,
};
pub use error::ConversationDomainError;
pub use event::LoopEvent;
pub use ids::{MessageId, RunId, SessionId, SessionKey};
pub use message::{Message, Role};
pub use state::{ConversationState, LoopState, RunStatus};

//! Conversation loop services.

mod conversation_loop;
mod dispatch;
mod outcome;


pub use conversation_loop::{ConversationLoop, LoopSeed};
pub use outcome::{LoopError, LoopOutcome};

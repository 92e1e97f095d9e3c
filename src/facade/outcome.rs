//! Facade run results.

use crate::conversation::domain::{Message, RunId, RunStatus};
use crate::conversation::services::{LoopError, LoopOutcome};

/// Result of one agent run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Agent that ran.
    pub agent: String,
    /// Run identifier, matching the loop's log lines.
    pub run_id: RunId,
    /// Terminal status.
    pub status: RunStatus,
    /// Number of model calls made.
    pub iterations: u32,
    /// The final answer when the run completed.
    pub final_message: Option<Message>,
    /// Full conversation, system instructions included.
    pub messages: Vec<Message>,
    /// Failure detail when the run failed.
    pub error: Option<LoopError>,
}

impl RunOutcome {
    pub(super) fn from_loop(agent: &str, outcome: LoopOutcome) -> Self {
        let final_message = outcome.final_message().cloned();
        let messages = outcome.messages().to_vec();
        Self {
            agent: agent.to_owned(),
            run_id: outcome.run_id,
            status: outcome.status,
            iterations: outcome.iterations,
            final_message,
            messages,
            error: outcome.error,
        }
    }

    /// Returns the final answer's text, or an empty string when there is
    /// none.
    #[must_use]
    pub fn final_text(&self) -> String {
        self.final_message
            .as_ref()
            .map(Message::text)
            .unwrap_or_default()
    }
}

//! Workflow configuration.

use serde::{Deserialize, Serialize};

/// A named sequence of agent runs.
///
/// Each step receives the previous step's final answer as its user message;
/// the first step receives the workflow input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Unique workflow name.
    pub name: String,
    /// Agent names, run in order.
    pub steps: Vec<String>,
}

impl WorkflowConfig {
    /// Creates a workflow.
    #[must_use]
    pub fn new(name: impl Into<String>, steps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            steps: steps.into_iter().map(Into::into).collect(),
        }
    }
}

//! Facade error types.

use super::RunOutcome;
use crate::config::{ConfigRepositoryError, InstructionTemplateError};
use crate::conversation::domain::ConversationDomainError;
use crate::conversation::ports::SessionStoreError;
use crate::host::{HostError, RegisterError};
use crate::provider::domain::ProviderId;
use crate::routing::domain::ProfileError;
use thiserror::Error;

/// Errors that abort a facade call before or after the loop runs.
///
/// Failures inside a run (capability errors, denials) are fed back to the
/// model and never surface here; model failures are reported through the
/// outcome status.
#[derive(Debug, Clone, Error)]
pub enum FacadeError {
    /// No agent is configured under the name.
    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    /// No workflow is configured under the name.
    #[error("unknown workflow '{0}'")]
    UnknownWorkflow(String),

    /// The workflow has no steps.
    #[error("workflow '{0}' has no steps")]
    EmptyWorkflow(String),

    /// The agent references a provider the configuration does not define.
    #[error("agent '{agent}' references unknown provider {provider_id}")]
    UnknownProvider {
        /// Agent name.
        agent: String,
        /// Missing provider identifier.
        provider_id: ProviderId,
    },

    /// The agent selects a model client that was never registered.
    #[error("agent '{agent}' selects unknown model '{model}'")]
    UnknownModel {
        /// Agent name.
        agent: String,
        /// Model client name.
        model: String,
    },

    /// The agent's profile fields are invalid.
    #[error("agent '{agent}' is invalid: {source}")]
    InvalidAgent {
        /// Agent name.
        agent: String,
        /// Validation failure.
        source: ProfileError,
    },

    /// The session id or agent name cannot key a session record.
    #[error(transparent)]
    InvalidSession(#[from] ConversationDomainError),

    /// The configuration source failed.
    #[error(transparent)]
    Config(#[from] ConfigRepositoryError),

    /// The instruction template failed to render.
    #[error(transparent)]
    Template(#[from] InstructionTemplateError),

    /// A provider could not be registered.
    #[error(transparent)]
    Register(#[from] RegisterError),

    /// A direct capability call failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// Session history could not be loaded or saved.
    #[error(transparent)]
    Session(#[from] SessionStoreError),

    /// A workflow step failed; later steps did not run.
    #[error("workflow '{workflow}' failed at step {step} (agent '{agent}'): {reason}")]
    WorkflowStepFailed {
        /// Workflow name.
        workflow: String,
        /// Zero-based index of the failing step.
        step: usize,
        /// Agent the step ran.
        agent: String,
        /// What went wrong.
        #[source]
        reason: StepFailure,
    },
}

/// Why a workflow step failed.
#[derive(Debug, Clone, Error)]
pub enum StepFailure {
    /// The step's facade call returned an error.
    #[error(transparent)]
    Error(Box<FacadeError>),

    /// The step ran but did not complete with a final answer.
    #[error("run ended with status {}", .0.status)]
    Status(Box<RunOutcome>),
}

//! Configuration error types.

use crate::provider::domain::{ProviderDomainError, ProviderId};
use crate::routing::domain::ProfileError;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while loading or validating a [`RuntimeConfig`](super::RuntimeConfig).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {reason}")]
    Read {
        /// Path of the configuration file.
        path: String,
        /// I/O failure detail.
        reason: String,
    },

    /// The document is not valid JSON or does not match the schema.
    #[error("invalid configuration document: {0}")]
    Parse(String),

    /// Two providers share an id.
    #[error("provider {0} is configured more than once")]
    DuplicateProvider(ProviderId),

    /// A provider descriptor failed validation.
    #[error("provider {provider_id} is invalid: {source}")]
    InvalidProvider {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Validation failure.
        source: ProviderDomainError,
    },

    /// Two agents share a name.
    #[error("agent '{0}' is configured more than once")]
    DuplicateAgent(String),

    /// An agent's profile fields are invalid.
    #[error("agent '{agent}' is invalid: {source}")]
    InvalidAgent {
        /// Agent name.
        agent: String,
        /// Validation failure.
        source: ProfileError,
    },

    /// An agent references a provider that is not configured.
    #[error("agent '{agent}' references unknown provider {provider_id}")]
    UnknownProvider {
        /// Agent name.
        agent: String,
        /// Missing provider identifier.
        provider_id: ProviderId,
    },

    /// An agent's instruction template does not compile.
    #[error(transparent)]
    Template(#[from] InstructionTemplateError),

    /// Two workflows share a name.
    #[error("workflow '{0}' is configured more than once")]
    DuplicateWorkflow(String),

    /// A workflow has no steps.
    #[error("workflow '{0}' has no steps")]
    EmptyWorkflow(String),

    /// A workflow step names an agent that is not configured.
    #[error("workflow '{workflow}' references unknown agent '{agent}'")]
    UnknownAgent {
        /// Workflow name.
        workflow: String,
        /// Missing agent name.
        agent: String,
    },
}

/// Failure to compile or render an agent's instruction template.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("instruction template for agent '{agent}' failed: {reason}")]
pub struct InstructionTemplateError {
    /// Agent name.
    pub agent: String,
    /// Template engine detail.
    pub reason: String,
}

/// Errors returned by [`ConfigRepository`](super::ConfigRepository)
/// implementations.
#[derive(Debug, Clone, Error)]
pub enum ConfigRepositoryError {
    /// The backing source could not be consulted.
    #[error("configuration source unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl ConfigRepositoryError {
    /// Wraps a backend error.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}

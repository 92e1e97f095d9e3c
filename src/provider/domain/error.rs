//! Error types for provider domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing provider domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderDomainError {
    /// The provider identifier is empty after trimming.
    #[error("provider id must not be empty")]
    EmptyProviderId,

    /// The provider identifier contains characters outside `[a-z0-9_-]`.
    #[error(
        "provider id '{0}' contains invalid characters (only lowercase alphanumeric, '-' and '_' allowed)"
    )]
    InvalidProviderId(String),

    /// The provider identifier exceeds the 100-character limit.
    #[error("provider id exceeds 100 character limit: {0}")]
    ProviderIdTooLong(String),

    /// The STDIO command is empty.
    #[error("STDIO command must not be empty")]
    EmptyStdioCommand,

    /// The STDIO working directory is empty after trimming.
    #[error("STDIO working directory must not be empty when provided")]
    EmptyWorkingDirectory,

    /// The in-process provider name is empty after trimming.
    #[error("in-process provider name must not be empty")]
    EmptyInProcessName,

    /// A capability name is empty after trimming.
    #[error("capability name must not be empty")]
    EmptyCapabilityName,

    /// The connect timeout is zero.
    #[error("connect timeout must be greater than zero")]
    ZeroConnectTimeout,

    /// The invocation timeout is zero.
    #[error("invoke timeout must be greater than zero")]
    ZeroInvokeTimeout,

    /// Transitioning between two connection states is invalid.
    #[error("invalid provider connection transition: {from} -> {to}")]
    InvalidStateTransition {
        /// Current connection state.
        from: String,
        /// Requested target state.
        to: String,
    },
}

/// Error returned while parsing a connection state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown provider connection state: {0}")]
pub struct ParseConnectionStateError(pub String);

/// Error returned while parsing a capability kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown capability kind: {0}")]
pub struct ParseCapabilityKindError(pub String);

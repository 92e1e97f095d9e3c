//! Transport-level contract for one provider session.

use crate::provider::domain::{
    CapabilityDefinition, CapabilityKind, CapabilityRequest, ConnectionState, ProviderId,
};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// One session to an external provider.
///
/// Implementations own their transport. Lifecycle rules (timeouts, state
/// checks, idempotent close) are enforced by
/// [`ManagedConnection`](crate::provider::services::ManagedConnection), so
/// adapters only need to move bytes.
#[async_trait]
pub trait ProviderConnection: Send + Sync {
    /// Establishes the transport and discovers the capability inventory.
    async fn connect(&self) -> Result<Vec<CapabilityDefinition>, ConnectError>;

    /// Executes one capability and returns the provider-reported payload.
    async fn invoke(&self, request: &CapabilityRequest) -> Result<Value, InvokeError>;

    /// Releases the transport. Calling this more than once must be harmless.
    async fn close(&self) -> Result<(), CloseError>;
}

/// Errors raised while establishing a provider session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// The handshake did not finish within the connect timeout.
    #[error("provider {provider_id} did not connect within {timeout:?}")]
    Timeout {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The provider process could not be started.
    #[error("failed to start provider {provider_id}: {reason}")]
    Spawn {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Failure detail.
        reason: String,
    },

    /// The provider rejected or broke the handshake.
    #[error("handshake with provider {provider_id} failed: {reason}")]
    Handshake {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Failure detail.
        reason: String,
    },

    /// The provider exited before the session became active.
    #[error("provider {provider_id} exited during connect: {reason}")]
    ProcessExited {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Failure detail.
        reason: String,
    },

    /// No adapter can serve the descriptor's transport.
    #[error("unsupported transport for provider {provider_id}: {reason}")]
    UnsupportedTransport {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Failure detail.
        reason: String,
    },

    /// The connection was not in a state that allows connecting.
    #[error("provider {provider_id} cannot connect from state {state}")]
    InvalidState {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Current state.
        state: ConnectionState,
    },
}

impl ConnectError {
    /// Returns the provider the error refers to.
    #[must_use]
    pub const fn provider_id(&self) -> &ProviderId {
        match self {
            Self::Timeout { provider_id, .. }
            | Self::Spawn { provider_id, .. }
            | Self::Handshake { provider_id, .. }
            | Self::ProcessExited { provider_id, .. }
            | Self::UnsupportedTransport { provider_id, .. }
            | Self::InvalidState { provider_id, .. } => provider_id,
        }
    }
}

/// Errors raised by a single capability invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvokeError {
    /// The transport dropped while the call was in flight.
    #[error("connection to provider {provider_id} lost: {reason}")]
    ConnectionLost {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Failure detail.
        reason: String,
    },

    /// The connection is not `active`.
    #[error("provider {provider_id} is not active (current state: {state})")]
    NotActive {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Current state.
        state: ConnectionState,
    },

    /// The provider does not know the requested capability.
    #[error("provider {provider_id} has no {kind} named '{name}'")]
    UnknownCapability {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Capability kind.
        kind: CapabilityKind,
        /// Capability name.
        name: String,
    },

    /// The provider executed the call and reported a failure.
    #[error("provider {provider_id} reported an error: {message}")]
    Provider {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Provider-supplied message.
        message: String,
    },

    /// The provider answered with a malformed message.
    #[error("protocol error from provider {provider_id}: {reason}")]
    Protocol {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Failure detail.
        reason: String,
    },

    /// The provider did not answer within the descriptor's invoke timeout.
    #[error("provider {provider_id} did not answer {name} within {timeout:?}")]
    Timeout {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Capability name.
        name: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },
}

impl InvokeError {
    /// Returns a stable machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionLost { .. } => "connection_lost",
            Self::NotActive { .. } => "not_active",
            Self::UnknownCapability { .. } => "unknown_capability",
            Self::Provider { .. } => "provider_error",
            Self::Protocol { .. } => "protocol_error",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Returns whether the error means the transport is gone.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. })
    }
}

/// Errors raised while releasing a provider transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to close provider {provider_id}: {reason}")]
pub struct CloseError {
    /// Provider identifier.
    pub provider_id: ProviderId,
    /// Failure detail.
    pub reason: String,
}

impl CloseError {
    /// Creates a close error.
    #[must_use]
    pub fn new(provider_id: ProviderId, reason: impl Into<String>) -> Self {
        Self {
            provider_id,
            reason: reason.into(),
        }
    }
}

//! Host error types.

use crate::provider::domain::{CapabilityKind, ProviderDomainError, ProviderId};
use crate::provider::ports::{CloseError, ConnectError, InvokeError};
use crate::routing::domain::AuthError;
use thiserror::Error;

/// Errors returned by provider registration and unregistration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegisterError {
    /// The descriptor failed validation.
    #[error(transparent)]
    InvalidDescriptor(#[from] ProviderDomainError),

    /// The provider is already active with a different descriptor.
    #[error("provider {provider_id} is already active with a different descriptor")]
    DescriptorMismatch {
        /// Provider identifier.
        provider_id: ProviderId,
    },

    /// Connecting failed, either in this call or in the attempt it waited on.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Releasing the connection failed.
    #[error(transparent)]
    Close(#[from] CloseError),

    /// The provider has never been registered.
    #[error("provider {0} is not registered")]
    NotRegistered(ProviderId),

    /// The host has been shut down.
    #[error("provider host has been shut down")]
    HostShutDown,

    /// Internal host state is unusable.
    #[error("provider host state lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Errors returned by capability invocation through the host.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// The consumer may not use the capability.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// No provider serves the capability.
    #[error("no provider serves {kind} '{name}'")]
    CapabilityNotFound {
        /// Capability kind.
        kind: CapabilityKind,
        /// Capability name.
        name: String,
    },

    /// The owning provider is not connected.
    #[error("provider {provider_id} is unavailable: {reason}")]
    ProviderUnavailable {
        /// Provider identifier.
        provider_id: ProviderId,
        /// Failure detail.
        reason: String,
    },

    /// The provider reported an error.
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    /// Internal host state is unusable.
    #[error("provider host state lock poisoned: {0}")]
    LockPoisoned(String),
}

impl HostError {
    /// Returns a stable machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "not_permitted",
            Self::CapabilityNotFound { .. } => "capability_not_found",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::Invoke(err) => err.kind(),
            Self::LockPoisoned(_) => "internal",
        }
    }
}

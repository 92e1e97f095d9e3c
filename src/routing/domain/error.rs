//! Authorization and profile validation errors.

use crate::provider::domain::{CapabilityKind, ProviderId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a capability is hidden from, or refused to, a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenialReason {
    /// The owning provider lists the capability in its global exclude set.
    ExcludedByProvider {
        /// Owning provider.
        provider_id: ProviderId,
    },
    /// The owning provider is not in the consumer's allow-list.
    ProviderNotAllowed {
        /// Owning provider.
        provider_id: ProviderId,
    },
    /// The consumer profile excludes the capability by name.
    ExcludedByConsumer,
}

impl DenialReason {
    /// Returns a stable machine-readable reason code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ExcludedByProvider { .. } => "excluded_by_provider",
            Self::ProviderNotAllowed { .. } => "provider_not_allowed",
            Self::ExcludedByConsumer => "excluded_by_consumer",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExcludedByProvider { provider_id } => {
                write!(formatter, "excluded by provider {provider_id}")
            }
            Self::ProviderNotAllowed { provider_id } => {
                write!(formatter, "provider {provider_id} is not allowed")
            }
            Self::ExcludedByConsumer => formatter.write_str("excluded by consumer profile"),
        }
    }
}

/// Authorization failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The consumer may not call the capability.
    #[error("{consumer} is not permitted to use {kind} '{capability}': {reason}")]
    NotPermitted {
        /// Consumer name.
        consumer: String,
        /// Capability kind.
        kind: CapabilityKind,
        /// Capability name.
        capability: String,
        /// Denial reason.
        reason: DenialReason,
    },
}

impl AuthError {
    /// Returns the denial reason.
    #[must_use]
    pub const fn reason(&self) -> &DenialReason {
        match self {
            Self::NotPermitted { reason, .. } => reason,
        }
    }
}

/// Errors returned while building a consumer profile.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileError {
    /// The consumer name is empty after trimming.
    #[error("consumer name must not be empty")]
    EmptyConsumer,
    /// The iteration cap is zero.
    #[error("max iterations must be greater than zero")]
    ZeroMaxIterations,
    /// The run timeout is zero.
    #[error("run timeout must be greater than zero when provided")]
    ZeroRunTimeout,
}

//! Provider connection lifecycle state.

use super::{ParseConnectionStateError, ProviderDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one provider connection.
///
/// ```text
/// Unregistered -> Connecting -> Active -> Closing -> Closed
///                     |           |
///                     +-> Failed <+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection has been attempted.
    Unregistered,
    /// The transport is being established and capabilities discovered.
    Connecting,
    /// The connection is live and accepts invocations.
    Active,
    /// The transport is being released.
    Closing,
    /// The transport has been released.
    Closed,
    /// Connecting or a live connection failed. Terminal.
    Failed,
}

impl ConnectionState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }

    /// Returns whether the state counts towards the one-live-connection
    /// invariant.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Active)
    }

    /// Returns whether invocations are accepted.
    #[must_use]
    pub const fn accepts_invocations(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Unregistered, Self::Connecting)
                | (Self::Connecting, Self::Active | Self::Failed | Self::Closing)
                | (Self::Active, Self::Closing | Self::Failed)
                | (Self::Closing, Self::Closed)
        )
    }

    /// Validates a transition and returns the target state.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError::InvalidStateTransition`] when the
    /// transition is not allowed.
    pub fn transition_to(self, target: Self) -> Result<Self, ProviderDomainError> {
        if self.can_transition_to(target) {
            return Ok(target);
        }
        Err(ProviderDomainError::InvalidStateTransition {
            from: self.as_str().to_owned(),
            to: target.as_str().to_owned(),
        })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ConnectionState {
    type Error = ParseConnectionStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "unregistered" => Ok(Self::Unregistered),
            "connecting" => Ok(Self::Connecting),
            "active" => Ok(Self::Active),
            "closing" => Ok(Self::Closing),
            "closed" => Ok(Self::Closed),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseConnectionStateError(value.to_owned())),
        }
    }
}

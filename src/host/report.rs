//! Shutdown reporting.

use crate::provider::domain::ProviderId;

/// A connection that could not be closed cleanly during shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownFailure {
    /// Provider identifier.
    pub provider_id: ProviderId,
    /// Failure detail.
    pub reason: String,
}

/// Outcome of [`ProviderHost::shutdown`](super::ProviderHost::shutdown).
///
/// Shutdown never fails; close errors are collected here instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Providers closed cleanly, sorted by id.
    pub closed: Vec<ProviderId>,
    /// Providers whose close reported an error, sorted by id.
    pub failures: Vec<ShutdownFailure>,
}

impl ShutdownReport {
    /// Returns whether every connection closed cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

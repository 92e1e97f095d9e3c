//! Consumer profile value object.

use super::ProfileError;
use crate::provider::domain::ProviderId;
use std::collections::BTreeSet;
use std::time::Duration;

/// Iteration cap applied when a profile does not set one.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Access rules and limits for one consumer (agent).
///
/// A profile is read-only for the duration of a run.
///
/// # Examples
///
/// ```
/// use palladio::provider::domain::ProviderId;
/// use palladio::routing::domain::ConsumerProfile;
///
/// let weather = ProviderId::new("weather").expect("valid id");
/// let profile = ConsumerProfile::new("forecaster", [weather.clone()])
///     .expect("valid profile")
///     .with_exclude(["admin_reset".to_owned()]);
///
/// assert!(profile.allows_provider(&weather));
/// assert!(profile.excludes("admin_reset"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerProfile {
    consumer: String,
    allowed_providers: BTreeSet<ProviderId>,
    exclude: BTreeSet<String>,
    max_iterations: u32,
    run_timeout: Option<Duration>,
}

impl ConsumerProfile {
    /// Creates a profile with the default iteration cap and no timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::EmptyConsumer`] for a blank consumer name.
    pub fn new(
        consumer: impl Into<String>,
        allowed_providers: impl IntoIterator<Item = ProviderId>,
    ) -> Result<Self, ProfileError> {
        let name = consumer.into().trim().to_owned();
        if name.is_empty() {
            return Err(ProfileError::EmptyConsumer);
        }
        Ok(Self {
            consumer: name,
            allowed_providers: allowed_providers.into_iter().collect(),
            exclude: BTreeSet::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            run_timeout: None,
        })
    }

    /// Replaces the consumer-level exclude set.
    #[must_use]
    pub fn with_exclude(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.exclude = names
            .into_iter()
            .map(|name| name.trim().to_owned())
            .collect();
        self
    }

    /// Sets the maximum number of model calls per run.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::ZeroMaxIterations`] for zero.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Result<Self, ProfileError> {
        if max_iterations == 0 {
            return Err(ProfileError::ZeroMaxIterations);
        }
        self.max_iterations = max_iterations;
        Ok(self)
    }

    /// Sets or clears the overall run timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::ZeroRunTimeout`] for a zero duration.
    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Result<Self, ProfileError> {
        if timeout.is_some_and(|duration| duration.is_zero()) {
            return Err(ProfileError::ZeroRunTimeout);
        }
        self.run_timeout = timeout;
        Ok(self)
    }

    /// Returns the consumer name.
    #[must_use]
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Returns the provider allow-list.
    #[must_use]
    pub const fn allowed_providers(&self) -> &BTreeSet<ProviderId> {
        &self.allowed_providers
    }

    /// Returns whether the consumer may use `provider_id`.
    #[must_use]
    pub fn allows_provider(&self, provider_id: &ProviderId) -> bool {
        self.allowed_providers.contains(provider_id)
    }

    /// Returns the consumer-level exclude set.
    #[must_use]
    pub const fn exclude(&self) -> &BTreeSet<String> {
        &self.exclude
    }

    /// Returns whether the consumer excludes `name`.
    #[must_use]
    pub fn excludes(&self, name: &str) -> bool {
        self.exclude.contains(name)
    }

    /// Returns the iteration cap.
    #[must_use]
    pub const fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Returns the overall run timeout, if any.
    #[must_use]
    pub const fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_consumer_is_rejected() {
        assert_eq!(
            ConsumerProfile::new("  ", []),
            Err(ProfileError::EmptyConsumer)
        );
    }

    #[test]
    fn defaults_apply() {
        let profile = ConsumerProfile::new("forecaster", []).expect("valid profile");
        assert_eq!(profile.max_iterations(), DEFAULT_MAX_ITERATIONS);
        assert_eq!(profile.run_timeout(), None);
        assert!(profile.allowed_providers().is_empty());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let profile = ConsumerProfile::new("forecaster", []).expect("valid profile");
        assert_eq!(
            profile.clone().with_max_iterations(0),
            Err(ProfileError::ZeroMaxIterations)
        );
        assert_eq!(
            profile.with_run_timeout(Some(Duration::ZERO)),
            Err(ProfileError::ZeroRunTimeout)
        );
    }
}

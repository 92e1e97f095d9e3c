//! Stateless visibility and authorization policy.

use crate::provider::domain::CapabilityKind;
use crate::routing::domain::{
    AuthError, CapabilityEntry, CapabilityInvocation, ConsumerProfile, DenialReason,
};

/// Policy evaluator combining provider-level and consumer-level rules.
///
/// An entry is visible to a consumer iff its name is not in the owning
/// provider's exclude set, the owning provider is in the consumer's
/// allow-list, and the name is not in the consumer's exclude set. Listing and
/// authorization both call [`FilteringEngine::denial`], so what a consumer
/// can see is exactly what it can call.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilteringEngine;

impl FilteringEngine {
    /// Returns the first rule hiding `entry` from `profile`, if any.
    #[must_use]
    pub fn denial(entry: &CapabilityEntry, profile: &ConsumerProfile) -> Option<DenialReason> {
        if entry.is_provider_excluded() {
            return Some(DenialReason::ExcludedByProvider {
                provider_id: entry.provider_id().clone(),
            });
        }
        if !profile.allows_provider(entry.provider_id()) {
            return Some(DenialReason::ProviderNotAllowed {
                provider_id: entry.provider_id().clone(),
            });
        }
        if profile.excludes(entry.name()) {
            return Some(DenialReason::ExcludedByConsumer);
        }
        None
    }

    /// Returns whether `entry` is visible to `profile`.
    #[must_use]
    pub fn is_visible(entry: &CapabilityEntry, profile: &ConsumerProfile) -> bool {
        Self::denial(entry, profile).is_none()
    }

    /// Keeps the entries visible to `profile`, preserving order.
    #[must_use]
    pub fn filter_list<'a>(
        entries: impl IntoIterator<Item = &'a CapabilityEntry>,
        profile: &ConsumerProfile,
    ) -> Vec<&'a CapabilityEntry> {
        entries
            .into_iter()
            .filter(|entry| Self::is_visible(entry, profile))
            .collect()
    }

    /// Authorizes a resolved invocation.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotPermitted`] with the denial reason when the
    /// target is not visible to `profile`.
    pub fn authorize(
        invocation: &CapabilityInvocation,
        profile: &ConsumerProfile,
    ) -> Result<(), AuthError> {
        if let Some(reason) = Self::denial(&invocation.target, profile) {
            return Err(AuthError::NotPermitted {
                consumer: profile.consumer().to_owned(),
                kind: invocation.target.kind(),
                capability: invocation.target.name().to_owned(),
                reason,
            });
        }
        Ok(())
    }

    /// Applies the consumer-level exclude check before resolution.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotPermitted`] when `profile` excludes `name`.
    pub fn authorize_request(
        kind: CapabilityKind,
        name: &str,
        profile: &ConsumerProfile,
    ) -> Result<(), AuthError> {
        if !profile.excludes(name) {
            return Ok(());
        }
        Err(AuthError::NotPermitted {
            consumer: profile.consumer().to_owned(),
            kind,
            capability: name.to_owned(),
            reason: DenialReason::ExcludedByConsumer,
        })
    }
}

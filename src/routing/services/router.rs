//! Capability index keyed by `(kind, name)`.

use crate::provider::domain::{
    CapabilityDefinition, CapabilityKind, ProviderDescriptor, ProviderId,
};
use crate::routing::domain::CapabilityEntry;
use std::cmp::Reverse;
use std::collections::HashMap;

type CapabilityKey = (CapabilityKind, String);

/// A name collision observed while registering a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// Capability kind.
    pub kind: CapabilityKind,
    /// Capability name.
    pub name: String,
    /// Provider that now serves the capability.
    pub winner: ProviderId,
    /// Providers whose offers are shadowed, highest priority first.
    pub shadowed: Vec<ProviderId>,
}

/// Result of registering one provider's capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Registered provider.
    pub provider_id: ProviderId,
    /// Number of entries indexed.
    pub registered: usize,
    /// Collisions with other providers.
    pub collisions: Vec<Collision>,
}

/// Index from `(kind, name)` to the provider serving it.
///
/// Every key holds all candidate entries ordered by priority, so resolution
/// is a hash lookup plus a look at the head. Priority is: entries not
/// excluded by their provider first, then routing weight descending, then
/// registration order ascending (the first registered provider wins a tie).
/// Unregistering a provider promotes the next candidate.
///
/// # Examples
///
/// ```
/// use palladio::provider::domain::{
///     CapabilityDefinition, CapabilityKind, ProviderDescriptor, ProviderId, ProviderTransport,
/// };
/// use palladio::routing::services::CapabilityRouter;
/// use serde_json::json;
///
/// let descriptor = ProviderDescriptor::new(
///     ProviderId::new("weather").expect("valid id"),
///     ProviderTransport::in_process("weather").expect("valid transport"),
/// );
/// let lookup = CapabilityDefinition::tool("lookup", "Weather", json!({})).expect("valid");
///
/// let mut router = CapabilityRouter::new();
/// router.register(&descriptor, &[lookup]);
///
/// assert_eq!(
///     router.resolve(CapabilityKind::Tool, "lookup").map(ProviderId::as_str),
///     Some("weather")
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct CapabilityRouter {
    index: HashMap<CapabilityKey, Vec<CapabilityEntry>>,
    next_seq: u64,
}

fn priority(entry: &CapabilityEntry) -> (bool, Reverse<i32>, u64) {
    (
        entry.is_provider_excluded(),
        Reverse(entry.routing_weight()),
        entry.registration_seq(),
    )
}

impl CapabilityRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `capabilities` for the provider described by `descriptor`.
    ///
    /// Entries previously registered by the same provider are replaced. Each
    /// registration takes the next sequence number, so a provider that
    /// re-registers queues behind providers already present at equal weight.
    pub fn register(
        &mut self,
        descriptor: &ProviderDescriptor,
        capabilities: &[CapabilityDefinition],
    ) -> RegistrationReport {
        let provider_id = descriptor.id();
        self.remove_provider(provider_id);

        let seq = self.next_seq;
        self.next_seq += 1;

        let mut registered = 0;
        let mut collisions = Vec::new();
        for definition in capabilities {
            let key = (definition.kind(), definition.name().to_owned());
            let entry = CapabilityEntry::new(
                provider_id.clone(),
                definition.clone(),
                descriptor.routing_weight(),
                seq,
                descriptor.excludes(definition.name()),
            );
            let candidates = self.index.entry(key).or_default();
            if candidates
                .iter()
                .any(|existing| existing.provider_id() == provider_id)
            {
                continue;
            }
            candidates.push(entry);
            candidates.sort_by_key(priority);
            registered += 1;

            if let Some(collision) = collision_of(candidates) {
                tracing::warn!(
                    kind = %collision.kind,
                    capability = %collision.name,
                    winner = %collision.winner,
                    shadowed = ?collision.shadowed,
                    "capability name collision"
                );
                collisions.push(collision);
            }
        }

        tracing::debug!(provider_id = %provider_id, registered, "provider capabilities indexed");
        RegistrationReport {
            provider_id: provider_id.clone(),
            registered,
            collisions,
        }
    }

    /// Removes every entry owned by `provider_id`.
    ///
    /// Returns the entries that became winners because of the removal.
    pub fn unregister(&mut self, provider_id: &ProviderId) -> Vec<CapabilityEntry> {
        let promoted = self.remove_provider(provider_id);
        for entry in &promoted {
            tracing::info!(
                kind = %entry.kind(),
                capability = entry.name(),
                provider_id = %entry.provider_id(),
                "shadowed capability promoted"
            );
        }
        promoted
    }

    fn remove_provider(&mut self, provider_id: &ProviderId) -> Vec<CapabilityEntry> {
        let mut promoted = Vec::new();
        self.index.retain(|_, candidates| {
            let was_head = candidates
                .first()
                .is_some_and(|head| head.provider_id() == provider_id);
            candidates.retain(|entry| entry.provider_id() != provider_id);
            if was_head
                && let Some(head) = candidates.first().filter(|head| !head.is_provider_excluded())
            {
                promoted.push(head.clone());
            }
            !candidates.is_empty()
        });
        promoted
    }

    /// Returns the provider serving `(kind, name)`.
    #[must_use]
    pub fn resolve(&self, kind: CapabilityKind, name: &str) -> Option<&ProviderId> {
        self.resolve_entry(kind, name).map(CapabilityEntry::provider_id)
    }

    /// Returns the winning entry for `(kind, name)`.
    ///
    /// Entries excluded by their provider are never returned.
    #[must_use]
    pub fn resolve_entry(&self, kind: CapabilityKind, name: &str) -> Option<&CapabilityEntry> {
        self.index
            .get(&(kind, name.to_owned()))
            .and_then(|candidates| candidates.first())
            .filter(|head| !head.is_provider_excluded())
    }

    /// Returns the winning entry for `(kind, name)` even when its provider
    /// excludes it, so callers can explain a denial.
    #[must_use]
    pub fn head_entry(&self, kind: CapabilityKind, name: &str) -> Option<&CapabilityEntry> {
        self.index
            .get(&(kind, name.to_owned()))
            .and_then(|candidates| candidates.first())
    }

    /// Lists winners of `kind`, sorted by name.
    #[must_use]
    pub fn list(&self, kind: CapabilityKind) -> Vec<&CapabilityEntry> {
        let mut winners: Vec<&CapabilityEntry> = self
            .winners()
            .filter(|entry| entry.kind() == kind)
            .collect();
        winners.sort_by(|left, right| left.name().cmp(right.name()));
        winners
    }

    /// Lists winners of every kind, sorted by kind then name.
    #[must_use]
    pub fn list_all(&self) -> Vec<&CapabilityEntry> {
        let mut winners: Vec<&CapabilityEntry> = self.winners().collect();
        winners.sort_by(|left, right| {
            left.kind()
                .cmp(&right.kind())
                .then_with(|| left.name().cmp(right.name()))
        });
        winners
    }

    fn winners(&self) -> impl Iterator<Item = &CapabilityEntry> {
        self.index
            .values()
            .filter_map(|candidates| candidates.first())
            .filter(|head| !head.is_provider_excluded())
    }

    /// Returns whether any entry belongs to `provider_id`.
    #[must_use]
    pub fn contains_provider(&self, provider_id: &ProviderId) -> bool {
        self.index.values().any(|candidates| {
            candidates
                .iter()
                .any(|entry| entry.provider_id() == provider_id)
        })
    }
}

fn collision_of(candidates: &[CapabilityEntry]) -> Option<Collision> {
    let (head, rest) = candidates.split_first()?;
    if rest.is_empty() {
        return None;
    }
    Some(Collision {
        kind: head.kind(),
        name: head.name().to_owned(),
        winner: head.provider_id().clone(),
        shadowed: rest
            .iter()
            .map(|entry| entry.provider_id().clone())
            .collect(),
    })
}

//! Router entries, consumer-facing listings, and invocations.

use crate::provider::domain::{
    CapabilityDefinition, CapabilityKind, CapabilityRequest, ProviderId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One provider's offer of one capability, as indexed by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityEntry {
    provider_id: ProviderId,
    definition: CapabilityDefinition,
    routing_weight: i32,
    registration_seq: u64,
    provider_excluded: bool,
}

impl CapabilityEntry {
    /// Creates an entry.
    #[must_use]
    pub const fn new(
        provider_id: ProviderId,
        definition: CapabilityDefinition,
        routing_weight: i32,
        registration_seq: u64,
        provider_excluded: bool,
    ) -> Self {
        Self {
            provider_id,
            definition,
            routing_weight,
            registration_seq,
            provider_excluded,
        }
    }

    /// Returns the owning provider.
    #[must_use]
    pub const fn provider_id(&self) -> &ProviderId {
        &self.provider_id
    }

    /// Returns the capability definition.
    #[must_use]
    pub const fn definition(&self) -> &CapabilityDefinition {
        &self.definition
    }

    /// Returns the capability name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Returns the capability kind.
    #[must_use]
    pub const fn kind(&self) -> CapabilityKind {
        self.definition.kind()
    }

    /// Returns the owning provider's routing weight.
    #[must_use]
    pub const fn routing_weight(&self) -> i32 {
        self.routing_weight
    }

    /// Returns the registration sequence number (lower registered earlier).
    #[must_use]
    pub const fn registration_seq(&self) -> u64 {
        self.registration_seq
    }

    /// Returns whether the owning provider globally excludes this capability.
    #[must_use]
    pub const fn is_provider_excluded(&self) -> bool {
        self.provider_excluded
    }

    /// Projects the entry onto the consumer-facing listing shape.
    #[must_use]
    pub fn to_listing(&self) -> CapabilityListing {
        CapabilityListing {
            name: self.definition.name().to_owned(),
            kind: self.definition.kind(),
            description: self.definition.description().to_owned(),
            schema: self.definition.schema().clone(),
        }
    }
}

/// Capability as presented to a consumer and to the model.
///
/// Serialises as `{name, kind, description, schema}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityListing {
    /// Capability name.
    pub name: String,
    /// Capability kind.
    pub kind: CapabilityKind,
    /// Human-readable description.
    pub description: String,
    /// Argument schema.
    pub schema: Value,
}

/// A single call, resolved to its target entry. Lives for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityInvocation {
    /// Calling consumer.
    pub consumer: String,
    /// Arguments supplied by the model.
    pub arguments: Value,
    /// Resolved router entry.
    pub target: CapabilityEntry,
}

impl CapabilityInvocation {
    /// Creates an invocation.
    #[must_use]
    pub fn new(consumer: impl Into<String>, arguments: Value, target: CapabilityEntry) -> Self {
        Self {
            consumer: consumer.into(),
            arguments,
            target,
        }
    }

    /// Builds the provider-facing request.
    #[must_use]
    pub fn to_request(&self) -> CapabilityRequest {
        CapabilityRequest::new(
            self.target.kind(),
            self.target.name(),
            self.arguments.clone(),
        )
    }
}

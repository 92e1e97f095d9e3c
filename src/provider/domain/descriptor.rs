//! Provider descriptor value object.

use super::{CapabilityDefinition, ProviderDomainError, ProviderId, ProviderTransport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Connect timeout applied when a descriptor does not specify one.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Invocation timeout applied when a descriptor does not specify one.
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(60);

const fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

const fn default_invoke_timeout() -> Duration {
    DEFAULT_INVOKE_TIMEOUT
}

/// Static description of a provider, built from configuration.
///
/// Descriptors are immutable after registration. The `exclude` set lists
/// capability names that are never exposed to any consumer. When two
/// providers offer the same capability, the higher `routing_weight` wins and
/// ties go to the provider registered first.
///
/// # Examples
///
/// ```
/// use palladio::provider::domain::{ProviderDescriptor, ProviderId, ProviderTransport};
/// use std::time::Duration;
///
/// let descriptor = ProviderDescriptor::new(
///     ProviderId::new("weather").expect("valid id"),
///     ProviderTransport::stdio("weather-server").expect("valid transport"),
/// )
/// .with_exclude(["admin_reset".to_owned()])
/// .with_connect_timeout(Duration::from_secs(5))
/// .expect("non-zero timeout");
///
/// assert!(descriptor.excludes("admin_reset"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    id: ProviderId,
    transport: ProviderTransport,
    #[serde(default)]
    capabilities: Vec<CapabilityDefinition>,
    #[serde(default)]
    exclude: BTreeSet<String>,
    #[serde(default)]
    routing_weight: i32,
    #[serde(
        default = "default_connect_timeout",
        rename = "connect_timeout_ms",
        with = "duration_millis"
    )]
    connect_timeout: Duration,
    #[serde(
        default = "default_invoke_timeout",
        rename = "invoke_timeout_ms",
        with = "duration_millis"
    )]
    invoke_timeout: Duration,
}

impl ProviderDescriptor {
    /// Creates a descriptor with default weight, timeout, and no exclusions.
    #[must_use]
    pub const fn new(id: ProviderId, transport: ProviderTransport) -> Self {
        Self {
            id,
            transport,
            capabilities: Vec::new(),
            exclude: BTreeSet::new(),
            routing_weight: 0,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            invoke_timeout: DEFAULT_INVOKE_TIMEOUT,
        }
    }

    /// Declares capabilities up front.
    ///
    /// Declared capabilities are merged with the inventory discovered on
    /// connect; discovered definitions take precedence for the same kind and
    /// name.
    #[must_use]
    pub fn with_capabilities(
        mut self,
        capabilities: impl IntoIterator<Item = CapabilityDefinition>,
    ) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    /// Replaces the global exclude set.
    #[must_use]
    pub fn with_exclude(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.exclude = names
            .into_iter()
            .map(|name| name.trim().to_owned())
            .collect();
        self
    }

    /// Sets the routing weight used to break capability-name collisions.
    #[must_use]
    pub const fn with_routing_weight(mut self, weight: i32) -> Self {
        self.routing_weight = weight;
        self
    }

    /// Sets the connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError::ZeroConnectTimeout`] for a zero
    /// duration.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Result<Self, ProviderDomainError> {
        if timeout.is_zero() {
            return Err(ProviderDomainError::ZeroConnectTimeout);
        }
        self.connect_timeout = timeout;
        Ok(self)
    }

    /// Sets the bound on a single capability invocation.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError::ZeroInvokeTimeout`] for a zero
    /// duration.
    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Result<Self, ProviderDomainError> {
        if timeout.is_zero() {
            return Err(ProviderDomainError::ZeroInvokeTimeout);
        }
        self.invoke_timeout = timeout;
        Ok(self)
    }

    /// Validates a descriptor that may have been deserialised directly.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError`] for a blank transport field, a zero
    /// connect or invoke timeout, or a blank declared capability name.
    pub fn validate(&self) -> Result<(), ProviderDomainError> {
        self.transport.validate()?;
        if self.connect_timeout.is_zero() {
            return Err(ProviderDomainError::ZeroConnectTimeout);
        }
        if self.invoke_timeout.is_zero() {
            return Err(ProviderDomainError::ZeroInvokeTimeout);
        }
        if self
            .capabilities
            .iter()
            .any(|capability| capability.name().trim().is_empty())
        {
            return Err(ProviderDomainError::EmptyCapabilityName);
        }
        Ok(())
    }

    /// Returns the provider identifier.
    #[must_use]
    pub const fn id(&self) -> &ProviderId {
        &self.id
    }

    /// Returns the transport settings.
    #[must_use]
    pub const fn transport(&self) -> &ProviderTransport {
        &self.transport
    }

    /// Returns the declared capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[CapabilityDefinition] {
        &self.capabilities
    }

    /// Returns the global exclude set.
    #[must_use]
    pub const fn exclude(&self) -> &BTreeSet<String> {
        &self.exclude
    }

    /// Returns whether `name` is globally excluded by this provider.
    #[must_use]
    pub fn excludes(&self, name: &str) -> bool {
        self.exclude.contains(name)
    }

    /// Returns the routing weight.
    #[must_use]
    pub const fn routing_weight(&self) -> i32 {
        self.routing_weight
    }

    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the invocation timeout.
    #[must_use]
    pub const fn invoke_timeout(&self) -> Duration {
        self.invoke_timeout
    }
}

/// Serde helpers encoding [`Duration`] values as integer milliseconds.
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(crate) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    /// Same encoding for optional durations.
    pub(crate) mod option {
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use std::time::Duration;

        pub(crate) fn serialize<S>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            value
                .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
                .serialize(serializer)
        }

        pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<u64>::deserialize(deserializer).map(|millis| millis.map(Duration::from_millis))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_id() -> ProviderId {
        ProviderId::new("weather").expect("valid provider id")
    }

    #[test]
    fn descriptor_defaults_are_applied_on_deserialize() {
        let descriptor: ProviderDescriptor = serde_json::from_value(json!({
            "id": "weather",
            "transport": {"kind": "in_process", "config": {"name": "weather"}}
        }))
        .expect("descriptor should deserialize");

        assert_eq!(descriptor.id(), &weather_id());
        assert_eq!(descriptor.routing_weight(), 0);
        assert_eq!(descriptor.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(descriptor.invoke_timeout(), DEFAULT_INVOKE_TIMEOUT);
        assert!(descriptor.exclude().is_empty());
        assert!(descriptor.capabilities().is_empty());
    }

    #[test]
    fn connect_timeout_round_trips_as_milliseconds() {
        let descriptor = ProviderDescriptor::new(
            weather_id(),
            ProviderTransport::in_process("weather").expect("valid transport"),
        )
        .with_connect_timeout(Duration::from_millis(1_500))
        .expect("non-zero timeout");

        let value = serde_json::to_value(&descriptor).expect("descriptor should serialize");
        assert_eq!(value.get("connect_timeout_ms"), Some(&json!(1_500)));
    }

    #[test]
    fn zero_connect_timeout_is_rejected() {
        let result = ProviderDescriptor::new(
            weather_id(),
            ProviderTransport::in_process("weather").expect("valid transport"),
        )
        .with_connect_timeout(Duration::ZERO);

        assert_eq!(result, Err(ProviderDomainError::ZeroConnectTimeout));
    }

    #[test]
    fn zero_invoke_timeout_is_rejected_when_deserialised() {
        let descriptor: ProviderDescriptor = serde_json::from_value(json!({
            "id": "weather",
            "transport": {"kind": "in_process", "config": {"name": "weather"}},
            "invoke_timeout_ms": 0
        }))
        .expect("descriptor should deserialize");

        assert_eq!(
            descriptor.validate(),
            Err(ProviderDomainError::ZeroInvokeTimeout)
        );
    }

    #[test]
    fn exclude_entries_are_trimmed() {
        let descriptor = ProviderDescriptor::new(
            weather_id(),
            ProviderTransport::in_process("weather").expect("valid transport"),
        )
        .with_exclude([" lookup ".to_owned()]);

        assert!(descriptor.excludes("lookup"));
    }
}

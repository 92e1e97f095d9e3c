//! State-machine wrapper enforcing the provider connection lifecycle.

use crate::provider::{
    domain::{
        CapabilityDefinition, CapabilityRequest, ConnectionId, ConnectionState, ProviderDescriptor,
        ProviderId,
    },
    ports::{CloseError, ConnectError, InvokeError, ProviderConnection},
};
use serde_json::Value;
use std::sync::{Mutex, PoisonError, RwLock};

/// A provider connection together with its lifecycle state.
///
/// Adapters only move bytes; this wrapper owns the rules: connects are bounded
/// by the descriptor's timeout, failures move the connection to `failed` and
/// release the transport, invocations require `active`, and closing twice is
/// harmless.
pub struct ManagedConnection {
    descriptor: ProviderDescriptor,
    connection_id: ConnectionId,
    inner: Box<dyn ProviderConnection>,
    state: Mutex<ConnectionState>,
    capabilities: RwLock<Vec<CapabilityDefinition>>,
}

impl std::fmt::Debug for ManagedConnection {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ManagedConnection")
            .field("provider_id", self.descriptor.id())
            .field("connection_id", &self.connection_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ManagedConnection {
    /// Wraps an unconnected transport.
    #[must_use]
    pub fn new(descriptor: ProviderDescriptor, inner: Box<dyn ProviderConnection>) -> Self {
        Self {
            descriptor,
            connection_id: ConnectionId::new(),
            inner,
            state: Mutex::new(ConnectionState::Unregistered),
            capabilities: RwLock::new(Vec::new()),
        }
    }

    /// Returns the descriptor this connection was built from.
    #[must_use]
    pub const fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    /// Returns the provider identifier.
    #[must_use]
    pub const fn provider_id(&self) -> &ProviderId {
        self.descriptor.id()
    }

    /// Returns the identifier of this particular session.
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the capability inventory recorded by the last connect.
    #[must_use]
    pub fn capabilities(&self) -> Vec<CapabilityDefinition> {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `target` when the lifecycle allows it and returns the state
    /// observed before the change.
    fn advance(&self, target: ConnectionState) -> Result<ConnectionState, ConnectionState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        if previous.can_transition_to(target) {
            *state = target;
            return Ok(previous);
        }
        Err(previous)
    }

    /// Establishes the transport and discovers capabilities.
    ///
    /// Declared capabilities are merged with the discovered inventory;
    /// discovered definitions win for the same kind and name.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::InvalidState`] unless the connection is
    /// `unregistered`, [`ConnectError::Timeout`] when the handshake exceeds
    /// the descriptor's connect timeout, or the adapter's error.
    pub async fn connect(&self) -> Result<Vec<CapabilityDefinition>, ConnectError> {
        self.advance(ConnectionState::Connecting)
            .map_err(|state| ConnectError::InvalidState {
                provider_id: self.provider_id().clone(),
                state,
            })?;

        let timeout = self.descriptor.connect_timeout();
        let outcome = tokio::time::timeout(timeout, self.inner.connect())
            .await
            .unwrap_or_else(|_| {
                Err(ConnectError::Timeout {
                    provider_id: self.provider_id().clone(),
                    timeout,
                })
            });

        match outcome {
            Ok(discovered) => {
                let merged = merge_capabilities(self.descriptor.capabilities(), discovered);
                *self
                    .capabilities
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = merged.clone();
                if let Err(state) = self.advance(ConnectionState::Active) {
                    self.release().await;
                    return Err(ConnectError::InvalidState {
                        provider_id: self.provider_id().clone(),
                        state,
                    });
                }
                tracing::info!(
                    provider_id = %self.provider_id(),
                    connection_id = %self.connection_id,
                    capabilities = merged.len(),
                    "provider connected"
                );
                Ok(merged)
            }
            Err(err) => {
                // Ignored when a concurrent close already won the race.
                let _previous = self.advance(ConnectionState::Failed);
                tracing::warn!(
                    provider_id = %self.provider_id(),
                    error = %err,
                    "provider connect failed"
                );
                self.release().await;
                Err(err)
            }
        }
    }

    /// Forwards an invocation to the provider.
    ///
    /// The call is bounded by the descriptor's invoke timeout; an expired
    /// call is abandoned and the connection stays `active`. Transport loss
    /// moves the connection to `failed`.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::NotActive`] unless the connection is `active`,
    /// [`InvokeError::Timeout`] when the provider does not answer in time,
    /// otherwise the adapter's error.
    pub async fn invoke(&self, request: &CapabilityRequest) -> Result<Value, InvokeError> {
        let state = self.state();
        if !state.accepts_invocations() {
            return Err(InvokeError::NotActive {
                provider_id: self.provider_id().clone(),
                state,
            });
        }

        let timeout = self.descriptor.invoke_timeout();
        let result = tokio::time::timeout(timeout, self.inner.invoke(request))
            .await
            .unwrap_or_else(|_| {
                tracing::warn!(
                    provider_id = %self.provider_id(),
                    capability = %request.name,
                    ?timeout,
                    "provider invocation timed out"
                );
                Err(InvokeError::Timeout {
                    provider_id: self.provider_id().clone(),
                    name: request.name.clone(),
                    timeout,
                })
            });
        if result.as_ref().is_err_and(InvokeError::is_connection_lost) {
            self.mark_failed();
        }
        result
    }

    /// Moves a live connection to `failed`.
    pub fn mark_failed(&self) {
        if self.advance(ConnectionState::Failed).is_ok() {
            tracing::warn!(provider_id = %self.provider_id(), "provider connection failed");
        }
    }

    /// Releases the transport.
    ///
    /// Live connections pass through `closing` to `closed`. Failed
    /// connections stay `failed` but still release whatever the adapter
    /// holds. Repeated calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns the adapter's [`CloseError`]; the connection still ends up
    /// `closed`.
    pub async fn close(&self) -> Result<(), CloseError> {
        match self.advance(ConnectionState::Closing) {
            Ok(_) => {
                let result = self.inner.close().await;
                let _previous = self.advance(ConnectionState::Closed);
                tracing::debug!(provider_id = %self.provider_id(), "provider closed");
                result
            }
            Err(ConnectionState::Failed) => self.inner.close().await,
            Err(_) => Ok(()),
        }
    }

    async fn release(&self) {
        if let Err(err) = self.inner.close().await {
            tracing::warn!(
                provider_id = %self.provider_id(),
                error = %err,
                "failed to release provider transport"
            );
        }
    }
}

fn merge_capabilities(
    declared: &[CapabilityDefinition],
    discovered: Vec<CapabilityDefinition>,
) -> Vec<CapabilityDefinition> {
    let mut merged = discovered;
    for definition in declared {
        let already_discovered = merged.iter().any(|existing| {
            existing.kind() == definition.kind() && existing.name() == definition.name()
        });
        if !already_discovered {
            merged.push(definition.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::adapters::memory::InMemoryProviderCatalog;
    use crate::provider::domain::{CapabilityKind, ProviderTransport};
    use rstest::{fixture, rstest};
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        catalog: InMemoryProviderCatalog,
        connection: ManagedConnection,
    }

    fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor::new(
            ProviderId::new("weather").expect("valid id"),
            ProviderTransport::in_process("weather").expect("valid transport"),
        )
    }

    fn build(descriptor: ProviderDescriptor) -> Harness {
        let catalog = InMemoryProviderCatalog::new();
        catalog
            .define(
                "weather",
                vec![
                    CapabilityDefinition::tool("lookup", "Discovered", json!({}))
                        .expect("valid definition"),
                ],
            )
            .expect("define should succeed");
        let inner = catalog.connection(descriptor.id().clone(), "weather");
        Harness {
            catalog,
            connection: ManagedConnection::new(descriptor, Box::new(inner)),
        }
    }

    #[fixture]
    fn harness() -> Harness {
        build(descriptor())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn connect_activates_and_merges_declared_capabilities() {
        let declared = vec![
            CapabilityDefinition::tool("lookup", "Declared", json!({})).expect("valid definition"),
            CapabilityDefinition::resource("forecast.md", "Declared only")
                .expect("valid definition"),
        ];
        let harness = build(descriptor().with_capabilities(declared));

        let capabilities = harness
            .connection
            .connect()
            .await
            .expect("connect should succeed");

        assert_eq!(harness.connection.state(), ConnectionState::Active);
        assert_eq!(capabilities.len(), 2);
        let lookup = capabilities
            .iter()
            .find(|capability| capability.name() == "lookup")
            .expect("lookup should be present");
        assert_eq!(lookup.description(), "Discovered");
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn connect_timeout_fails_and_releases() {
        let slow = build(
            descriptor()
                .with_connect_timeout(Duration::from_millis(20))
                .expect("non-zero timeout"),
        );
        slow.catalog
            .set_connect_delay("weather", Duration::from_secs(5))
            .expect("script should succeed");

        let result = slow.connection.connect().await;

        assert!(matches!(result, Err(ConnectError::Timeout { .. })));
        assert_eq!(slow.connection.state(), ConnectionState::Failed);
        assert_eq!(slow.catalog.close_count("weather"), Ok(1));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn second_connect_is_rejected(harness: Harness) {
        harness
            .connection
            .connect()
            .await
            .expect("connect should succeed");

        let result = harness.connection.connect().await;

        assert!(matches!(
            result,
            Err(ConnectError::InvalidState {
                state: ConnectionState::Active,
                ..
            })
        ));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn invoke_requires_active(harness: Harness) {
        let request = CapabilityRequest::new(CapabilityKind::Tool, "lookup", json!({}));

        let result = harness.connection.invoke(&request).await;

        assert!(matches!(
            result,
            Err(InvokeError::NotActive {
                state: ConnectionState::Unregistered,
                ..
            })
        ));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn slow_invocation_times_out_and_stays_active() {
        let slow = build(
            descriptor()
                .with_invoke_timeout(Duration::from_millis(50))
                .expect("non-zero timeout"),
        );
        slow.catalog
            .delay_invocation(
                "weather",
                CapabilityKind::Tool,
                "lookup",
                Duration::from_secs(30),
            )
            .expect("script should succeed");
        slow.connection
            .connect()
            .await
            .expect("connect should succeed");

        let request = CapabilityRequest::new(CapabilityKind::Tool, "lookup", json!({}));
        let result = tokio::time::timeout(Duration::from_secs(5), slow.connection.invoke(&request))
            .await
            .expect("invoke should be bounded by the descriptor");

        assert!(matches!(result, Err(InvokeError::Timeout { ref name, .. }) if name == "lookup"));
        assert_eq!(result.map_err(|err| err.kind()), Err("timeout"));
        assert_eq!(slow.connection.state(), ConnectionState::Active);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn connection_loss_marks_failed(harness: Harness) {
        harness
            .connection
            .connect()
            .await
            .expect("connect should succeed");
        harness
            .catalog
            .drop_connection("weather")
            .expect("script should succeed");

        let request = CapabilityRequest::new(CapabilityKind::Tool, "lookup", json!({}));
        let result = harness.connection.invoke(&request).await;

        assert!(result.is_err_and(|err| err.is_connection_lost()));
        assert_eq!(harness.connection.state(), ConnectionState::Failed);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn close_is_idempotent(harness: Harness) {
        harness
            .connection
            .connect()
            .await
            .expect("connect should succeed");

        harness.connection.close().await.expect("first close");
        harness.connection.close().await.expect("second close");

        assert_eq!(harness.connection.state(), ConnectionState::Closed);
        assert_eq!(harness.catalog.close_count("weather"), Ok(1));
    }
}

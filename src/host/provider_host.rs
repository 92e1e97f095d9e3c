//! The provider host service.

use super::{HostError, RegisterError, ShutdownFailure, ShutdownReport};
use crate::provider::{
    domain::{
        CapabilityDefinition, CapabilityKind, ConnectionId, ConnectionState, ProviderDescriptor,
        ProviderId,
    },
    ports::{ConnectError, ProviderConnector},
    services::ManagedConnection,
};
use crate::routing::{
    domain::{AuthError, CapabilityInvocation, CapabilityListing, ConsumerProfile, DenialReason},
    services::{CapabilityRouter, FilteringEngine},
};
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Per-provider registration slot.
///
/// The async mutex is held for the whole `connecting` phase. `attempts`
/// counts finished attempts so a caller that queued behind an attempt can
/// tell that it finished and adopt its outcome.
#[derive(Default)]
struct ProviderSlot {
    attempts: AtomicU64,
    state: tokio::sync::Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    connection: Option<Arc<ManagedConnection>>,
    last_failure: Option<ConnectError>,
}

/// Owns every provider connection and routes invocations to them.
///
/// The host is shared by reference (`Arc<ProviderHost>`) across concurrent
/// runs. Steady-state reads (resolution, listing, the active fast path) only
/// take `RwLock` read guards; registration of one provider id is serialised
/// by that provider's async mutex and never blocks other providers.
///
/// # Examples
///
/// ```
/// use palladio::host::ProviderHost;
/// use palladio::provider::adapters::{TransportConnector, memory::InMemoryProviderCatalog};
/// use palladio::provider::domain::{
///     CapabilityDefinition, CapabilityKind, ProviderDescriptor, ProviderId, ProviderTransport,
/// };
/// use palladio::routing::domain::ConsumerProfile;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
/// let catalog = InMemoryProviderCatalog::new();
/// catalog
///     .define(
///         "weather",
///         vec![CapabilityDefinition::tool("lookup", "Weather", json!({})).expect("valid")],
///     )
///     .expect("define");
/// let host = ProviderHost::new(Arc::new(TransportConnector::new().with_catalog(catalog)));
///
/// let weather = ProviderId::new("weather").expect("valid id");
/// let descriptor = ProviderDescriptor::new(
///     weather.clone(),
///     ProviderTransport::in_process("weather").expect("valid transport"),
/// );
/// host.ensure_registered(&descriptor).await.expect("registration");
///
/// let profile = ConsumerProfile::new("forecaster", [weather]).expect("valid profile");
/// let payload = host
///     .invoke(CapabilityKind::Tool, "lookup", json!({"city": "Paris"}), &profile)
///     .await
///     .expect("invocation");
/// assert_eq!(payload["arguments"]["city"], "Paris");
/// # });
/// ```
pub struct ProviderHost {
    connector: Arc<dyn ProviderConnector>,
    slots: Mutex<HashMap<ProviderId, Arc<ProviderSlot>>>,
    connections: RwLock<HashMap<ProviderId, Arc<ManagedConnection>>>,
    router: RwLock<CapabilityRouter>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for ProviderHost {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ProviderHost")
            .field("active_providers", &self.active_providers())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl ProviderHost {
    /// Creates a host that builds connections with `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn ProviderConnector>) -> Self {
        Self {
            connector,
            slots: Mutex::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            router: RwLock::new(CapabilityRouter::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Returns whether [`ProviderHost::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<(), RegisterError> {
        if self.is_shut_down() {
            return Err(RegisterError::HostShutDown);
        }
        Ok(())
    }

    fn slot_for(&self, provider_id: &ProviderId) -> Result<Arc<ProviderSlot>, RegisterError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|err| RegisterError::LockPoisoned(err.to_string()))?;
        Ok(Arc::clone(slots.entry(provider_id.clone()).or_default()))
    }

    fn existing_slot(&self, provider_id: &ProviderId) -> Result<Option<Arc<ProviderSlot>>, String> {
        let slots = self.slots.lock().map_err(|err| err.to_string())?;
        Ok(slots.get(provider_id).cloned())
    }

    fn active_connection(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Option<Arc<ManagedConnection>>, String> {
        let connections = self.connections.read().map_err(|err| err.to_string())?;
        Ok(connections
            .get(provider_id)
            .filter(|connection| connection.state() == ConnectionState::Active)
            .cloned())
    }

    fn reuse(
        connection: &ManagedConnection,
        descriptor: &ProviderDescriptor,
    ) -> Result<ConnectionId, RegisterError> {
        if connection.descriptor() != descriptor {
            return Err(RegisterError::DescriptorMismatch {
                provider_id: descriptor.id().clone(),
            });
        }
        Ok(connection.connection_id())
    }

    /// Registers a provider, connecting it if it is not already active.
    ///
    /// The provider's async mutex is held while connecting. Callers that
    /// queue on it adopt the outcome of the attempt they waited for, success
    /// or failure, instead of starting a second attempt. A later call after a
    /// failure starts a fresh attempt.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::DescriptorMismatch`] when the provider is
    /// active with a different descriptor, [`RegisterError::Connect`] when
    /// connecting fails, or [`RegisterError::HostShutDown`] after shutdown.
    pub async fn register_provider(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> Result<ConnectionId, RegisterError> {
        descriptor.validate()?;
        self.ensure_running()?;
        let provider_id = descriptor.id();
        let slot = self.slot_for(provider_id)?;
        let observed = slot.attempts.load(Ordering::Acquire);
        let mut attempt = slot.state.lock().await;

        if let Some(connection) = attempt
            .connection
            .as_ref()
            .filter(|connection| connection.state() == ConnectionState::Active)
        {
            return Self::reuse(connection, descriptor);
        }
        if slot.attempts.load(Ordering::Acquire) != observed
            && let Some(failure) = attempt.last_failure.clone()
        {
            tracing::debug!(
                provider_id = %provider_id,
                "adopting outcome of failed in-flight registration"
            );
            return Err(RegisterError::Connect(failure));
        }
        self.ensure_running()?;

        let connection = Arc::new(ManagedConnection::new(
            descriptor.clone(),
            self.connector.connection_for(descriptor)?,
        ));
        let outcome = connection.connect().await;
        slot.attempts.fetch_add(1, Ordering::AcqRel);

        let capabilities = match outcome {
            Ok(capabilities) => capabilities,
            Err(err) => {
                self.connections
                    .write()
                    .map_err(|poisoned| RegisterError::LockPoisoned(poisoned.to_string()))?
                    .insert(provider_id.clone(), connection);
                attempt.connection = None;
                attempt.last_failure = Some(err.clone());
                return Err(RegisterError::Connect(err));
            }
        };

        self.publish(descriptor, &connection, &capabilities)?;
        if self.is_shut_down() {
            self.withdraw(&connection);
            if let Err(err) = connection.close().await {
                tracing::warn!(
                    provider_id = %provider_id,
                    error = %err,
                    "close after shutdown failed"
                );
            }
            return Err(RegisterError::HostShutDown);
        }

        attempt.connection = Some(Arc::clone(&connection));
        attempt.last_failure = None;
        tracing::info!(
            provider_id = %provider_id,
            connection_id = %connection.connection_id(),
            "provider registered"
        );
        Ok(connection.connection_id())
    }

    /// Makes a freshly connected provider routable.
    ///
    /// The router entries and the active connection become visible under
    /// the router's write lock, so no reader observes an active provider
    /// without its capabilities.
    fn publish(
        &self,
        descriptor: &ProviderDescriptor,
        connection: &Arc<ManagedConnection>,
        capabilities: &[CapabilityDefinition],
    ) -> Result<(), RegisterError> {
        let mut router = self
            .router
            .write()
            .map_err(|err| RegisterError::LockPoisoned(err.to_string()))?;
        router.register(descriptor, capabilities);
        self.connections
            .write()
            .map_err(|err| RegisterError::LockPoisoned(err.to_string()))?
            .insert(descriptor.id().clone(), Arc::clone(connection));
        Ok(())
    }

    /// Reverts [`Self::publish`] for a connection that lost a race with
    /// shutdown.
    fn withdraw(&self, connection: &Arc<ManagedConnection>) {
        let provider_id = connection.provider_id();
        let mut router = self.router.write().unwrap_or_else(PoisonError::into_inner);
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if connections
            .get(provider_id)
            .is_some_and(|published| Arc::ptr_eq(published, connection))
        {
            connections.remove(provider_id);
            router.unregister(provider_id);
        }
    }

    /// Returns immediately when the provider is already active, otherwise
    /// registers it.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`ProviderHost::register_provider`].
    pub async fn ensure_registered(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> Result<ConnectionId, RegisterError> {
        if let Some(connection) = self
            .active_connection(descriptor.id())
            .map_err(RegisterError::LockPoisoned)?
        {
            return Self::reuse(&connection, descriptor);
        }
        self.register_provider(descriptor).await
    }

    /// Closes a provider's connection and removes its capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NotRegistered`] for an unknown provider, or
    /// [`RegisterError::Close`] when the transport fails to close (the
    /// provider is removed regardless).
    pub async fn unregister_provider(&self, provider_id: &ProviderId) -> Result<(), RegisterError> {
        let slot = self
            .existing_slot(provider_id)
            .map_err(RegisterError::LockPoisoned)?
            .ok_or_else(|| RegisterError::NotRegistered(provider_id.clone()))?;
        let mut attempt = slot.state.lock().await;
        attempt.connection = None;
        attempt.last_failure = None;

        let removed = self
            .connections
            .write()
            .map_err(|err| RegisterError::LockPoisoned(err.to_string()))?
            .remove(provider_id);
        let Some(connection) = removed else {
            return Err(RegisterError::NotRegistered(provider_id.clone()));
        };
        self.router
            .write()
            .map_err(|err| RegisterError::LockPoisoned(err.to_string()))?
            .unregister(provider_id);

        connection.close().await?;
        tracing::info!(provider_id = %provider_id, "provider unregistered");
        Ok(())
    }

    /// Invokes a capability on behalf of a consumer.
    ///
    /// The consumer-level exclude set is checked first, then the capability
    /// is resolved and the full visibility rule is applied to the resolved
    /// entry. Transport loss marks the provider `failed` and removes its
    /// capabilities; there are no retries.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Auth`] when the consumer may not use the
    /// capability, [`HostError::CapabilityNotFound`] when nothing serves it,
    /// [`HostError::ProviderUnavailable`] when the owning connection is gone,
    /// or [`HostError::Invoke`] for provider-reported failures.
    pub async fn invoke(
        &self,
        kind: CapabilityKind,
        name: &str,
        arguments: Value,
        profile: &ConsumerProfile,
    ) -> Result<Value, HostError> {
        FilteringEngine::authorize_request(kind, name, profile)?;

        let target = {
            let router = self
                .router
                .read()
                .map_err(|err| HostError::LockPoisoned(err.to_string()))?;
            match router.resolve_entry(kind, name) {
                Some(entry) => entry.clone(),
                None => {
                    return Err(router.head_entry(kind, name).map_or_else(
                        || HostError::CapabilityNotFound {
                            kind,
                            name: name.to_owned(),
                        },
                        |excluded| {
                            HostError::Auth(AuthError::NotPermitted {
                                consumer: profile.consumer().to_owned(),
                                kind,
                                capability: name.to_owned(),
                                reason: DenialReason::ExcludedByProvider {
                                    provider_id: excluded.provider_id().clone(),
                                },
                            })
                        },
                    ));
                }
            }
        };

        let invocation = CapabilityInvocation::new(profile.consumer(), arguments, target);
        FilteringEngine::authorize(&invocation, profile)?;

        let provider_id = invocation.target.provider_id().clone();
        let connection = self
            .active_connection(&provider_id)
            .map_err(HostError::LockPoisoned)?
            .ok_or_else(|| HostError::ProviderUnavailable {
                provider_id: provider_id.clone(),
                reason: "provider is not active".to_owned(),
            })?;

        tracing::debug!(
            consumer = profile.consumer(),
            provider_id = %provider_id,
            kind = %kind,
            capability = name,
            "invoking capability"
        );
        match connection.invoke(&invocation.to_request()).await {
            Ok(payload) => Ok(payload),
            Err(err) if err.is_connection_lost() => {
                self.handle_connection_lost(&connection).await;
                Err(HostError::ProviderUnavailable {
                    provider_id,
                    reason: err.to_string(),
                })
            }
            Err(err) => Err(HostError::Invoke(err)),
        }
    }

    async fn handle_connection_lost(&self, connection: &ManagedConnection) {
        let provider_id = connection.provider_id();
        connection.mark_failed();
        match self.router.write() {
            Ok(mut router) => {
                router.unregister(provider_id);
            }
            Err(err) => {
                tracing::warn!(provider_id = %provider_id, error = %err, "router lock poisoned");
            }
        }
        if let Err(err) = connection.close().await {
            tracing::warn!(
                provider_id = %provider_id,
                error = %err,
                "failed to release lost provider transport"
            );
        }
    }

    /// Lists the capabilities visible to `profile`, optionally of one kind.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::LockPoisoned`] when the router is unusable.
    pub fn list_capabilities(
        &self,
        kind: Option<CapabilityKind>,
        profile: &ConsumerProfile,
    ) -> Result<Vec<CapabilityListing>, HostError> {
        let router = self
            .router
            .read()
            .map_err(|err| HostError::LockPoisoned(err.to_string()))?;
        let entries = kind.map_or_else(|| router.list_all(), |only| router.list(only));
        Ok(FilteringEngine::filter_list(entries, profile)
            .into_iter()
            .map(|entry| entry.to_listing())
            .collect())
    }

    /// Returns the lifecycle state of the provider's published connection.
    ///
    /// A connection is published once it is routable or once its connect
    /// attempt has failed, so a provider in the middle of its first connect
    /// still reports `unregistered`.
    #[must_use]
    pub fn connection_state(&self, provider_id: &ProviderId) -> ConnectionState {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider_id)
            .map_or(ConnectionState::Unregistered, |connection| {
                connection.state()
            })
    }

    /// Returns the ids of active providers, sorted.
    #[must_use]
    pub fn active_providers(&self) -> Vec<ProviderId> {
        let mut active: Vec<ProviderId> = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|connection| connection.state() == ConnectionState::Active)
            .map(|connection| connection.provider_id().clone())
            .collect();
        active.sort();
        active
    }

    /// Closes every connection and refuses further registrations.
    ///
    /// Close failures are logged and collected, never raised.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.shut_down.store(true, Ordering::Release);
        let drained: Vec<(ProviderId, Arc<ManagedConnection>)> = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        {
            let mut router = self.router.write().unwrap_or_else(PoisonError::into_inner);
            for (provider_id, _) in &drained {
                router.unregister(provider_id);
            }
        }

        let results = join_all(drained.into_iter().map(|(provider_id, connection)| async move {
            let result = connection.close().await;
            (provider_id, result)
        }))
        .await;

        let mut report = ShutdownReport::default();
        for (provider_id, result) in results {
            match result {
                Ok(()) => report.closed.push(provider_id),
                Err(err) => {
                    tracing::warn!(
                        provider_id = %provider_id,
                        error = %err,
                        "provider close failed during shutdown"
                    );
                    report.failures.push(ShutdownFailure {
                        provider_id,
                        reason: err.to_string(),
                    });
                }
            }
        }
        report.closed.sort();
        report
            .failures
            .sort_by(|left, right| left.provider_id.cmp(&right.provider_id));
        tracing::info!(
            closed = report.closed.len(),
            failed = report.failures.len(),
            "provider host shut down"
        );
        report
    }
}

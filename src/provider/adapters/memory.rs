//! In-process provider adapter for deterministic orchestration tests.

use crate::provider::{
    domain::{CapabilityDefinition, CapabilityKind, CapabilityRequest, ProviderId},
    ports::{CloseError, ConnectError, InvokeError, ProviderConnection},
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Handler executed when a scripted capability is invoked.
///
/// Returning `Err(message)` is reported as a provider-side failure.
pub type CapabilityHandler = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// Errors raised while scripting the in-memory catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InMemoryCatalogError {
    /// The catalog lock was poisoned by a panicking writer.
    #[error("in-memory provider catalog lock poisoned: {0}")]
    LockPoisoned(String),
    /// No provider with the given catalog name has been defined.
    #[error("no in-process provider named '{0}'")]
    UnknownProvider(String),
}

type CapabilityKey = (CapabilityKind, String);

#[derive(Default)]
struct ScriptedProvider {
    capabilities: Vec<CapabilityDefinition>,
    handlers: HashMap<CapabilityKey, CapabilityHandler>,
    invoke_delays: HashMap<CapabilityKey, Duration>,
    connect_failure: Option<String>,
    connect_delay: Option<Duration>,
    connection_dropped: bool,
    connect_attempts: u64,
    close_count: u64,
    invocations: Vec<CapabilityRequest>,
}

#[derive(Default)]
struct CatalogState {
    providers: HashMap<String, ScriptedProvider>,
}

/// Catalog of scripted providers reachable over the `in_process` transport.
///
/// Each entry is keyed by the name used in
/// [`InProcessTransportConfig`](crate::provider::domain::InProcessTransportConfig).
/// Clones share state, so a test can keep a handle while the connector owns
/// another and inspect invocation counts afterwards.
#[derive(Clone, Default)]
pub struct InMemoryProviderCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl fmt::Debug for InMemoryProviderCatalog {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .state
            .read()
            .map(|state| state.providers.keys().cloned().collect())
            .unwrap_or_default();
        formatter
            .debug_struct("InMemoryProviderCatalog")
            .field("providers", &names)
            .finish()
    }
}

impl InMemoryProviderCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn write<T>(
        &self,
        name: &str,
        update: impl FnOnce(&mut ScriptedProvider) -> T,
    ) -> Result<T, InMemoryCatalogError> {
        let mut state = self
            .state
            .write()
            .map_err(|err| InMemoryCatalogError::LockPoisoned(err.to_string()))?;
        let provider = state
            .providers
            .get_mut(name)
            .ok_or_else(|| InMemoryCatalogError::UnknownProvider(name.to_owned()))?;
        Ok(update(provider))
    }

    fn read<T>(
        &self,
        name: &str,
        inspect: impl FnOnce(&ScriptedProvider) -> T,
    ) -> Result<T, InMemoryCatalogError> {
        let state = self
            .state
            .read()
            .map_err(|err| InMemoryCatalogError::LockPoisoned(err.to_string()))?;
        let provider = state
            .providers
            .get(name)
            .ok_or_else(|| InMemoryCatalogError::UnknownProvider(name.to_owned()))?;
        Ok(inspect(provider))
    }

    /// Defines (or redefines) a provider and the capabilities it discovers on
    /// connect.
    ///
    /// Redefining keeps registered handlers and counters.
    ///
    /// # Errors
    ///
    /// Returns [`InMemoryCatalogError::LockPoisoned`] when lock acquisition
    /// fails.
    pub fn define(
        &self,
        name: impl Into<String>,
        capabilities: Vec<CapabilityDefinition>,
    ) -> Result<(), InMemoryCatalogError> {
        let mut state = self
            .state
            .write()
            .map_err(|err| InMemoryCatalogError::LockPoisoned(err.to_string()))?;
        state.providers.entry(name.into()).or_default().capabilities = capabilities;
        Ok(())
    }

    /// Installs the handler for one capability.
    ///
    /// Capabilities without a handler answer with an echo of their
    /// arguments.
    ///
    /// # Errors
    ///
    /// Returns [`InMemoryCatalogError`] when the provider is unknown or the
    /// lock is poisoned.
    pub fn on_invoke(
        &self,
        name: &str,
        kind: CapabilityKind,
        capability: impl Into<String>,
        handler: impl Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Result<(), InMemoryCatalogError> {
        let key = (kind, capability.into());
        self.write(name, |provider| {
            provider.handlers.insert(key, Arc::new(handler));
        })
    }

    /// Delays every invocation of one capability.
    ///
    /// # Errors
    ///
    /// Returns [`InMemoryCatalogError`] when the provider is unknown or the
    /// lock is poisoned.
    pub fn delay_invocation(
        &self,
        name: &str,
        kind: CapabilityKind,
        capability: impl Into<String>,
        delay: Duration,
    ) -> Result<(), InMemoryCatalogError> {
        let key = (kind, capability.into());
        self.write(name, |provider| {
            provider.invoke_delays.insert(key, delay);
        })
    }

    /// Makes every subsequent connect attempt fail with `reason`.
    ///
    /// # Errors
    ///
    /// Returns [`InMemoryCatalogError`] when the provider is unknown or the
    /// lock is poisoned.
    pub fn fail_connect(
        &self,
        name: &str,
        reason: impl Into<String>,
    ) -> Result<(), InMemoryCatalogError> {
        let message = reason.into();
        self.write(name, |provider| provider.connect_failure = Some(message))
    }

    /// Lets connect attempts succeed again.
    ///
    /// # Errors
    ///
    /// Returns [`InMemoryCatalogError`] when the provider is unknown or the
    /// lock is poisoned.
    pub fn clear_connect_failure(&self, name: &str) -> Result<(), InMemoryCatalogError> {
        self.write(name, |provider| provider.connect_failure = None)
    }

    /// Delays the handshake of every connect attempt.
    ///
    /// # Errors
    ///
    /// Returns [`InMemoryCatalogError`] when the provider is unknown or the
    /// lock is poisoned.
    pub fn set_connect_delay(
        &self,
        name: &str,
        delay: Duration,
    ) -> Result<(), InMemoryCatalogError> {
        self.write(name, |provider| provider.connect_delay = Some(delay))
    }

    /// Simulates transport loss: invocations fail with `ConnectionLost` until
    /// the provider reconnects.
    ///
    /// # Errors
    ///
    /// Returns [`InMemoryCatalogError`] when the provider is unknown or the
    /// lock is poisoned.
    pub fn drop_connection(&self, name: &str) -> Result<(), InMemoryCatalogError> {
        self.write(name, |provider| provider.connection_dropped = true)
    }

    /// Returns how many connect attempts the provider has seen.
    ///
    /// # Errors
    ///
    /// Returns [`InMemoryCatalogError`] when the provider is unknown or the
    /// lock is poisoned.
    pub fn connect_attempts(&self, name: &str) -> Result<u64, InMemoryCatalogError> {
        self.read(name, |provider| provider.connect_attempts)
    }

    /// Returns how many times the provider's transport was closed.
    ///
    /// # Errors
    ///
    /// Returns [`InMemoryCatalogError`] when the provider is unknown or the
    /// lock is poisoned.
    pub fn close_count(&self, name: &str) -> Result<u64, InMemoryCatalogError> {
        self.read(name, |provider| provider.close_count)
    }

    /// Returns every request the provider received, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`InMemoryCatalogError`] when the provider is unknown or the
    /// lock is poisoned.
    pub fn invocations(&self, name: &str) -> Result<Vec<CapabilityRequest>, InMemoryCatalogError> {
        self.read(name, |provider| provider.invocations.clone())
    }

    /// Creates an unconnected session to the named provider.
    #[must_use]
    pub fn connection(
        &self,
        provider_id: ProviderId,
        name: impl Into<String>,
    ) -> InMemoryProviderConnection {
        InMemoryProviderConnection {
            catalog: self.clone(),
            provider_id,
            name: name.into(),
        }
    }
}

/// A session to one scripted provider.
#[derive(Debug, Clone)]
pub struct InMemoryProviderConnection {
    catalog: InMemoryProviderCatalog,
    provider_id: ProviderId,
    name: String,
}

impl InMemoryProviderConnection {
    fn handshake_error(&self, reason: impl Into<String>) -> ConnectError {
        ConnectError::Handshake {
            provider_id: self.provider_id.clone(),
            reason: reason.into(),
        }
    }

    fn protocol_error(&self, reason: impl Into<String>) -> InvokeError {
        InvokeError::Protocol {
            provider_id: self.provider_id.clone(),
            reason: reason.into(),
        }
    }
}

enum Dispatch {
    Lost,
    Unknown,
    Ready {
        handler: Option<CapabilityHandler>,
        delay: Option<Duration>,
    },
}

#[async_trait]
impl ProviderConnection for InMemoryProviderConnection {
    async fn connect(&self) -> Result<Vec<CapabilityDefinition>, ConnectError> {
        let delay = self
            .catalog
            .write(&self.name, |provider| {
                provider.connect_attempts += 1;
                provider.connect_delay
            })
            .map_err(|err| self.handshake_error(err.to_string()))?;

        if let Some(duration) = delay {
            tokio::time::sleep(duration).await;
        }

        self.catalog
            .write(&self.name, |provider| {
                if let Some(reason) = provider.connect_failure.clone() {
                    return Err(reason);
                }
                provider.connection_dropped = false;
                Ok(provider.capabilities.clone())
            })
            .map_err(|err| self.handshake_error(err.to_string()))?
            .map_err(|reason| self.handshake_error(reason))
    }

    async fn invoke(&self, request: &CapabilityRequest) -> Result<Value, InvokeError> {
        let key = (request.kind, request.name.clone());
        let dispatch = self
            .catalog
            .write(&self.name, |provider| {
                provider.invocations.push(request.clone());
                if provider.connection_dropped {
                    return Dispatch::Lost;
                }
                let known = provider.capabilities.iter().any(|capability| {
                    capability.kind() == request.kind && capability.name() == request.name
                });
                if !known {
                    return Dispatch::Unknown;
                }
                Dispatch::Ready {
                    handler: provider.handlers.get(&key).cloned(),
                    delay: provider.invoke_delays.get(&key).copied(),
                }
            })
            .map_err(|err| self.protocol_error(err.to_string()))?;

        let (handler, delay) = match dispatch {
            Dispatch::Lost => {
                return Err(InvokeError::ConnectionLost {
                    provider_id: self.provider_id.clone(),
                    reason: "in-process provider dropped the connection".to_owned(),
                });
            }
            Dispatch::Unknown => {
                return Err(InvokeError::UnknownCapability {
                    provider_id: self.provider_id.clone(),
                    kind: request.kind,
                    name: request.name.clone(),
                });
            }
            Dispatch::Ready { handler, delay } => (handler, delay),
        };

        if let Some(duration) = delay {
            tokio::time::sleep(duration).await;
        }

        let Some(scripted) = handler else {
            return Ok(json!({ "name": request.name, "arguments": request.arguments }));
        };
        scripted(&request.arguments).map_err(|message| InvokeError::Provider {
            provider_id: self.provider_id.clone(),
            message,
        })
    }

    async fn close(&self) -> Result<(), CloseError> {
        self.catalog
            .write(&self.name, |provider| provider.close_count += 1)
            .map_err(|err| CloseError::new(self.provider_id.clone(), err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn catalog() -> InMemoryProviderCatalog {
        let catalog = InMemoryProviderCatalog::new();
        catalog
            .define(
                "weather",
                vec![
                    CapabilityDefinition::tool("lookup", "Current weather", json!({}))
                        .expect("valid definition"),
                ],
            )
            .expect("define should succeed");
        catalog
    }

    fn weather_connection(catalog: &InMemoryProviderCatalog) -> InMemoryProviderConnection {
        catalog.connection(ProviderId::new("weather").expect("valid id"), "weather")
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn connect_returns_defined_capabilities(catalog: InMemoryProviderCatalog) {
        let connection = weather_connection(&catalog);

        let capabilities = connection.connect().await.expect("connect should succeed");

        assert_eq!(capabilities.len(), 1);
        assert_eq!(catalog.connect_attempts("weather"), Ok(1));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn scripted_connect_failure_is_reported(catalog: InMemoryProviderCatalog) {
        catalog
            .fail_connect("weather", "refused")
            .expect("script should succeed");

        let result = weather_connection(&catalog).connect().await;

        assert!(matches!(result, Err(ConnectError::Handshake { reason, .. }) if reason == "refused"));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn handler_result_is_returned(catalog: InMemoryProviderCatalog) {
        catalog
            .on_invoke("weather", CapabilityKind::Tool, "lookup", |arguments| {
                Ok(json!({"city": arguments.get("city").cloned(), "sky": "sunny"}))
            })
            .expect("script should succeed");
        let connection = weather_connection(&catalog);
        connection.connect().await.expect("connect should succeed");

        let payload = connection
            .invoke(&CapabilityRequest::new(
                CapabilityKind::Tool,
                "lookup",
                json!({"city": "Paris"}),
            ))
            .await
            .expect("invoke should succeed");

        assert_eq!(payload, json!({"city": "Paris", "sky": "sunny"}));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_connection_surfaces_connection_lost(catalog: InMemoryProviderCatalog) {
        let connection = weather_connection(&catalog);
        connection.connect().await.expect("connect should succeed");
        catalog
            .drop_connection("weather")
            .expect("script should succeed");

        let result = connection
            .invoke(&CapabilityRequest::new(
                CapabilityKind::Tool,
                "lookup",
                json!({}),
            ))
            .await;

        assert!(result.is_err_and(|err| err.is_connection_lost()));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_capability_is_rejected(catalog: InMemoryProviderCatalog) {
        let connection = weather_connection(&catalog);
        connection.connect().await.expect("connect should succeed");

        let result = connection
            .invoke(&CapabilityRequest::new(
                CapabilityKind::Prompt,
                "lookup",
                json!({}),
            ))
            .await;

        assert!(matches!(
            result,
            Err(InvokeError::UnknownCapability { kind: CapabilityKind::Prompt, .. })
        ));
    }

    #[test]
    fn scripting_unknown_provider_fails() {
        let catalog = InMemoryProviderCatalog::new();
        assert_eq!(
            catalog.drop_connection("missing"),
            Err(InMemoryCatalogError::UnknownProvider("missing".to_owned()))
        );
    }
}

//! Connector dispatching descriptors to the matching transport adapter.

use super::memory::InMemoryProviderCatalog;
use super::stdio::StdioProviderConnection;
use crate::provider::{
    domain::{ProviderDescriptor, ProviderTransport},
    ports::{ConnectError, ProviderConnection, ProviderConnector},
};

/// Default connector: `stdio` descriptors spawn child processes and
/// `in_process` descriptors are served from an optional catalog.
#[derive(Debug, Clone, Default)]
pub struct TransportConnector {
    catalog: Option<InMemoryProviderCatalog>,
}

impl TransportConnector {
    /// Creates a connector that only supports `stdio` providers.
    #[must_use]
    pub const fn new() -> Self {
        Self { catalog: None }
    }

    /// Serves `in_process` descriptors from `catalog`.
    #[must_use]
    pub fn with_catalog(mut self, catalog: InMemoryProviderCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }
}

impl ProviderConnector for TransportConnector {
    fn connection_for(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> Result<Box<dyn ProviderConnection>, ConnectError> {
        match descriptor.transport() {
            ProviderTransport::Stdio(config) => Ok(Box::new(StdioProviderConnection::new(
                descriptor.id().clone(),
                config.clone(),
            ))),
            ProviderTransport::InProcess(config) => {
                let catalog =
                    self.catalog
                        .as_ref()
                        .ok_or_else(|| ConnectError::UnsupportedTransport {
                            provider_id: descriptor.id().clone(),
                            reason: "no in-process catalog is configured".to_owned(),
                        })?;
                Ok(Box::new(
                    catalog.connection(descriptor.id().clone(), config.name()),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::domain::ProviderId;

    fn in_process_descriptor() -> ProviderDescriptor {
        ProviderDescriptor::new(
            ProviderId::new("weather").expect("valid id"),
            ProviderTransport::in_process("weather").expect("valid transport"),
        )
    }

    #[test]
    fn in_process_requires_a_catalog() {
        let result = TransportConnector::new().connection_for(&in_process_descriptor());
        assert!(matches!(
            result,
            Err(ConnectError::UnsupportedTransport { .. })
        ));
    }

    #[test]
    fn in_process_is_served_from_catalog() {
        let connector = TransportConnector::new().with_catalog(InMemoryProviderCatalog::new());
        assert!(connector.connection_for(&in_process_descriptor()).is_ok());
    }
}

//! Factory port selecting a transport adapter for a descriptor.

use super::{ConnectError, ProviderConnection};
use crate::provider::domain::ProviderDescriptor;

/// Builds an unconnected [`ProviderConnection`] for a descriptor.
///
/// The concrete transport is chosen here, at registration time. No I/O
/// happens until [`ProviderConnection::connect`] is called.
pub trait ProviderConnector: Send + Sync {
    /// Creates a connection for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::UnsupportedTransport`] when no adapter can
    /// serve the descriptor.
    fn connection_for(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> Result<Box<dyn ProviderConnection>, ConnectError>;
}

//! Domain model for provider descriptors, capabilities, and connection state.
//!
//! Descriptors are immutable once built and validated at construction.
//! Infrastructure concerns (processes, pipes, JSON-RPC) remain outside this
//! boundary.

mod capability;
mod descriptor;
mod error;
mod ids;
mod state;
mod transport;

pub(crate) use descriptor::duration_millis;

pub use capability::{CapabilityDefinition, CapabilityKind, CapabilityRequest};
pub use descriptor::{DEFAULT_CONNECT_TIMEOUT, ProviderDescriptor};
pub use error::{ParseCapabilityKindError, ParseConnectionStateError, ProviderDomainError};
pub use ids::{ConnectionId, ProviderId};
pub use state::ConnectionState;
pub use transport::{InProcessTransportConfig, ProviderTransport, StdioTransportConfig};

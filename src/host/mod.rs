//! Connection manager owning every provider session.
//!
//! [`ProviderHost`] registers providers just in time, keeps at most one live
//! connection per provider id, and routes capability invocations through the
//! router and the filtering engine to the owning connection.

mod error;
mod provider_host;
mod report;


pub use error::{HostError, RegisterError};
pub use provider_host::ProviderHost;
pub use report::{ShutdownFailure, ShutdownReport};

//! Port contracts for provider transports.

mod connection;
mod connector;

pub use connection::{CloseError, ConnectError, InvokeError, ProviderConnection};
pub use connector::ProviderConnector;

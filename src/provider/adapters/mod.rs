//! Adapter implementations for the provider connection ports.

pub mod memory;
pub mod stdio;

mod connector;

pub use connector::TransportConnector;

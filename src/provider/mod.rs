//! Provider connections for Palladio.
//!
//! A provider is an external process (or an in-process stand-in) exposing
//! tools, prompts, and resources. This module owns one live session per
//! provider: establishing the transport, discovering the capability
//! inventory, forwarding invocations, and releasing the transport on close.
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The lifecycle-enforcing wrapper in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

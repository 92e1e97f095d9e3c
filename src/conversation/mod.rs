//! Conversation loop subsystem.
//!
//! A run alternates between model calls and capability dispatch through the
//! [`ProviderHost`](crate::host::ProviderHost) until the model gives a final
//! answer or the run is stopped. History is an append-only sequence of
//! role-tagged [`Message`](domain::Message) values that the session store
//! loads and saves whole.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

//! Lifecycle enforcement around raw provider connections.

mod managed;

pub use managed::ManagedConnection;

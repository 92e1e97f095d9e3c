//! Capability indexing, conflict resolution, and access policy.
//!
//! The [`services::CapabilityRouter`] maps `(kind, name)` to the provider
//! that serves it, and the [`services::FilteringEngine`] decides which of
//! those capabilities a consumer may see and call. Both listing and
//! invocation go through the same visibility predicate.

pub mod domain;
pub mod services;

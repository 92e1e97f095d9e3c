//! Routing domain types.

mod entry;
mod error;
mod profile;

pub use entry::{CapabilityEntry, CapabilityInvocation, CapabilityListing};
pub use error::{AuthError, DenialReason, ProfileError};
pub use profile::{ConsumerProfile, DEFAULT_MAX_ITERATIONS};

//! Routing and filtering services.

mod filtering;
mod router;

pub use filtering::FilteringEngine;
pub use router::{CapabilityRouter, Collision, RegistrationReport};

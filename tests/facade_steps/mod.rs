//! Step definitions shared by the facade scenarios.

pub mod world;

mod given;
mod then;
mod when;

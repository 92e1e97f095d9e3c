//! Execution facade: the entry point external callers use.
//!
//! The facade resolves agent configuration, registers the providers an agent
//! needs just in time, loads and saves session history, and drives a
//! conversation loop or a workflow of loops.

mod error;
mod execution;
mod models;
mod outcome;


pub use error::{FacadeError, StepFailure};
pub use execution::ExecutionFacade;
pub use models::ModelRegistry;
pub use outcome::RunOutcome;

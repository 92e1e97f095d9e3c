//! Runtime configuration: providers, agents, and workflows.
//!
//! [`RuntimeConfig`] is the validated document the facade runs from. It is
//! served through the [`ConfigRepository`] port so callers can back it with
//! something other than a static document.

mod agent;
mod error;
mod repository;
mod runtime;
mod template;
mod workflow;

pub use agent::{AgentConfig, DEFAULT_HISTORY_ENABLED};
pub use error::{ConfigError, ConfigRepositoryError, InstructionTemplateError};
pub use repository::{ConfigRepository, StaticConfigRepository};
#[cfg(test)]
pub use repository::MockConfigRepository;
pub use runtime::RuntimeConfig;
pub use template::{render_instructions, validate_instructions};
pub use workflow::WorkflowConfig;

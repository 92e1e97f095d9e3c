//! Agent configuration.

use crate::provider::domain::{ProviderId, duration_millis};
use crate::routing::domain::{ConsumerProfile, DEFAULT_MAX_ITERATIONS, ProfileError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Whether agents persist history when the field is omitted.
pub const DEFAULT_HISTORY_ENABLED: bool = true;

const fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

const fn default_history_enabled() -> bool {
    DEFAULT_HISTORY_ENABLED
}

/// Configuration of one agent.
///
/// `instructions` is a `minijinja` template rendered at the start of each
/// run with `agent`, `providers`, `session_id`, and `date` in scope.
///
/// # Examples
///
/// ```
/// use palladio::config::AgentConfig;
/// use palladio::provider::domain::ProviderId;
///
/// let agent = AgentConfig::new("forecaster")
///     .with_instructions("You are {{ agent }}. Today is {{ date }}.")
///     .with_providers([ProviderId::new("weather").expect("valid id")]);
/// let profile = agent.profile().expect("valid profile");
/// assert_eq!(profile.consumer(), "forecaster");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique agent name, also the consumer name in its profile.
    pub name: String,
    /// Instruction template.
    #[serde(default)]
    pub instructions: String,
    /// Providers the agent may use.
    #[serde(default)]
    pub providers: Vec<ProviderId>,
    /// Capability names hidden from this agent on top of provider exclusions.
    #[serde(default)]
    pub exclude: BTreeSet<String>,
    /// Maximum number of model calls per run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Overall run deadline.
    #[serde(
        default,
        rename = "run_timeout_ms",
        with = "duration_millis::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub run_timeout: Option<Duration>,
    /// Whether runs with a session id load and save history.
    #[serde(default = "default_history_enabled")]
    pub history_enabled: bool,
    /// Name of the model client to use. The facade default applies when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AgentConfig {
    /// Creates an agent with no providers and default limits.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: String::new(),
            providers: Vec::new(),
            exclude: BTreeSet::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            run_timeout: None,
            history_enabled: DEFAULT_HISTORY_ENABLED,
            model: None,
        }
    }

    /// Sets the instruction template.
    #[must_use]
    pub fn with_instructions(mut self, template: impl Into<String>) -> Self {
        self.instructions = template.into();
        self
    }

    /// Sets the allowed providers.
    #[must_use]
    pub fn with_providers(mut self, providers: impl IntoIterator<Item = ProviderId>) -> Self {
        self.providers = providers.into_iter().collect();
        self
    }

    /// Sets the agent-level exclude set.
    #[must_use]
    pub fn with_exclude(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.exclude = names.into_iter().collect();
        self
    }

    /// Sets the iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the run deadline.
    #[must_use]
    pub const fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Enables or disables history persistence.
    #[must_use]
    pub const fn with_history(mut self, enabled: bool) -> Self {
        self.history_enabled = enabled;
        self
    }

    /// Selects a named model client.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builds the consumer profile runs of this agent execute under.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] when the name is empty or a limit is zero.
    pub fn profile(&self) -> Result<ConsumerProfile, ProfileError> {
        ConsumerProfile::new(&self.name, self.providers.iter().cloned())?
            .with_exclude(self.exclude.iter().cloned())
            .with_max_iterations(self.max_iterations)?
            .with_run_timeout(self.run_timeout)
    }
}

//! Port for configuration lookup and its static adapter.

use super::{AgentConfig, ConfigError, ConfigRepositoryError, RuntimeConfig, WorkflowConfig};
use crate::provider::domain::{ProviderDescriptor, ProviderId};
use async_trait::async_trait;
use std::sync::Arc;

/// Source of agent, workflow, and provider configuration.
///
/// Lookups return `Ok(None)` for unknown names; errors are reserved for an
/// unreachable source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Finds an agent by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigRepositoryError`] when the source is unavailable.
    async fn find_agent(&self, name: &str) -> Result<Option<AgentConfig>, ConfigRepositoryError>;

    /// Finds a workflow by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigRepositoryError`] when the source is unavailable.
    async fn find_workflow(
        &self,
        name: &str,
    ) -> Result<Option<WorkflowConfig>, ConfigRepositoryError>;

    /// Finds a provider descriptor by id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigRepositoryError`] when the source is unavailable.
    async fn find_provider(
        &self,
        id: &ProviderId,
    ) -> Result<Option<ProviderDescriptor>, ConfigRepositoryError>;
}

/// Repository serving a validated, immutable [`RuntimeConfig`].
///
/// # Examples
///
/// ```
/// use palladio::config::{AgentConfig, RuntimeConfig, StaticConfigRepository};
///
/// let config = RuntimeConfig {
///     agents: vec![AgentConfig::new("forecaster")],
///     ..RuntimeConfig::default()
/// };
/// let repository = StaticConfigRepository::new(config).expect("valid configuration");
/// assert_eq!(repository.config().agents.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct StaticConfigRepository {
    config: Arc<RuntimeConfig>,
}

impl StaticConfigRepository {
    /// Validates `config` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn new(config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Returns the served configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

#[async_trait]
impl ConfigRepository for StaticConfigRepository {
    async fn find_agent(&self, name: &str) -> Result<Option<AgentConfig>, ConfigRepositoryError> {
        Ok(self.config.agent(name).cloned())
    }

    async fn find_workflow(
        &self,
        name: &str,
    ) -> Result<Option<WorkflowConfig>, ConfigRepositoryError> {
        Ok(self.config.workflow(name).cloned())
    }

    async fn find_provider(
        &self,
        id: &ProviderId,
    ) -> Result<Option<ProviderDescriptor>, ConfigRepositoryError> {
        Ok(self.config.provider(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn lookups_return_none_for_unknown_names() {
        let repository = StaticConfigRepository::new(RuntimeConfig {
            agents: vec![AgentConfig::new("forecaster")],
            ..RuntimeConfig::default()
        })
        .expect("valid configuration");

        let known = repository.find_agent("forecaster").await.expect("lookup");
        let unknown = repository.find_workflow("nightly").await.expect("lookup");
        let provider = repository
            .find_provider(&ProviderId::new("weather").expect("valid id"))
            .await
            .expect("lookup");

        assert!(known.is_some());
        assert!(unknown.is_none());
        assert!(provider.is_none());
    }

    #[rstest]
    fn invalid_configuration_is_refused() {
        let config = RuntimeConfig {
            agents: vec![AgentConfig::new("a"), AgentConfig::new("a")],
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            StaticConfigRepository::new(config),
            Err(ConfigError::DuplicateAgent(_))
        ));
    }
}

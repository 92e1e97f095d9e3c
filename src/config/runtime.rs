//! The validated runtime configuration document.

use super::{AgentConfig, ConfigError, WorkflowConfig, validate_instructions};
use crate::provider::domain::{ProviderDescriptor, ProviderId};
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Providers, agents, and workflows known to one runtime.
///
/// # Examples
///
/// ```
/// use palladio::config::RuntimeConfig;
///
/// let config = RuntimeConfig::from_json_str(r#"{
///     "providers": [
///         {"id": "weather", "transport": {"kind": "in_process", "config": {"name": "weather"}}}
///     ],
///     "agents": [
///         {"name": "forecaster", "providers": ["weather"], "instructions": "Be brief."}
///     ],
///     "workflows": [
///         {"name": "daily", "steps": ["forecaster"]}
///     ]
/// }"#).expect("valid configuration");
///
/// assert_eq!(config.agents.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Provider descriptors.
    #[serde(default)]
    pub providers: Vec<ProviderDescriptor>,
    /// Agent definitions.
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    /// Workflow definitions.
    #[serde(default)]
    pub workflows: Vec<WorkflowConfig>,
}

impl RuntimeConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and any validation
    /// error from [`RuntimeConfig::validate`].
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(document).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// the errors of [`RuntimeConfig::from_json_str`].
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let read_error = |reason: String| ConfigError::Read {
            path: path.to_string(),
            reason,
        };
        let file_name = path
            .file_name()
            .ok_or_else(|| read_error("path must include a file name".to_owned()))?;
        let parent = path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|err| read_error(err.to_string()))?;
        let document = dir
            .read_to_string(file_name)
            .map_err(|err| read_error(err.to_string()))?;
        Self::from_json_str(&document)
    }

    /// Checks cross-references and limits.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: duplicate names, invalid
    /// descriptors or profiles, unknown provider or agent references,
    /// empty workflows, or instruction templates that do not compile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider_ids = self.validate_providers()?;
        let agent_names = self.validate_agents(&provider_ids)?;
        self.validate_workflows(&agent_names)
    }

    /// Returns the descriptor configured for `id`.
    #[must_use]
    pub fn provider(&self, id: &ProviderId) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|descriptor| descriptor.id() == id)
    }

    /// Returns the agent named `name`.
    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|agent| agent.name == name)
    }

    /// Returns the workflow named `name`.
    #[must_use]
    pub fn workflow(&self, name: &str) -> Option<&WorkflowConfig> {
        self.workflows.iter().find(|workflow| workflow.name == name)
    }

    fn validate_providers(&self) -> Result<HashSet<&ProviderId>, ConfigError> {
        let mut seen = HashSet::new();
        for descriptor in &self.providers {
            descriptor
                .validate()
                .map_err(|source| ConfigError::InvalidProvider {
                    provider_id: descriptor.id().clone(),
                    source,
                })?;
            if !seen.insert(descriptor.id()) {
                return Err(ConfigError::DuplicateProvider(descriptor.id().clone()));
            }
        }
        Ok(seen)
    }

    fn validate_agents(
        &self,
        provider_ids: &HashSet<&ProviderId>,
    ) -> Result<HashSet<&str>, ConfigError> {
        let mut seen = HashSet::new();
        for agent in &self.agents {
            agent.profile().map_err(|source| ConfigError::InvalidAgent {
                agent: agent.name.clone(),
                source,
            })?;
            if !seen.insert(agent.name.as_str()) {
                return Err(ConfigError::DuplicateAgent(agent.name.clone()));
            }
            if let Some(missing) = agent
                .providers
                .iter()
                .find(|id| !provider_ids.contains(id))
            {
                return Err(ConfigError::UnknownProvider {
                    agent: agent.name.clone(),
                    provider_id: missing.clone(),
                });
            }
            validate_instructions(agent)?;
        }
        Ok(seen)
    }

    fn validate_workflows(&self, agent_names: &HashSet<&str>) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for workflow in &self.workflows {
            if !seen.insert(workflow.name.as_str()) {
                return Err(ConfigError::DuplicateWorkflow(workflow.name.clone()));
            }
            if workflow.steps.is_empty() {
                return Err(ConfigError::EmptyWorkflow(workflow.name.clone()));
            }
            if let Some(missing) = workflow
                .steps
                .iter()
                .find(|step| !agent_names.contains(step.as_str()))
            {
                return Err(ConfigError::UnknownAgent {
                    workflow: workflow.name.clone(),
                    agent: missing.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::domain::ProfileError;
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn document(agents: Value, workflows: Value) -> String {
        json!({
            "providers": [
                {"id": "weather", "transport": {"kind": "in_process", "config": {"name": "weather"}}},
                {"id": "maps", "transport": {"kind": "stdio", "config": {"command": "maps-server"}}}
            ],
            "agents": agents,
            "workflows": workflows
        })
        .to_string()
    }

    fn id(value: &str) -> ProviderId {
        ProviderId::new(value).expect("valid provider id")
    }

    #[rstest]
    fn valid_document_loads() {
        let config = RuntimeConfig::from_json_str(&document(
            json!([{"name": "forecaster", "providers": ["weather", "maps"]}]),
            json!([{"name": "daily", "steps": ["forecaster", "forecaster"]}]),
        ))
        .expect("valid configuration");

        assert!(config.provider(&id("maps")).is_some());
        assert!(config.agent("forecaster").is_some());
        assert_eq!(
            config.workflow("daily").map(|workflow| workflow.steps.len()),
            Some(2)
        );
    }

    #[rstest]
    #[case(
        json!([{"name": "a", "providers": ["ghost"]}]),
        json!([]),
        ConfigError::UnknownProvider { agent: "a".to_owned(), provider_id: id("ghost") }
    )]
    #[case(
        json!([{"name": "a"}, {"name": "a"}]),
        json!([]),
        ConfigError::DuplicateAgent("a".to_owned())
    )]
    #[case(
        json!([{"name": "a", "max_iterations": 0}]),
        json!([]),
        ConfigError::InvalidAgent { agent: "a".to_owned(), source: ProfileError::ZeroMaxIterations }
    )]
    #[case(
        json!([{"name": "a"}]),
        json!([{"name": "w", "steps": []}]),
        ConfigError::EmptyWorkflow("w".to_owned())
    )]
    #[case(
        json!([{"name": "a"}]),
        json!([{"name": "w", "steps": ["a", "b"]}]),
        ConfigError::UnknownAgent { workflow: "w".to_owned(), agent: "b".to_owned() }
    )]
    #[case(
        json!([{"name": "a"}]),
        json!([{"name": "w", "steps": ["a"]}, {"name": "w", "steps": ["a"]}]),
        ConfigError::DuplicateWorkflow("w".to_owned())
    )]
    fn invalid_references_are_rejected(
        #[case] agents: Value,
        #[case] workflows: Value,
        #[case] expected: ConfigError,
    ) {
        assert_eq!(
            RuntimeConfig::from_json_str(&document(agents, workflows)),
            Err(expected)
        );
    }

    #[rstest]
    fn duplicate_provider_is_rejected() {
        let raw = json!({
            "providers": [
                {"id": "weather", "transport": {"kind": "in_process", "config": {"name": "a"}}},
                {"id": "Weather", "transport": {"kind": "in_process", "config": {"name": "b"}}}
            ]
        });
        assert_eq!(
            RuntimeConfig::from_json_str(&raw.to_string()),
            Err(ConfigError::DuplicateProvider(id("weather")))
        );
    }

    #[rstest]
    fn broken_template_is_rejected() {
        let result = RuntimeConfig::from_json_str(&document(
            json!([{"name": "a", "instructions": "{{ agent "}]),
            json!([]),
        ));
        assert!(matches!(result, Err(ConfigError::Template(_))));
    }

    #[rstest]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            RuntimeConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[rstest]
    fn configuration_is_read_from_disk() {
        let temp = tempfile::TempDir::new().expect("temp dir should be created");
        let path = Utf8PathBuf::from_path_buf(temp.path().join("palladio.json"))
            .expect("temp path should be UTF-8");
        std::fs::write(
            &path,
            document(json!([{"name": "forecaster"}]), json!([])),
        )
        .expect("config should be written");

        let config = RuntimeConfig::from_file(&path).expect("valid configuration");

        assert_eq!(config.providers.len(), 2);
        assert!(matches!(
            RuntimeConfig::from_file(&path.with_file_name("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}

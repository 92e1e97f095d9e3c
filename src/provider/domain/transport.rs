//! Provider transport configuration value objects.

use super::ProviderDomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transport settings for a provider hosted as a child process over STDIO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioTransportConfig {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    working_directory: Option<String>,
}

impl StdioTransportConfig {
    /// Creates a new STDIO transport configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError::EmptyStdioCommand`] when `command` is
    /// empty after trimming.
    pub fn new(command: impl Into<String>) -> Result<Self, ProviderDomainError> {
        let normalized_command = command.into().trim().to_owned();
        if normalized_command.is_empty() {
            return Err(ProviderDomainError::EmptyStdioCommand);
        }

        Ok(Self {
            command: normalized_command,
            args: Vec::new(),
            env: BTreeMap::new(),
            working_directory: None,
        })
    }

    /// Replaces command-line arguments.
    #[must_use]
    pub fn with_args(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.args = values.into_iter().collect();
        self
    }

    /// Replaces process environment variables.
    #[must_use]
    pub fn with_env(mut self, values: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env = values.into_iter().collect();
        self
    }

    /// Sets an explicit working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError::EmptyWorkingDirectory`] when the
    /// provided value is empty after trimming.
    pub fn with_working_directory(
        mut self,
        value: impl Into<String>,
    ) -> Result<Self, ProviderDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(ProviderDomainError::EmptyWorkingDirectory);
        }

        self.working_directory = Some(normalized);
        Ok(self)
    }

    /// Returns the executable command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns command-line arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns environment variables.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns the optional working directory.
    #[must_use]
    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }

    fn validate(&self) -> Result<(), ProviderDomainError> {
        if self.command.trim().is_empty() {
            return Err(ProviderDomainError::EmptyStdioCommand);
        }
        if self
            .working_directory
            .as_deref()
            .is_some_and(|directory| directory.trim().is_empty())
        {
            return Err(ProviderDomainError::EmptyWorkingDirectory);
        }
        Ok(())
    }
}

/// Transport settings for a provider served inside the host process.
///
/// The name selects an entry in the connector's in-process catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InProcessTransportConfig {
    name: String,
}

impl InProcessTransportConfig {
    /// Creates a new in-process transport configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError::EmptyInProcessName`] when `name` is
    /// empty after trimming.
    pub fn new(name: impl Into<String>) -> Result<Self, ProviderDomainError> {
        let normalized = name.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(ProviderDomainError::EmptyInProcessName);
        }
        Ok(Self { name: normalized })
    }

    /// Returns the catalog name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Supported provider transport variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "config")]
pub enum ProviderTransport {
    /// JSON-RPC over a child process's STDIO.
    Stdio(StdioTransportConfig),
    /// A provider living in the host process.
    InProcess(InProcessTransportConfig),
}

impl ProviderTransport {
    /// Creates a `stdio` transport.
    ///
    /// # Errors
    ///
    /// Returns validation errors from [`StdioTransportConfig::new`].
    pub fn stdio(command: impl Into<String>) -> Result<Self, ProviderDomainError> {
        Ok(Self::Stdio(StdioTransportConfig::new(command)?))
    }

    /// Creates an `in_process` transport.
    ///
    /// # Errors
    ///
    /// Returns validation errors from [`InProcessTransportConfig::new`].
    pub fn in_process(name: impl Into<String>) -> Result<Self, ProviderDomainError> {
        Ok(Self::InProcess(InProcessTransportConfig::new(name)?))
    }

    /// Returns the canonical transport name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stdio(_) => "stdio",
            Self::InProcess(_) => "in_process",
        }
    }

    /// Re-validates a transport that may have been deserialised directly.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError`] when a required field is blank.
    pub fn validate(&self) -> Result<(), ProviderDomainError> {
        match self {
            Self::Stdio(config) => config.validate(),
            Self::InProcess(config) if config.name.trim().is_empty() => {
                Err(ProviderDomainError::EmptyInProcessName)
            }
            Self::InProcess(_) => Ok(()),
        }
    }
}

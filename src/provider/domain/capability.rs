//! Capability kinds, definitions, and invocation requests.

use super::{ParseCapabilityKindError, ProviderDomainError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The three kinds of capability a provider can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// An executable tool.
    Tool,
    /// A prompt template.
    Prompt,
    /// A readable resource.
    Resource,
}

impl CapabilityKind {
    /// All kinds in canonical order.
    pub const ALL: [Self; 3] = [Self::Tool, Self::Prompt, Self::Resource];

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Prompt => "prompt",
            Self::Resource => "resource",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for CapabilityKind {
    type Error = ParseCapabilityKindError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "tool" => Ok(Self::Tool),
            "prompt" => Ok(Self::Prompt),
            "resource" => Ok(Self::Resource),
            _ => Err(ParseCapabilityKindError(value.to_owned())),
        }
    }
}

/// Canonical metadata for a capability exposed by a provider.
///
/// # Examples
///
/// ```
/// use palladio::provider::domain::{CapabilityDefinition, CapabilityKind};
/// use serde_json::json;
///
/// let lookup = CapabilityDefinition::tool(
///     "lookup",
///     "Looks up the weather for a city",
///     json!({"type": "object", "properties": {"city": {"type": "string"}}}),
/// )
/// .expect("valid definition");
/// assert_eq!(lookup.kind(), CapabilityKind::Tool);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDefinition {
    name: String,
    kind: CapabilityKind,
    #[serde(default)]
    description: String,
    #[serde(default = "empty_object_schema")]
    schema: Value,
}

fn empty_object_schema() -> Value {
    Value::Object(serde_json::Map::new())
}

impl CapabilityDefinition {
    /// Creates a capability definition.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderDomainError::EmptyCapabilityName`] when the name is
    /// empty after trimming.
    pub fn new(
        name: impl Into<String>,
        kind: CapabilityKind,
        description: impl Into<String>,
        schema: Value,
    ) -> Result<Self, ProviderDomainError> {
        let normalized_name = name.into().trim().to_owned();
        if normalized_name.is_empty() {
            return Err(ProviderDomainError::EmptyCapabilityName);
        }

        Ok(Self {
            name: normalized_name,
            kind,
            description: description.into().trim().to_owned(),
            schema,
        })
    }

    /// Creates a tool definition.
    ///
    /// # Errors
    ///
    /// Returns validation errors from [`CapabilityDefinition::new`].
    pub fn tool(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
    ) -> Result<Self, ProviderDomainError> {
        Self::new(name, CapabilityKind::Tool, description, schema)
    }

    /// Creates a prompt definition.
    ///
    /// # Errors
    ///
    /// Returns validation errors from [`CapabilityDefinition::new`].
    pub fn prompt(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
    ) -> Result<Self, ProviderDomainError> {
        Self::new(name, CapabilityKind::Prompt, description, schema)
    }

    /// Creates a resource definition.
    ///
    /// # Errors
    ///
    /// Returns validation errors from [`CapabilityDefinition::new`].
    pub fn resource(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, ProviderDomainError> {
        Self::new(
            name,
            CapabilityKind::Resource,
            description,
            empty_object_schema(),
        )
    }

    /// Returns the capability name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the capability kind.
    #[must_use]
    pub const fn kind(&self) -> CapabilityKind {
        self.kind
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the argument schema.
    #[must_use]
    pub const fn schema(&self) -> &Value {
        &self.schema
    }
}

/// A request to execute one capability on a provider.
///
/// Serialises as the invocation message `{name, kind, arguments}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRequest {
    /// Capability name.
    pub name: String,
    /// Capability kind.
    pub kind: CapabilityKind,
    /// Arguments as a JSON object.
    #[serde(default = "empty_object_schema")]
    pub arguments: Value,
}

impl CapabilityRequest {
    /// Creates a capability request.
    #[must_use]
    pub fn new(kind: CapabilityKind, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("tool", CapabilityKind::Tool)]
    #[case(" Prompt", CapabilityKind::Prompt)]
    #[case("RESOURCE", CapabilityKind::Resource)]
    fn kind_parses_case_insensitively(#[case] input: &str, #[case] expected: CapabilityKind) {
        assert_eq!(CapabilityKind::try_from(input), Ok(expected));
    }

    #[test]
    fn kind_rejects_unknown_values() {
        let error = CapabilityKind::try_from("widget").expect_err("unknown kind");
        assert!(error.to_string().contains("widget"));
    }

    #[test]
    fn definition_rejects_blank_name() {
        let result = CapabilityDefinition::tool("  ", "desc", json!({}));
        assert_eq!(result, Err(ProviderDomainError::EmptyCapabilityName));
    }

    #[test]
    fn definition_deserializes_with_defaults() {
        let definition: CapabilityDefinition =
            serde_json::from_value(json!({"name": "readme", "kind": "resource"}))
                .expect("definition should deserialize");
        assert_eq!(definition.description(), "");
        assert_eq!(definition.schema(), &json!({}));
    }

    #[test]
    fn request_serializes_as_invocation_message() {
        let request =
            CapabilityRequest::new(CapabilityKind::Tool, "lookup", json!({"city": "Paris"}));
        let value = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(
            value,
            json!({"name": "lookup", "kind": "tool", "arguments": {"city": "Paris"}})
        );
    }
}

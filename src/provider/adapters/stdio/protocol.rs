//! Wire types for the line-delimited JSON-RPC provider protocol.

use crate::provider::domain::{CapabilityDefinition, CapabilityKind, ProviderDomainError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Protocol revision announced during `initialize`.
pub(super) const PROTOCOL_VERSION: &str = "2024-11-05";

/// Standard JSON-RPC "method not found" code.
pub(super) const METHOD_NOT_FOUND: i64 = -32_601;

#[derive(Debug, Clone, Serialize)]
pub(super) struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub(super) const fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(super) struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    pub(super) const fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct JsonRpcResponse {
    pub(super) id: Option<u64>,
    #[serde(default)]
    pub(super) result: Option<Value>,
    #[serde(default)]
    pub(super) error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(super) struct JsonRpcError {
    pub(super) code: i64,
    pub(super) message: String,
}

/// Builds the `initialize` request parameters.
pub(super) fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

/// Returns which listing methods the provider advertised.
///
/// A provider that omits the `capabilities` object is listed for every kind.
pub(super) fn advertised_kinds(initialize_result: &Value) -> Vec<CapabilityKind> {
    let Some(advertised) = initialize_result.get("capabilities").and_then(Value::as_object)
    else {
        return CapabilityKind::ALL.to_vec();
    };
    CapabilityKind::ALL
        .into_iter()
        .filter(|kind| advertised.contains_key(listing_key(*kind)))
        .collect()
}

/// Returns the JSON-RPC method listing capabilities of `kind`.
pub(super) const fn list_method(kind: CapabilityKind) -> &'static str {
    match kind {
        CapabilityKind::Tool => "tools/list",
        CapabilityKind::Prompt => "prompts/list",
        CapabilityKind::Resource => "resources/list",
    }
}

const fn listing_key(kind: CapabilityKind) -> &'static str {
    match kind {
        CapabilityKind::Tool => "tools",
        CapabilityKind::Prompt => "prompts",
        CapabilityKind::Resource => "resources",
    }
}

/// Returns the method and parameters invoking one capability.
pub(super) fn invocation(kind: CapabilityKind, name: &str, arguments: &Value) -> (&'static str, Value) {
    match kind {
        CapabilityKind::Tool => ("tools/call", json!({"name": name, "arguments": arguments})),
        CapabilityKind::Prompt => ("prompts/get", json!({"name": name, "arguments": arguments})),
        CapabilityKind::Resource => ("resources/read", json!({"uri": name})),
    }
}

#[derive(Debug, Deserialize)]
struct ToolListing {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "inputSchema")]
    input_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PromptArgument {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    required: bool,
}

#[derive(Debug, Deserialize)]
struct PromptListing {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    arguments: Vec<PromptArgument>,
}

#[derive(Debug, Deserialize)]
struct ResourceListing {
    uri: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

/// Errors raised while decoding a listing result.
#[derive(Debug, thiserror::Error)]
pub(super) enum ListingDecodeError {
    /// The result did not match the listing shape.
    #[error("malformed {method} result: {source}")]
    Shape {
        /// Listing method.
        method: &'static str,
        /// Decoder failure.
        source: serde_json::Error,
    },
    /// An entry failed domain validation.
    #[error("invalid entry in {method} result: {source}")]
    Entry {
        /// Listing method.
        method: &'static str,
        /// Validation failure.
        source: ProviderDomainError,
    },
}

/// Decodes a `*/list` result into canonical definitions.
///
/// Resources are addressed by URI, so the URI becomes the capability name.
pub(super) fn decode_listing(
    kind: CapabilityKind,
    result: Value,
) -> Result<Vec<CapabilityDefinition>, ListingDecodeError> {
    let method = list_method(kind);
    let entries = result
        .get(listing_key(kind))
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    let shape = |source: serde_json::Error| ListingDecodeError::Shape { method, source };
    let entry = |source: ProviderDomainError| ListingDecodeError::Entry { method, source };

    match kind {
        CapabilityKind::Tool => serde_json::from_value::<Vec<ToolListing>>(entries)
            .map_err(shape)?
            .into_iter()
            .map(|tool| {
                let schema = tool
                    .input_schema
                    .unwrap_or_else(|| json!({"type": "object"}));
                CapabilityDefinition::tool(tool.name, tool.description, schema).map_err(entry)
            })
            .collect(),
        CapabilityKind::Prompt => serde_json::from_value::<Vec<PromptListing>>(entries)
            .map_err(shape)?
            .into_iter()
            .map(|prompt| {
                let schema = prompt_schema(&prompt.arguments);
                CapabilityDefinition::prompt(prompt.name, prompt.description, schema)
                    .map_err(entry)
            })
            .collect(),
        CapabilityKind::Resource => serde_json::from_value::<Vec<ResourceListing>>(entries)
            .map_err(shape)?
            .into_iter()
            .map(|resource| {
                let description = if resource.description.is_empty() {
                    resource.name
                } else {
                    resource.description
                };
                CapabilityDefinition::resource(resource.uri, description).map_err(entry)
            })
            .collect(),
    }
}

fn prompt_schema(arguments: &[PromptArgument]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for argument in arguments {
        properties.insert(
            argument.name.clone(),
            json!({"type": "string", "description": argument.description}),
        );
        if argument.required {
            required.push(Value::String(argument.name.clone()));
        }
    }
    json!({"type": "object", "properties": properties, "required": required})
}

/// Extracts a failure message from a `tools/call` result flagged `isError`.
pub(super) fn tool_error_message(result: &Value) -> Option<String> {
    if !result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return None;
    }
    let text: Vec<&str> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    if text.is_empty() {
        return Some("tool reported an error".to_owned());
    }
    Some(text.join("\n"))
}

//! Provider connection backed by a spawned child process.

use super::protocol::{
    METHOD_NOT_FOUND, advertised_kinds, decode_listing, initialize_params, invocation,
    list_method, tool_error_message,
};
use super::transport::{RpcFailure, StdioTransport};
use crate::provider::{
    domain::{
        CapabilityDefinition, CapabilityKind, CapabilityRequest, ProviderId, StdioTransportConfig,
    },
    ports::{CloseError, ConnectError, InvokeError, ProviderConnection},
};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// Grace period between the `shutdown` notification and a forced kill.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Bound on delivering the `shutdown` notification. The pipes stay locked
/// while a call waits for its response, so an unanswered call must not hold
/// up the close.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(1);

/// A provider hosted as a child process speaking JSON-RPC over STDIO.
///
/// The child is spawned with `kill_on_drop`, so dropping the connection (or
/// the connect future, when a timeout fires) terminates the process.
pub struct StdioProviderConnection {
    provider_id: ProviderId,
    config: StdioTransportConfig,
    transport: RwLock<Option<Arc<StdioTransport>>>,
    child: Mutex<Option<Child>>,
}

impl std::fmt::Debug for StdioProviderConnection {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StdioProviderConnection")
            .field("provider_id", &self.provider_id)
            .field("command", &self.config.command())
            .finish_non_exhaustive()
    }
}

impl StdioProviderConnection {
    /// Creates an unconnected STDIO connection.
    #[must_use]
    pub fn new(provider_id: ProviderId, config: StdioTransportConfig) -> Self {
        Self {
            provider_id,
            config,
            transport: RwLock::new(None),
            child: Mutex::new(None),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(self.config.command());
        command
            .args(self.config.args())
            .envs(self.config.env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(directory) = self.config.working_directory() {
            command.current_dir(directory);
        }
        command
    }

    fn handshake_failure(&self, failure: RpcFailure) -> ConnectError {
        if failure.is_transport_loss() {
            return ConnectError::ProcessExited {
                provider_id: self.provider_id.clone(),
                reason: failure.to_string(),
            };
        }
        ConnectError::Handshake {
            provider_id: self.provider_id.clone(),
            reason: failure.to_string(),
        }
    }

    fn spawn_failure(&self, reason: impl Into<String>) -> ConnectError {
        ConnectError::Spawn {
            provider_id: self.provider_id.clone(),
            reason: reason.into(),
        }
    }

    async fn discover(
        &self,
        transport: &StdioTransport,
    ) -> Result<Vec<CapabilityDefinition>, ConnectError> {
        let initialized = transport
            .request("initialize", Some(initialize_params()))
            .await
            .map_err(|failure| self.handshake_failure(failure))?;
        transport
            .notify("notifications/initialized", None)
            .await
            .map_err(|failure| self.handshake_failure(failure))?;

        let mut capabilities = Vec::new();
        for kind in advertised_kinds(&initialized) {
            let listing = match transport.request(list_method(kind), None).await {
                Ok(result) => result,
                Err(RpcFailure::Remote { code, .. }) if code == METHOD_NOT_FOUND => continue,
                Err(failure) => return Err(self.handshake_failure(failure)),
            };
            let definitions = decode_listing(kind, listing).map_err(|err| ConnectError::Handshake {
                provider_id: self.provider_id.clone(),
                reason: err.to_string(),
            })?;
            capabilities.extend(definitions);
        }
        Ok(capabilities)
    }

    fn current_transport(&self) -> Result<Arc<StdioTransport>, InvokeError> {
        let guard = self.transport.read().map_err(|err| InvokeError::Protocol {
            provider_id: self.provider_id.clone(),
            reason: err.to_string(),
        })?;
        guard.clone().ok_or_else(|| InvokeError::ConnectionLost {
            provider_id: self.provider_id.clone(),
            reason: "transport is not established".to_owned(),
        })
    }

    fn invoke_failure(&self, request: &CapabilityRequest, failure: RpcFailure) -> InvokeError {
        match failure {
            RpcFailure::Io(_) | RpcFailure::Closed => InvokeError::ConnectionLost {
                provider_id: self.provider_id.clone(),
                reason: failure.to_string(),
            },
            RpcFailure::Remote { code, .. } if code == METHOD_NOT_FOUND => {
                InvokeError::UnknownCapability {
                    provider_id: self.provider_id.clone(),
                    kind: request.kind,
                    name: request.name.clone(),
                }
            }
            RpcFailure::Remote { message, .. } => InvokeError::Provider {
                provider_id: self.provider_id.clone(),
                message,
            },
            RpcFailure::Malformed(reason) => InvokeError::Protocol {
                provider_id: self.provider_id.clone(),
                reason,
            },
        }
    }
}

#[async_trait]
impl ProviderConnection for StdioProviderConnection {
    async fn connect(&self) -> Result<Vec<CapabilityDefinition>, ConnectError> {
        tracing::debug!(
            provider_id = %self.provider_id,
            command = self.config.command(),
            "spawning stdio provider"
        );
        let mut child = self
            .command()
            .spawn()
            .map_err(|err| self.spawn_failure(err.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.spawn_failure("failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.spawn_failure("failed to capture stdout"))?;

        let transport = Arc::new(StdioTransport::new(stdin, stdout));
        let capabilities = self.discover(&transport).await?;

        *self.child.lock().await = Some(child);
        let mut slot = self.transport.write().map_err(|err| ConnectError::Handshake {
            provider_id: self.provider_id.clone(),
            reason: err.to_string(),
        })?;
        *slot = Some(transport);
        Ok(capabilities)
    }

    async fn invoke(&self, request: &CapabilityRequest) -> Result<Value, InvokeError> {
        let transport = self.current_transport()?;
        let (method, params) = invocation(request.kind, &request.name, &request.arguments);
        let result = transport
            .request(method, Some(params))
            .await
            .map_err(|failure| self.invoke_failure(request, failure))?;

        if request.kind == CapabilityKind::Tool
            && let Some(message) = tool_error_message(&result)
        {
            return Err(InvokeError::Provider {
                provider_id: self.provider_id.clone(),
                message,
            });
        }
        Ok(result)
    }

    async fn close(&self) -> Result<(), CloseError> {
        let released = self
            .transport
            .write()
            .map_err(|err| CloseError::new(self.provider_id.clone(), err.to_string()))?
            .take();
        if let Some(transport) = released {
            let delivered =
                tokio::time::timeout(NOTIFY_TIMEOUT, transport.notify("shutdown", None)).await;
            match delivered {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => tracing::debug!(
                    provider_id = %self.provider_id,
                    error = %failure,
                    "shutdown notification not delivered"
                ),
                Err(_) => tracing::debug!(
                    provider_id = %self.provider_id,
                    "provider pipes busy; skipping shutdown notification"
                ),
            }
        }

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await.is_ok() {
            return Ok(());
        }
        tracing::warn!(
            provider_id = %self.provider_id,
            "provider ignored shutdown; killing process"
        );
        child
            .kill()
            .await
            .map_err(|err| CloseError::new(self.provider_id.clone(), err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider_id() -> ProviderId {
        ProviderId::new("scripted").expect("valid id")
    }

    fn shell_provider(script: &str) -> StdioProviderConnection {
        let config = StdioTransportConfig::new("sh")
            .expect("valid command")
            .with_args(["-c".to_owned(), script.to_owned()]);
        StdioProviderConnection::new(provider_id(), config)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_binary_is_a_spawn_failure() {
        let config =
            StdioTransportConfig::new("palladio-provider-that-does-not-exist").expect("valid command");
        let connection = StdioProviderConnection::new(provider_id(), config);

        let result = connection.connect().await;

        assert!(matches!(result, Err(ConnectError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn handshake_discovers_tools_and_forwards_calls() {
        let script = r#"
read line
echo '{"jsonrpc":"2.0","id":1,"result":{"capabilities":{"tools":{}}}}'
read line
read line
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"lookup","description":"Weather","inputSchema":{"type":"object"}}]}}'
read line
echo 'provider log line'
echo '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"sunny"}]}}'
read line
"#;
        let connection = shell_provider(script);

        let capabilities = connection.connect().await.expect("connect should succeed");
        let payload = connection
            .invoke(&CapabilityRequest::new(
                CapabilityKind::Tool,
                "lookup",
                json!({"city": "Paris"}),
            ))
            .await
            .expect("invoke should succeed");
        connection.close().await.expect("close should succeed");

        assert_eq!(capabilities.len(), 1);
        assert_eq!(payload.pointer("/content/0/text"), Some(&json!("sunny")));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn early_exit_is_reported_as_process_exit() {
        let connection = shell_provider("exit 0");

        let result = connection.connect().await;

        assert!(matches!(result, Err(ConnectError::ProcessExited { .. })));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn close_is_not_held_up_by_an_unanswered_call() {
        let script = r#"
read line
echo '{"jsonrpc":"2.0","id":1,"result":{"capabilities":{"tools":{}}}}'
read line
read line
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"lookup"}]}}'
read line
exec sleep 600
"#;
        let connection = Arc::new(shell_provider(script));
        connection.connect().await.expect("connect should succeed");

        let caller = Arc::clone(&connection);
        let pending = tokio::spawn(async move {
            caller
                .invoke(&CapabilityRequest::new(
                    CapabilityKind::Tool,
                    "lookup",
                    json!({}),
                ))
                .await
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!pending.is_finished());

        let closed = tokio::time::timeout(Duration::from_secs(15), connection.close()).await;
        assert!(closed.is_ok_and(|result| result.is_ok()));

        let abandoned = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .expect("killed provider should end the call")
            .expect("task should not panic");
        assert!(abandoned.is_err_and(|err| err.is_connection_lost()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn close_without_connect_is_a_no_op() {
        let connection = shell_provider("exit 0");
        assert!(connection.close().await.is_ok());
        assert!(connection.close().await.is_ok());
    }
}

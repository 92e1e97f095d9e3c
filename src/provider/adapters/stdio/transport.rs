//! Request/response exchange over a child process's stdin and stdout.

use super::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::Mutex;

/// Failures of a single JSON-RPC exchange.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub(super) enum RpcFailure {
    /// Reading or writing the pipes failed.
    #[error("i/o failure: {0}")]
    Io(String),
    /// The provider closed stdout.
    #[error("provider closed its stdout")]
    Closed,
    /// The provider answered with a JSON-RPC error object.
    #[error("remote error {code}: {message}")]
    Remote {
        /// JSON-RPC error code.
        code: i64,
        /// Provider-supplied message.
        message: String,
    },
    /// The response carried neither `result` nor `error`.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RpcFailure {
    /// Returns whether the pipes are gone.
    pub(super) const fn is_transport_loss(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Closed)
    }
}

struct Pipes {
    writer: ChildStdin,
    reader: BufReader<ChildStdout>,
}

/// Line-delimited JSON-RPC channel to one provider process.
///
/// The pipe pair is locked for a whole exchange, so concurrent callers are
/// served one request at a time and never read each other's responses.
pub(super) struct StdioTransport {
    pipes: Mutex<Pipes>,
    next_id: AtomicU64,
}

impl StdioTransport {
    pub(super) fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        Self {
            pipes: Mutex::new(Pipes {
                writer: stdin,
                reader: BufReader::new(stdout),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Sends a request and waits for the response with the matching id.
    ///
    /// Lines that are not JSON-RPC responses (log output, notifications) are
    /// skipped.
    pub(super) async fn request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, RpcFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = encode_line(&JsonRpcRequest::new(id, method, params))?;

        let mut pipes = self.pipes.lock().await;
        write_line(&mut pipes.writer, &line).await?;

        let mut buffer = String::new();
        loop {
            buffer.clear();
            let read = pipes
                .reader
                .read_line(&mut buffer)
                .await
                .map_err(|err| RpcFailure::Io(err.to_string()))?;
            if read == 0 {
                return Err(RpcFailure::Closed);
            }

            let trimmed = buffer.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(response) if response.id == Some(id) => return into_result(response),
                Ok(_) | Err(_) => {
                    tracing::trace!(method, "skipping unrelated provider output");
                }
            }
        }
    }

    /// Sends a notification; no response is expected.
    pub(super) async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), RpcFailure> {
        let line = encode_line(&JsonRpcNotification::new(method, params))?;
        let mut pipes = self.pipes.lock().await;
        write_line(&mut pipes.writer, &line).await
    }
}

fn encode_line(message: &impl serde::Serialize) -> Result<String, RpcFailure> {
    let mut line =
        serde_json::to_string(message).map_err(|err| RpcFailure::Malformed(err.to_string()))?;
    line.push('\n');
    Ok(line)
}

async fn write_line(writer: &mut ChildStdin, line: &str) -> Result<(), RpcFailure> {
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|err| RpcFailure::Io(err.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|err| RpcFailure::Io(err.to_string()))
}

fn into_result(response: JsonRpcResponse) -> Result<Value, RpcFailure> {
    if let Some(error) = response.error {
        return Err(RpcFailure::Remote {
            code: error.code,
            message: error.message,
        });
    }
    response
        .result
        .ok_or_else(|| RpcFailure::Malformed("response has neither result nor error".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> JsonRpcResponse {
        serde_json::from_value(value).expect("response should deserialize")
    }

    #[test]
    fn result_is_extracted() {
        let result = into_result(response(json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": 1}})));
        assert_eq!(result, Ok(json!({"ok": 1})));
    }

    #[test]
    fn error_object_becomes_remote_failure() {
        let result = into_result(response(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "Method not found"}
        })));
        assert_eq!(
            result,
            Err(RpcFailure::Remote {
                code: -32_601,
                message: "Method not found".to_owned(),
            })
        );
    }

    #[test]
    fn empty_response_is_malformed() {
        let result = into_result(response(json!({"jsonrpc": "2.0", "id": 1})));
        assert!(matches!(result, Err(RpcFailure::Malformed(_))));
    }

    #[test]
    fn closed_pipe_counts_as_transport_loss() {
        assert!(RpcFailure::Closed.is_transport_loss());
        assert!(!RpcFailure::Malformed(String::new()).is_transport_loss());
    }
}

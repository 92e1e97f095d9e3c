//! Scripted model client for tests and demos.
//!
//! Responses are replayed from a queue. Once the queue is empty an optional
//! rule closure answers instead, which suits "always call a tool" style
//! scripts. Every request is recorded for later inspection.

use crate::conversation::domain::Message;
use crate::conversation::ports::{ModelClient, ModelError, ModelResponse};
use crate::routing::domain::CapabilityListing;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Closure answering a turn once the queued responses run out.
pub type ModelRule =
    Arc<dyn Fn(&[Message], &[CapabilityListing]) -> Result<ModelResponse, ModelError> + Send + Sync>;

/// One request received by a [`ScriptedModelClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Conversation sent to the model.
    pub messages: Vec<Message>,
    /// Capabilities visible for the turn.
    pub capabilities: Vec<CapabilityListing>,
}

#[derive(Default)]
struct ScriptState {
    queue: VecDeque<Result<ModelResponse, ModelError>>,
    rule: Option<ModelRule>,
    delay: Option<Duration>,
    served: usize,
    requests: Vec<RecordedRequest>,
}

/// Model client that replays scripted responses.
///
/// Clones share the same script and request log.
///
/// # Examples
///
/// ```
/// use palladio::conversation::adapters::ScriptedModelClient;
/// use palladio::conversation::ports::ModelResponse;
/// use serde_json::json;
///
/// let model = ScriptedModelClient::new()
///     .with_response(ModelResponse::tool_call("lookup", json!({"city": "Paris"})))
///     .with_response(ModelResponse::answer("Sunny, 20C in Paris."));
/// assert_eq!(model.request_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct ScriptedModelClient {
    state: Arc<Mutex<ScriptState>>,
}

impl fmt::Debug for ScriptedModelClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ScriptedModelClient")
            .field("requests", &self.request_count())
            .finish_non_exhaustive()
    }
}

impl ScriptedModelClient {
    /// Creates a client with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a response to the script.
    #[must_use]
    pub fn with_response(self, response: ModelResponse) -> Self {
        self.enqueue(Ok(response));
        self
    }

    /// Appends a failure to the script.
    #[must_use]
    pub fn with_error(self, error: ModelError) -> Self {
        self.enqueue(Err(error));
        self
    }

    /// Installs the rule used once the queue is empty.
    #[must_use]
    pub fn with_rule<F>(self, rule: F) -> Self
    where
        F: Fn(&[Message], &[CapabilityListing]) -> Result<ModelResponse, ModelError>
            + Send
            + Sync
            + 'static,
    {
        self.update(|state| state.rule = Some(Arc::new(rule)));
        self
    }

    /// Delays every response, simulating a slow backend.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        self.update(|state| state.delay = Some(delay));
        self
    }

    /// Appends a response to a shared script after construction.
    pub fn enqueue(&self, response: Result<ModelResponse, ModelError>) {
        self.update(|state| state.queue.push_back(response));
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.read(|state| state.requests.clone())
    }

    /// Returns the number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.read(|state| state.requests.len())
    }

    fn update(&self, apply: impl FnOnce(&mut ScriptState)) {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        apply(&mut guard);
    }

    fn read<T>(&self, view: impl FnOnce(&ScriptState) -> T) -> T {
        let guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        view(&guard)
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn complete(
        &self,
        messages: &[Message],
        capabilities: &[CapabilityListing],
    ) -> Result<ModelResponse, ModelError> {
        let (next, delay) = {
            let mut guard = self
                .state
                .lock()
                .map_err(|err| ModelError::LockPoisoned(err.to_string()))?;
            guard.requests.push(RecordedRequest {
                messages: messages.to_vec(),
                capabilities: capabilities.to_vec(),
            });
            let fallback = guard.rule.clone();
            let served = guard.served;
            let next = guard.queue.pop_front().unwrap_or_else(|| {
                fallback.map_or_else(
                    || Err(ModelError::ScriptExhausted(served)),
                    |rule| rule(messages, capabilities),
                )
            });
            guard.served += 1;
            (next, guard.delay)
        };
        if let Some(pause) = delay {
            tokio::time::sleep(pause).await;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockable::DefaultClock;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[tokio::test]
    async fn queue_is_served_before_the_rule() {
        let model = ScriptedModelClient::new()
            .with_response(ModelResponse::answer("first"))
            .with_rule(|_, _| Ok(ModelResponse::answer("ruled")));
        let history = [Message::user("hi", &DefaultClock)];

        let first = model.complete(&history, &[]).await.expect("scripted response");
        let second = model.complete(&history, &[]).await.expect("rule response");

        assert_eq!(first, ModelResponse::answer("first"));
        assert_eq!(second, ModelResponse::answer("ruled"));
        assert_eq!(model.request_count(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn exhausted_script_fails() {
        let model = ScriptedModelClient::new()
            .with_response(ModelResponse::tool_call("lookup", json!({"city": "Paris"})));

        model.complete(&[], &[]).await.expect("scripted response");
        let result = model.complete(&[], &[]).await;

        assert!(matches!(result, Err(ModelError::ScriptExhausted(1))));
    }

    #[rstest]
    #[tokio::test]
    async fn requests_are_recorded_with_their_history() {
        let model = ScriptedModelClient::new().with_response(ModelResponse::answer("ok"));
        let history = [Message::user("hi", &DefaultClock)];

        model.complete(&history, &[]).await.expect("scripted response");

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests.first().map(|request| request.messages.as_slice()),
            Some(history.as_slice())
        );
    }
}

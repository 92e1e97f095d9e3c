//! The conversation loop state machine.
//!
//! `Idle -> Thinking -> {ToolDispatch -> Thinking}* -> Done | Aborted`.
//! Every transition first checks whether the run was cancelled, lost its
//! observer, or passed its deadline. Model calls and capability dispatch
//! are the suspension points and race against the same conditions.

use super::dispatch::dispatch_calls;
use super::outcome::{LoopError, LoopOutcome};
use crate::conversation::domain::{
    CapabilityOutcome, ConversationState, LoopEvent, LoopState, Message, OutcomeError, Role,
    RunId, RunStatus, ToolCallPart, ToolResultPart,
};
use crate::conversation::ports::{ModelClient, ModelResponse, RequestedCall};
use crate::host::ProviderHost;
use crate::routing::domain::ConsumerProfile;
use mockable::Clock;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Inputs that seed the conversation in the `Idle` state.
#[derive(Debug, Clone, Default)]
pub struct LoopSeed {
    /// Rendered system instructions. Skipped when blank.
    pub instructions: String,
    /// Prior history loaded from the session store. System messages in it
    /// are dropped.
    pub history: Vec<Message>,
    /// The new user message.
    pub user_message: String,
}

/// Drives one consumer's conversation against the model and the host.
///
/// A loop is built per run from the consumer profile the run executes
/// under; the profile is read-only for the whole run.
///
/// # Examples
///
/// ```
/// use palladio::conversation::adapters::ScriptedModelClient;
/// use palladio::conversation::ports::ModelResponse;
/// use palladio::conversation::services::{ConversationLoop, LoopSeed};
/// use palladio::conversation::domain::RunStatus;
/// use palladio::host::ProviderHost;
/// use palladio::provider::adapters::TransportConnector;
/// use palladio::routing::domain::ConsumerProfile;
/// use mockable::DefaultClock;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let host = Arc::new(ProviderHost::new(Arc::new(TransportConnector::new())));
/// let model = Arc::new(ScriptedModelClient::new().with_response(ModelResponse::answer("Hi.")));
/// let profile = ConsumerProfile::new("greeter", Vec::new()).expect("valid profile");
/// let conversation = ConversationLoop::new(host, model, Arc::new(profile), Arc::new(DefaultClock));
///
/// let outcome = conversation
///     .run(LoopSeed {
///         user_message: "Hello".to_owned(),
///         ..LoopSeed::default()
///     })
///     .await;
/// assert_eq!(outcome.status, RunStatus::Completed);
/// # }
/// ```
pub struct ConversationLoop<C>
where
    C: Clock + Send + Sync,
{
    host: Arc<ProviderHost>,
    model: Arc<dyn ModelClient>,
    profile: Arc<ConsumerProfile>,
    clock: Arc<C>,
}

enum Transition {
    Continue,
    Stop(RunStatus, Option<LoopError>),
}

impl Transition {
    fn failed(err: impl Into<LoopError>) -> Self {
        Self::Stop(RunStatus::Failed, Some(err.into()))
    }
}

struct RunControl {
    events: Option<mpsc::Sender<LoopEvent>>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RunControl {
    fn interruption(&self) -> Option<RunStatus> {
        let observer_gone = self
            .events
            .as_ref()
            .is_some_and(mpsc::Sender::is_closed);
        if self.cancel.is_cancelled() || observer_gone {
            return Some(RunStatus::Cancelled);
        }
        if self.deadline.is_some_and(|at| Instant::now() >= at) {
            return Some(RunStatus::TimedOut);
        }
        None
    }

    async fn emit(&self, event: LoopEvent) {
        let Some(sender) = &self.events else {
            return;
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {}
            sent = sender.send(event) => {
                if sent.is_err() {
                    self.cancel.cancel();
                }
            }
        }
    }

    async fn bounded<F: Future>(&self, work: F) -> Result<F::Output, RunStatus> {
        let deadline = self.deadline.unwrap_or_else(Instant::now);
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(RunStatus::Cancelled),
            () = tokio::time::sleep_until(deadline), if self.deadline.is_some() => {
                Err(RunStatus::TimedOut)
            }
            output = work => Ok(output),
        }
    }
}

impl<C> ConversationLoop<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a loop bound to a host, a model, and a consumer profile.
    #[must_use]
    pub const fn new(
        host: Arc<ProviderHost>,
        model: Arc<dyn ModelClient>,
        profile: Arc<ConsumerProfile>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            host,
            model,
            profile,
            clock,
        }
    }

    /// Returns the profile the loop runs under.
    #[must_use]
    pub fn profile(&self) -> &ConsumerProfile {
        &self.profile
    }

    /// Runs the conversation to completion.
    ///
    /// Never fails: capability errors become tool results and every other
    /// stop condition is reported through [`LoopOutcome::status`].
    pub async fn run(&self, seed: LoopSeed) -> LoopOutcome {
        let control = RunControl {
            events: None,
            cancel: CancellationToken::new(),
            deadline: self.deadline(),
        };
        self.drive(seed, control).await
    }

    /// Runs the conversation, emitting [`LoopEvent`]s to `events` as they
    /// happen.
    ///
    /// Cancelling `cancel` or dropping the receiving end of `events` stops
    /// the run before its next model call or dispatch, with
    /// [`RunStatus::Cancelled`].
    pub async fn run_streaming(
        &self,
        seed: LoopSeed,
        events: mpsc::Sender<LoopEvent>,
        cancel: &CancellationToken,
    ) -> LoopOutcome {
        let control = RunControl {
            events: Some(events),
            cancel: cancel.child_token(),
            deadline: self.deadline(),
        };
        self.drive(seed, control).await
    }

    fn deadline(&self) -> Option<Instant> {
        self.profile
            .run_timeout()
            .map(|timeout| Instant::now() + timeout)
    }

    async fn drive(&self, seed: LoopSeed, control: RunControl) -> LoopOutcome {
        let run_id = RunId::new();
        let max_iterations = self.profile.max_iterations();
        let mut conversation = self.seed_conversation(seed);
        tracing::info!(
            run_id = %run_id,
            consumer = self.profile.consumer(),
            max_iterations,
            "conversation run started"
        );

        let mut iterations = 0_u32;
        let (status, error) = loop {
            if let Some(status) = control.interruption() {
                break (status, None);
            }
            if iterations >= max_iterations {
                break (RunStatus::Incomplete, None);
            }
            iterations += 1;
            match self.turn(iterations, &mut conversation, &control).await {
                Transition::Continue => {
                    let next = if iterations >= max_iterations {
                        LoopState::Aborted
                    } else {
                        LoopState::Thinking
                    };
                    control
                        .emit(LoopEvent::TurnEnd {
                            turn: iterations,
                            next,
                        })
                        .await;
                }
                Transition::Stop(status, error) => {
                    control
                        .emit(LoopEvent::TurnEnd {
                            turn: iterations,
                            next: status.final_state(),
                        })
                        .await;
                    break (status, error);
                }
            }
        };

        Self::log_finish(run_id, &self.profile, status, iterations, error.as_ref());
        LoopOutcome {
            run_id,
            status,
            iterations,
            conversation,
            error,
        }
    }

    fn seed_conversation(&self, seed: LoopSeed) -> ConversationState {
        let mut conversation = ConversationState::new();
        if !seed.instructions.trim().is_empty() {
            conversation.append(Message::system(seed.instructions, &*self.clock));
        }
        conversation.extend(
            seed.history
                .into_iter()
                .filter(|message| message.role() != Role::System),
        );
        conversation.append(Message::user(seed.user_message, &*self.clock));
        conversation
    }

    async fn turn(
        &self,
        turn: u32,
        conversation: &mut ConversationState,
        control: &RunControl,
    ) -> Transition {
        control.emit(LoopEvent::TurnStart { turn }).await;
        let capabilities = match self.host.list_capabilities(None, &self.profile) {
            Ok(listing) => listing,
            Err(err) => return Transition::failed(err),
        };
        tracing::debug!(
            consumer = self.profile.consumer(),
            turn,
            capabilities = capabilities.len(),
            "calling model"
        );

        let completion = self
            .model
            .complete(conversation.messages(), &capabilities);
        let response = match control.bounded(completion).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Transition::failed(err),
            Err(status) => return Transition::Stop(status, None),
        };

        match response {
            ModelResponse::Answer { text } => {
                self.answer(turn, text, conversation, control).await
            }
            ModelResponse::Calls { text, calls } if calls.is_empty() => {
                self.answer(turn, text.unwrap_or_default(), conversation, control)
                    .await
            }
            ModelResponse::Calls { text, calls } => {
                self.dispatch(turn, text, calls, conversation, control)
                    .await
            }
        }
    }

    async fn answer(
        &self,
        turn: u32,
        text: String,
        conversation: &mut ConversationState,
        control: &RunControl,
    ) -> Transition {
        if !text.is_empty() {
            control
                .emit(LoopEvent::TextDelta {
                    turn,
                    text: text.clone(),
                })
                .await;
        }
        conversation.append(Message::assistant(text, &*self.clock));
        Transition::Stop(RunStatus::Completed, None)
    }

    async fn dispatch(
        &self,
        turn: u32,
        text: Option<String>,
        calls: Vec<RequestedCall>,
        conversation: &mut ConversationState,
        control: &RunControl,
    ) -> Transition {
        let parts: Vec<ToolCallPart> = calls
            .into_iter()
            .enumerate()
            .map(|(index, call)| {
                let call_id = call
                    .call_id
                    .unwrap_or_else(|| format!("call-{turn}-{index}"));
                ToolCallPart::new(call_id, call.kind, call.name, call.arguments)
            })
            .collect();
        let message = match Message::assistant_calls(text.clone(), parts.clone(), &*self.clock) {
            Ok(message) => message,
            Err(err) => return Transition::failed(err),
        };
        conversation.append(message);

        if let Some(delta) = text.filter(|value| !value.is_empty()) {
            control.emit(LoopEvent::TextDelta { turn, text: delta }).await;
        }
        for call in &parts {
            control
                .emit(LoopEvent::ToolCall {
                    turn,
                    call: call.clone(),
                })
                .await;
        }

        if let Some(status) = control.interruption() {
            self.record_results(turn, abandoned(&parts, status), conversation, control)
                .await;
            return Transition::Stop(status, None);
        }
        tracing::debug!(
            consumer = self.profile.consumer(),
            turn,
            calls = parts.len(),
            "dispatching capability calls"
        );
        match control
            .bounded(dispatch_calls(&self.host, &self.profile, &parts))
            .await
        {
            Ok(results) => {
                self.record_results(turn, results, conversation, control)
                    .await;
                Transition::Continue
            }
            Err(status) => {
                self.record_results(turn, abandoned(&parts, status), conversation, control)
                    .await;
                Transition::Stop(status, None)
            }
        }
    }

    async fn record_results(
        &self,
        turn: u32,
        results: Vec<ToolResultPart>,
        conversation: &mut ConversationState,
        control: &RunControl,
    ) {
        for result in results {
            control
                .emit(LoopEvent::ToolResult {
                    turn,
                    result: result.clone(),
                })
                .await;
            conversation.append(Message::tool_result(result, &*self.clock));
        }
    }

    fn log_finish(
        run_id: RunId,
        profile: &ConsumerProfile,
        status: RunStatus,
        iterations: u32,
        error: Option<&LoopError>,
    ) {
        error.map_or_else(
            || {
                tracing::info!(
                    run_id = %run_id,
                    consumer = profile.consumer(),
                    status = %status,
                    iterations,
                    "conversation run finished"
                );
            },
            |err| {
                tracing::warn!(
                    run_id = %run_id,
                    consumer = profile.consumer(),
                    status = %status,
                    iterations,
                    error = %err,
                    "conversation run failed"
                );
            },
        );
    }
}

/// Results closing calls the run stopped waiting for, so every recorded call
/// keeps a matching result.
fn abandoned(calls: &[ToolCallPart], status: RunStatus) -> Vec<ToolResultPart> {
    calls
        .iter()
        .map(|call| {
            ToolResultPart::new(
                call.call_id.clone(),
                CapabilityOutcome::Failure(OutcomeError::new(
                    status.as_str(),
                    format!("run {status} before '{}' returned", call.name),
                )),
            )
        })
        .collect()
}

//! Agent and workflow execution.

use super::{FacadeError, ModelRegistry, RunOutcome, StepFailure};
use crate::config::{AgentConfig, ConfigRepository, render_instructions};
use crate::conversation::domain::{LoopEvent, SessionId, SessionKey};
use crate::conversation::ports::SessionStore;
use crate::conversation::services::{ConversationLoop, LoopOutcome, LoopSeed};
use crate::host::{ProviderHost, ShutdownReport};
use crate::provider::domain::{CapabilityKind, ProviderDescriptor};
use crate::routing::domain::{CapabilityListing, ConsumerProfile};
use futures::future::try_join_all;
use mockable::Clock;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything a run needs once configuration has been resolved.
struct PreparedRun<C>
where
    C: Clock + Send + Sync,
{
    agent: AgentConfig,
    conversation: ConversationLoop<C>,
    seed: LoopSeed,
    session: Option<SessionKey>,
}

/// Entry point for running agents and workflows.
///
/// The facade owns no connections itself: providers are registered with the
/// shared [`ProviderHost`] on first use and stay registered across runs.
///
/// # Examples
///
/// ```
/// use palladio::config::{AgentConfig, RuntimeConfig, StaticConfigRepository};
/// use palladio::conversation::adapters::{InMemorySessionStore, ScriptedModelClient};
/// use palladio::conversation::ports::ModelResponse;
/// use palladio::facade::{ExecutionFacade, ModelRegistry};
/// use palladio::host::ProviderHost;
/// use palladio::provider::adapters::TransportConnector;
/// use mockable::DefaultClock;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = RuntimeConfig {
///     agents: vec![AgentConfig::new("greeter").with_instructions("You are {{ agent }}.")],
///     ..RuntimeConfig::default()
/// };
/// let model = ScriptedModelClient::new().with_response(ModelResponse::answer("Hello there."));
/// let facade = ExecutionFacade::new(
///     Arc::new(ProviderHost::new(Arc::new(TransportConnector::new()))),
///     Arc::new(StaticConfigRepository::new(config).expect("valid configuration")),
///     Arc::new(InMemorySessionStore::new()),
///     ModelRegistry::new(Arc::new(model)),
///     Arc::new(DefaultClock),
/// );
///
/// let outcome = facade.run_agent("greeter", "Hi", None).await.expect("run succeeds");
/// assert_eq!(outcome.final_text(), "Hello there.");
/// # }
/// ```
pub struct ExecutionFacade<R, S, C>
where
    R: ConfigRepository,
    S: SessionStore,
    C: Clock + Send + Sync,
{
    host: Arc<ProviderHost>,
    config: Arc<R>,
    sessions: Arc<S>,
    models: ModelRegistry,
    clock: Arc<C>,
}

impl<R, S, C> ExecutionFacade<R, S, C>
where
    R: ConfigRepository,
    S: SessionStore,
    C: Clock + Send + Sync,
{
    /// Creates a facade over a host, a configuration source, and a session
    /// store.
    #[must_use]
    pub const fn new(
        host: Arc<ProviderHost>,
        config: Arc<R>,
        sessions: Arc<S>,
        models: ModelRegistry,
        clock: Arc<C>,
    ) -> Self {
        Self {
            host,
            config,
            sessions,
            models,
            clock,
        }
    }

    /// Returns the shared provider host.
    #[must_use]
    pub const fn host(&self) -> &Arc<ProviderHost> {
        &self.host
    }

    /// Runs an agent on one user message.
    ///
    /// With a session id and history enabled for the agent, prior history is
    /// loaded first and the updated history is saved afterwards, whatever
    /// the run's status. Without a session id the run is one-shot.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError`] when configuration lookup, provider
    /// registration, template rendering, or session persistence fails. A
    /// run that stops early is not an error; inspect
    /// [`RunOutcome::status`].
    pub async fn run_agent(
        &self,
        agent: &str,
        user_message: &str,
        session_id: Option<&SessionId>,
    ) -> Result<RunOutcome, FacadeError> {
        let prepared = self.prepare(agent, user_message, session_id).await?;
        let outcome = prepared.conversation.run(prepared.seed).await;
        self.finish(&prepared.agent, prepared.session.as_ref(), outcome)
            .await
    }

    /// Runs an agent while emitting [`LoopEvent`]s to `events`.
    ///
    /// Cancelling `cancel` or dropping the receiver stops the run with
    /// [`RunStatus::Cancelled`](crate::conversation::domain::RunStatus::Cancelled);
    /// the history accumulated so far is still saved.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::run_agent`].
    pub async fn stream_agent(
        &self,
        agent: &str,
        user_message: &str,
        session_id: Option<&SessionId>,
        events: mpsc::Sender<LoopEvent>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, FacadeError> {
        let prepared = self.prepare(agent, user_message, session_id).await?;
        let outcome = prepared
            .conversation
            .run_streaming(prepared.seed, events, cancel)
            .await;
        self.finish(&prepared.agent, prepared.session.as_ref(), outcome)
            .await
    }

    /// Runs a workflow's agents in order.
    ///
    /// The first step receives `input`; each later step receives the
    /// previous step's final answer. Steps are one-shot and share no
    /// session history.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::UnknownWorkflow`] for an unknown name,
    /// [`FacadeError::EmptyWorkflow`] for a workflow without steps, or
    /// [`FacadeError::WorkflowStepFailed`] for the first step that errors or
    /// does not complete. Later steps do not run.
    pub async fn run_workflow(
        &self,
        workflow: &str,
        input: &str,
    ) -> Result<RunOutcome, FacadeError> {
        let config = self
            .config
            .find_workflow(workflow)
            .await?
            .ok_or_else(|| FacadeError::UnknownWorkflow(workflow.to_owned()))?;
        tracing::info!(workflow, steps = config.steps.len(), "workflow started");

        let mut message = input.to_owned();
        let mut last = None;
        for (step, agent) in config.steps.iter().enumerate() {
            let failed = |reason| FacadeError::WorkflowStepFailed {
                workflow: workflow.to_owned(),
                step,
                agent: agent.clone(),
                reason,
            };
            let outcome = self
                .run_agent(agent, &message, None)
                .await
                .map_err(|err| failed(StepFailure::Error(Box::new(err))))?;
            if !outcome.status.is_completed() {
                tracing::warn!(
                    workflow,
                    step,
                    agent = %agent,
                    status = %outcome.status,
                    "workflow step failed"
                );
                return Err(failed(StepFailure::Status(Box::new(outcome))));
            }
            message = outcome.final_text();
            last = Some(outcome);
        }

        tracing::info!(workflow, "workflow completed");
        last.ok_or_else(|| FacadeError::EmptyWorkflow(workflow.to_owned()))
    }

    /// Invokes a capability directly under an agent's profile, outside any
    /// conversation.
    ///
    /// Registers the agent's providers first. Authorization failures are
    /// returned as [`FacadeError::Host`] rather than fed to a model.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError`] when the agent cannot be resolved, a provider
    /// cannot be registered, or the invocation fails.
    pub async fn call_capability(
        &self,
        agent: &str,
        kind: CapabilityKind,
        name: &str,
        arguments: Value,
    ) -> Result<Value, FacadeError> {
        let config = self.find_agent(agent).await?;
        let profile = profile_for(&config)?;
        self.register_providers(&config).await?;
        Ok(self.host.invoke(kind, name, arguments, &profile).await?)
    }

    /// Lists the capabilities an agent may use, registering its providers
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError`] when the agent cannot be resolved or a
    /// provider cannot be registered.
    pub async fn list_capabilities(
        &self,
        agent: &str,
        kind: Option<CapabilityKind>,
    ) -> Result<Vec<CapabilityListing>, FacadeError> {
        let config = self.find_agent(agent).await?;
        let profile = profile_for(&config)?;
        self.register_providers(&config).await?;
        Ok(self.host.list_capabilities(kind, &profile)?)
    }

    /// Shuts the shared host down, closing every provider connection.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.host.shutdown().await
    }

    async fn prepare(
        &self,
        agent: &str,
        user_message: &str,
        session_id: Option<&SessionId>,
    ) -> Result<PreparedRun<C>, FacadeError> {
        let config = self.find_agent(agent).await?;
        let profile = profile_for(&config)?;
        let model = self
            .models
            .resolve(config.model.as_deref())
            .ok_or_else(|| FacadeError::UnknownModel {
                agent: config.name.clone(),
                model: config.model.clone().unwrap_or_default(),
            })?;
        self.register_providers(&config).await?;

        let session = session_id
            .filter(|_| config.history_enabled)
            .map(|id| SessionKey::new(config.name.as_str(), id.clone()))
            .transpose()?;
        let history = match &session {
            Some(key) => self.sessions.load(key).await?,
            None => Vec::new(),
        };
        let instructions = render_instructions(&config, session_id, &*self.clock)?;
        tracing::debug!(
            agent = %config.name,
            session = ?session,
            prior_messages = history.len(),
            "agent run prepared"
        );

        Ok(PreparedRun {
            conversation: ConversationLoop::new(
                Arc::clone(&self.host),
                model,
                Arc::new(profile),
                Arc::clone(&self.clock),
            ),
            seed: LoopSeed {
                instructions,
                history,
                user_message: user_message.to_owned(),
            },
            session,
            agent: config,
        })
    }

    async fn finish(
        &self,
        agent: &AgentConfig,
        session: Option<&SessionKey>,
        outcome: LoopOutcome,
    ) -> Result<RunOutcome, FacadeError> {
        if let Some(key) = session {
            self.sessions.save(key, &outcome.history()).await?;
        }
        Ok(RunOutcome::from_loop(&agent.name, outcome))
    }

    async fn find_agent(&self, agent: &str) -> Result<AgentConfig, FacadeError> {
        self.config
            .find_agent(agent)
            .await?
            .ok_or_else(|| FacadeError::UnknownAgent(agent.to_owned()))
    }

    async fn register_providers(&self, agent: &AgentConfig) -> Result<(), FacadeError> {
        let mut descriptors: Vec<ProviderDescriptor> = Vec::with_capacity(agent.providers.len());
        for provider_id in &agent.providers {
            let descriptor = self.config.find_provider(provider_id).await?.ok_or_else(|| {
                FacadeError::UnknownProvider {
                    agent: agent.name.clone(),
                    provider_id: provider_id.clone(),
                }
            })?;
            descriptors.push(descriptor);
        }
        try_join_all(
            descriptors
                .iter()
                .map(|descriptor| self.host.ensure_registered(descriptor)),
        )
        .await?;
        Ok(())
    }
}

fn profile_for(agent: &AgentConfig) -> Result<ConsumerProfile, FacadeError> {
    agent.profile().map_err(|source| FacadeError::InvalidAgent {
        agent: agent.name.clone(),
        source,
    })
}

//! Shared world state for facade BDD scenarios.

use std::sync::Arc;

use eyre::{WrapErr, eyre};
use mockable::DefaultClock;
use palladio::config::{AgentConfig, RuntimeConfig, StaticConfigRepository};
use palladio::conversation::adapters::{InMemorySessionStore, ScriptedModelClient};
use palladio::conversation::domain::{CapabilityOutcome, Message, Role};
use palladio::conversation::ports::ModelResponse;
use palladio::facade::{ExecutionFacade, FacadeError, ModelRegistry, RunOutcome};
use palladio::host::ProviderHost;
use palladio::provider::adapters::{TransportConnector, memory::InMemoryProviderCatalog};
use rstest::fixture;
use serde_json::json;

/// Facade type used by the BDD world.
pub type TestFacade = ExecutionFacade<StaticConfigRepository, InMemorySessionStore, DefaultClock>;

/// Scenario world for facade behaviour tests.
pub struct FacadeWorld {
    pub catalog: InMemoryProviderCatalog,
    pub host: Arc<ProviderHost>,
    pub sessions: Arc<InMemorySessionStore>,
    pub weather_model: ScriptedModelClient,
    pub summarizer_model: ScriptedModelClient,
    pub config: RuntimeConfig,
    pub outcomes: Vec<RunOutcome>,
    pub session_snapshots: Vec<Vec<Message>>,
    pub last_error: Option<FacadeError>,
}

impl FacadeWorld {
    /// Creates a world with no providers, agents, or workflows.
    #[must_use]
    pub fn new() -> Self {
        let catalog = InMemoryProviderCatalog::new();
        let host = Arc::new(ProviderHost::new(Arc::new(
            TransportConnector::new().with_catalog(catalog.clone()),
        )));
        Self {
            catalog,
            host,
            sessions: Arc::new(InMemorySessionStore::new()),
            weather_model: weather_model(),
            summarizer_model: summarizer_model(),
            config: RuntimeConfig::default(),
            outcomes: Vec::new(),
            session_snapshots: Vec::new(),
            last_error: None,
        }
    }

    /// Builds a facade over the world's current configuration.
    ///
    /// The host and session store are shared across facades, so providers
    /// stay registered and history survives between steps.
    pub fn facade(&self) -> Result<TestFacade, eyre::Report> {
        let repository = StaticConfigRepository::new(self.config.clone())
            .wrap_err("scenario configuration should be valid")?;
        let models = ModelRegistry::new(Arc::new(self.weather_model.clone()))
            .with_model("summary", Arc::new(self.summarizer_model.clone()));
        Ok(ExecutionFacade::new(
            Arc::clone(&self.host),
            Arc::new(repository),
            Arc::clone(&self.sessions),
            models,
            Arc::new(DefaultClock),
        ))
    }

    /// Returns the configured agent with the given name.
    pub fn agent_mut(&mut self, name: &str) -> Result<&mut AgentConfig, eyre::Report> {
        self.config
            .agents
            .iter_mut()
            .find(|agent| agent.name == name)
            .ok_or_else(|| eyre!("agent {name} should be configured"))
    }

    /// Returns the most recent run outcome.
    pub fn last_outcome(&self) -> Result<&RunOutcome, eyre::Report> {
        self.outcomes
            .last()
            .ok_or_else(|| eyre!("a run should have completed"))
    }

    /// Counts `lookup` invocations received by the weather provider.
    pub fn lookups(&self) -> Result<usize, eyre::Report> {
        Ok(self
            .catalog
            .invocations("weather")
            .wrap_err("weather provider should be defined")?
            .len())
    }
}

impl Default for FacadeWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> FacadeWorld {
    FacadeWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Calls `lookup` once, then answers from the tool result.
pub fn weather_model() -> ScriptedModelClient {
    ScriptedModelClient::new().with_rule(|messages, _| {
        let answered = messages.last().and_then(Message::tool_result_part);
        Ok(answered.map_or_else(
            || ModelResponse::tool_call("lookup", json!({"city": "Paris"})),
            |result| match &result.outcome {
                CapabilityOutcome::Success(payload) => ModelResponse::answer(format!(
                    "It is {} in Paris.",
                    payload.as_str().unwrap_or("unknown")
                )),
                CapabilityOutcome::Failure(error) => ModelResponse::answer(format!(
                    "I could not check the weather ({}).",
                    error.kind
                )),
            },
        ))
    })
}

/// Requests `lookup` on every turn.
pub fn insistent_model() -> ScriptedModelClient {
    ScriptedModelClient::new()
        .with_rule(|_, _| Ok(ModelResponse::tool_call("lookup", json!({"city": "Paris"}))))
}

fn summarizer_model() -> ScriptedModelClient {
    ScriptedModelClient::new().with_rule(|messages, _| {
        let input = messages
            .iter()
            .rev()
            .find(|message| message.role() == Role::User)
            .map(Message::text)
            .unwrap_or_default();
        Ok(ModelResponse::answer(format!("Summary: {input}")))
    })
}

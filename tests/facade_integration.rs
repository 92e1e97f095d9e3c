//! Integration tests for the execution facade over real adapters.
//!
//! These tests load configuration from a JSON document on disk, keep session
//! history in the file-backed store, and drive runs concurrently against one
//! shared provider host.

#![expect(
    clippy::expect_used,
    reason = "Test code uses expect for assertion clarity"
)]

use camino::Utf8PathBuf;
use futures::future::join_all;
use mockable::DefaultClock;
use palladio::config::{RuntimeConfig, StaticConfigRepository};
use palladio::conversation::adapters::{FileSessionStore, ScriptedModelClient};
use palladio::conversation::domain::{
    CapabilityOutcome, LoopEvent, LoopState, Message, Role, RunStatus, SessionId, SessionKey,
};
use palladio::conversation::ports::{ModelResponse, SessionStore};
use palladio::facade::{ExecutionFacade, ModelRegistry};
use palladio::host::ProviderHost;
use palladio::provider::adapters::{TransportConnector, memory::InMemoryProviderCatalog};
use palladio::provider::domain::{CapabilityDefinition, CapabilityKind};
use rstest::{fixture, rstest};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

type FileFacade = ExecutionFacade<StaticConfigRepository, FileSessionStore, DefaultClock>;

const CONFIG: &str = r#"{
    "providers": [
        {
            "id": "weather",
            "transport": {"kind": "in_process", "config": {"name": "weather"}},
            "connect_timeout_ms": 2000
        }
    ],
    "agents": [
        {
            "name": "WeatherAgent",
            "instructions": "You are {{ agent }}. Session {{ session_id }}.",
            "providers": ["weather"],
            "max_iterations": 4
        }
    ]
}"#;

struct Workspace {
    dir: TempDir,
    catalog: InMemoryProviderCatalog,
    host: Arc<ProviderHost>,
    model: ScriptedModelClient,
}

impl Workspace {
    fn path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join(name)).expect("utf-8 temp path")
    }

    fn facade(&self) -> FileFacade {
        let config =
            RuntimeConfig::from_file(&self.path("palladio.json")).expect("config should load");
        let sessions =
            FileSessionStore::open(&self.path("sessions")).expect("session store should open");
        ExecutionFacade::new(
            Arc::clone(&self.host),
            Arc::new(StaticConfigRepository::new(config).expect("valid configuration")),
            Arc::new(sessions),
            ModelRegistry::new(Arc::new(self.model.clone())),
            Arc::new(DefaultClock),
        )
    }

    fn lookups(&self) -> usize {
        self.catalog
            .invocations("weather")
            .map(|calls| calls.len())
            .expect("inspection should succeed")
    }
}

fn weather_model() -> ScriptedModelClient {
    ScriptedModelClient::new().with_rule(|messages, _| {
        let answered = messages.last().and_then(Message::tool_result_part);
        Ok(answered.map_or_else(
            || ModelResponse::tool_call("lookup", json!({"city": "Paris"})),
            |result| match &result.outcome {
                CapabilityOutcome::Success(payload) => ModelResponse::answer(format!(
                    "It is {} in Paris.",
                    payload.as_str().unwrap_or("unknown")
                )),
                CapabilityOutcome::Failure(error) => {
                    ModelResponse::answer(format!("No forecast ({}).", error.kind))
                }
            },
        ))
    })
}

#[fixture]
fn workspace() -> Workspace {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("palladio.json"), CONFIG).expect("config should be written");

    let catalog = InMemoryProviderCatalog::new();
    let lookup = CapabilityDefinition::tool("lookup", "Current weather", json!({"type": "object"}))
        .expect("valid definition");
    catalog
        .define("weather", vec![lookup])
        .expect("define should succeed");
    catalog
        .on_invoke("weather", CapabilityKind::Tool, "lookup", |_| {
            Ok(json!("Sunny, 20C"))
        })
        .expect("script should succeed");
    let host = Arc::new(ProviderHost::new(Arc::new(
        TransportConnector::new().with_catalog(catalog.clone()),
    )));
    Workspace {
        dir,
        catalog,
        host,
        model: weather_model(),
    }
}

fn session(value: &str) -> SessionId {
    SessionId::new(value).expect("valid session id")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn file_backed_history_survives_a_new_facade(workspace: Workspace) {
    let id = session("morning");
    let first = workspace
        .facade()
        .run_agent("WeatherAgent", "Weather in Paris?", Some(&id))
        .await
        .expect("first run should succeed");

    let second = workspace
        .facade()
        .run_agent("WeatherAgent", "Still sunny?", Some(&id))
        .await
        .expect("second run should succeed");

    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(second.status, RunStatus::Completed);
    let system = second.messages.first().expect("system message");
    assert_eq!(system.text(), "You are WeatherAgent. Session morning.");
    let prior: Vec<&Message> = first.messages.iter().skip(1).collect();
    let resumed: Vec<&Message> = second.messages.iter().skip(1).take(prior.len()).collect();
    assert_eq!(resumed, prior);

    let stored = FileSessionStore::open(&workspace.path("sessions"))
        .expect("session store should reopen")
        .load(&SessionKey::new("WeatherAgent", id).expect("valid key"))
        .await
        .expect("history should load");
    assert_eq!(stored.len(), 8);
    assert!(stored.iter().all(|message| message.role() != Role::System));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_runs_share_one_connection(workspace: Workspace) {
    workspace
        .catalog
        .set_connect_delay("weather", Duration::from_millis(50))
        .expect("script should succeed");
    let facade = workspace.facade();

    let outcomes = join_all(
        (0..12).map(|_| facade.run_agent("WeatherAgent", "Weather in Paris?", None)),
    )
    .await;

    for outcome in outcomes {
        let completed = outcome.expect("run should succeed");
        assert_eq!(completed.final_text(), "It is Sunny, 20C in Paris.");
    }
    assert_eq!(workspace.catalog.connect_attempts("weather"), Ok(1));
    assert_eq!(workspace.lookups(), 12);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn streamed_run_reports_each_transition(workspace: Workspace) {
    let facade = workspace.facade();
    let (sender, mut receiver) = mpsc::channel(64);

    let outcome = facade
        .stream_agent(
            "WeatherAgent",
            "Weather in Paris?",
            None,
            sender,
            &CancellationToken::new(),
        )
        .await
        .expect("run should succeed");

    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    assert_eq!(outcome.status, RunStatus::Completed);
    let names: Vec<&str> = events.iter().map(LoopEvent::name).collect();
    assert_eq!(
        names,
        [
            "turn-start",
            "tool-call",
            "tool-result",
            "turn-end",
            "turn-start",
            "text-delta",
            "turn-end",
        ]
    );
    assert!(matches!(
        events.last(),
        Some(LoopEvent::TurnEnd {
            turn: 2,
            next: LoopState::Done
        })
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_stream_still_saves_the_user_message(workspace: Workspace) {
    let facade = workspace.facade();
    let (sender, _receiver) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let id = session("evening");

    let outcome = facade
        .stream_agent("WeatherAgent", "Weather in Paris?", Some(&id), sender, &cancel)
        .await
        .expect("run should succeed");

    assert_eq!(outcome.status, RunStatus::Cancelled);
    assert_eq!(workspace.model.request_count(), 0);
    let stored = FileSessionStore::open(&workspace.path("sessions"))
        .expect("session store should reopen")
        .load(&SessionKey::new("WeatherAgent", id).expect("valid key"))
        .await
        .expect("history should load");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored.first().map(Message::text).as_deref(), Some("Weather in Paris?"));
}

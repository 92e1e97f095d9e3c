//! Behaviour tests for running agents and workflows through the facade.

mod facade_steps;

use facade_steps::world::{FacadeWorld, world};
use rstest_bdd_macros::scenario;

#[scenario(
    path = "tests/features/agent_runs.feature",
    name = "Weather question answered with one lookup"
)]
#[tokio::test(flavor = "multi_thread")]
async fn weather_question(world: FacadeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/agent_runs.feature",
    name = "Excluded lookup degrades gracefully"
)]
#[tokio::test(flavor = "multi_thread")]
async fn excluded_lookup(world: FacadeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/agent_runs.feature",
    name = "Runaway model stops at the iteration cap"
)]
#[tokio::test(flavor = "multi_thread")]
async fn iteration_cap(world: FacadeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/agent_runs.feature",
    name = "Session history grows append-only"
)]
#[tokio::test(flavor = "multi_thread")]
async fn append_only_history(world: FacadeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/agent_runs.feature",
    name = "Unknown agents are rejected"
)]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_agent(world: FacadeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/workflows.feature",
    name = "Each step receives the previous answer"
)]
#[tokio::test(flavor = "multi_thread")]
async fn workflow_piping(world: FacadeWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/workflows.feature",
    name = "A failing step stops the workflow"
)]
#[tokio::test(flavor = "multi_thread")]
async fn workflow_failure(world: FacadeWorld) {
    let _ = world;
}

//! Then steps for facade BDD scenarios.

use super::world::{FacadeWorld, run_async};
use eyre::{WrapErr, eyre};
use palladio::conversation::domain::{Message, RunStatus, SessionId, SessionKey};
use palladio::conversation::ports::SessionStore;
use palladio::facade::FacadeError;
use rstest_bdd_macros::then;

fn stored_session(
    world: &FacadeWorld,
    agent: String,
    session: String,
) -> Result<Vec<Message>, eyre::Report> {
    let session_id = SessionId::new(session).wrap_err("valid session id expected")?;
    let key = SessionKey::new(agent, session_id).wrap_err("valid session key expected")?;
    run_async(world.sessions.load(&key)).wrap_err("session should load")
}

#[then("the run completes")]
fn run_completes(world: &FacadeWorld) -> Result<(), eyre::Report> {
    let outcome = world.last_outcome()?;
    if outcome.status != RunStatus::Completed {
        return Err(eyre!("expected a completed run, got {}", outcome.status));
    }
    Ok(())
}

#[then(r#"the final answer mentions "{text}""#)]
fn final_answer_mentions(world: &FacadeWorld, text: String) -> Result<(), eyre::Report> {
    let answer = world.last_outcome()?.final_text();
    if !answer.contains(&text) {
        return Err(eyre!("expected '{answer}' to mention '{text}'"));
    }
    Ok(())
}

#[then("the lookup was invoked {count:usize} times")]
fn lookup_count(world: &FacadeWorld, count: usize) -> Result<(), eyre::Report> {
    let observed = world.lookups()?;
    if observed != count {
        return Err(eyre!("expected {count} lookups, observed {observed}"));
    }
    Ok(())
}

#[then(r#"the model saw a "{kind}" tool result"#)]
fn model_saw_error(world: &FacadeWorld, kind: String) -> Result<(), eyre::Report> {
    let saw = world
        .last_outcome()?
        .messages
        .iter()
        .filter_map(Message::tool_result_part)
        .filter_map(|result| result.outcome.error())
        .any(|error| error.kind == kind);
    if !saw {
        return Err(eyre!("expected a tool result with error kind {kind}"));
    }
    Ok(())
}

#[then("the run is incomplete after {calls:u32} model calls")]
fn run_incomplete(world: &FacadeWorld, calls: u32) -> Result<(), eyre::Report> {
    let outcome = world.last_outcome()?;
    if outcome.status != RunStatus::Incomplete {
        return Err(eyre!("expected an incomplete run, got {}", outcome.status));
    }
    if outcome.iterations != calls {
        return Err(eyre!(
            "expected {calls} model calls, observed {}",
            outcome.iterations
        ));
    }
    if outcome.final_message.is_some() {
        return Err(eyre!("an incomplete run must not have a final answer"));
    }
    Ok(())
}

#[then(r#"session "{session}" of agent "{agent}" holds {count:usize} messages"#)]
fn session_holds(
    world: &FacadeWorld,
    session: String,
    agent: String,
    count: usize,
) -> Result<(), eyre::Report> {
    let stored = stored_session(world, agent, session)?;
    if stored.len() != count {
        return Err(eyre!("expected {count} stored messages, found {}", stored.len()));
    }
    Ok(())
}

#[then(r#"session "{session}" of agent "{agent}" begins with the first run's history"#)]
fn session_prefix(
    world: &FacadeWorld,
    session: String,
    agent: String,
) -> Result<(), eyre::Report> {
    let first = world
        .session_snapshots
        .first()
        .ok_or_else(|| eyre!("a session run should have been recorded"))?;
    let stored = stored_session(world, agent, session)?;
    if stored.get(..first.len()) != Some(first.as_slice()) {
        return Err(eyre!("stored history does not begin with the first run"));
    }
    Ok(())
}

#[then("the run is rejected because the agent is unknown")]
fn unknown_agent(world: &FacadeWorld) -> Result<(), eyre::Report> {
    match &world.last_error {
        Some(FacadeError::UnknownAgent(_)) => Ok(()),
        other => Err(eyre!("expected an unknown agent error, got {other:?}")),
    }
}

#[then(r#"the workflow answer is "{text}""#)]
fn workflow_answer(world: &FacadeWorld, text: String) -> Result<(), eyre::Report> {
    let answer = world.last_outcome()?.final_text();
    if answer != text {
        return Err(eyre!("expected '{text}', got '{answer}'"));
    }
    Ok(())
}

#[then(r#"the workflow failed at step {step:usize} running agent "{agent}""#)]
fn workflow_failed_at(
    world: &FacadeWorld,
    step: usize,
    agent: String,
) -> Result<(), eyre::Report> {
    match &world.last_error {
        Some(FacadeError::WorkflowStepFailed {
            step: failed_step,
            agent: failed_agent,
            ..
        }) if *failed_step == step && *failed_agent == agent => Ok(()),
        other => Err(eyre!("expected a failure at step {step} ({agent}), got {other:?}")),
    }
}

#[then("the summarizer was called {count:usize} times")]
fn summarizer_calls(world: &FacadeWorld, count: usize) -> Result<(), eyre::Report> {
    let observed = world.summarizer_model.request_count();
    if observed != count {
        return Err(eyre!("expected {count} summarizer calls, observed {observed}"));
    }
    Ok(())
}

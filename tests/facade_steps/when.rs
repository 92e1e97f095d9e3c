//! When steps for facade BDD scenarios.

use super::world::{FacadeWorld, run_async};
use eyre::WrapErr;
use palladio::conversation::domain::{SessionId, SessionKey};
use palladio::conversation::ports::SessionStore;
use rstest_bdd_macros::when;

#[when(r#"agent "{agent}" is asked "{message}""#)]
fn ask(world: &mut FacadeWorld, agent: String, message: String) -> Result<(), eyre::Report> {
    let facade = world.facade()?;
    match run_async(facade.run_agent(&agent, &message, None)) {
        Ok(outcome) => world.outcomes.push(outcome),
        Err(err) => world.last_error = Some(err),
    }
    Ok(())
}

#[when(r#"in session "{session}" agent "{agent}" is asked "{message}""#)]
fn ask_in_session(
    world: &mut FacadeWorld,
    session: String,
    agent: String,
    message: String,
) -> Result<(), eyre::Report> {
    let facade = world.facade()?;
    let session_id = SessionId::new(session).wrap_err("valid session id expected")?;
    let outcome = run_async(facade.run_agent(&agent, &message, Some(&session_id)))
        .wrap_err("session run should succeed")?;
    let key = SessionKey::new(agent, session_id).wrap_err("valid session key expected")?;
    let stored = run_async(world.sessions.load(&key)).wrap_err("session should load")?;
    world.outcomes.push(outcome);
    world.session_snapshots.push(stored);
    Ok(())
}

#[when(r#"workflow "{workflow}" runs with "{input}""#)]
fn run_workflow(
    world: &mut FacadeWorld,
    workflow: String,
    input: String,
) -> Result<(), eyre::Report> {
    let facade = world.facade()?;
    match run_async(facade.run_workflow(&workflow, &input)) {
        Ok(outcome) => world.outcomes.push(outcome),
        Err(err) => world.last_error = Some(err),
    }
    Ok(())
}

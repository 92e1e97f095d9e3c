//! Rendering of agent instruction templates.

use super::{AgentConfig, InstructionTemplateError};
use crate::conversation::domain::SessionId;
use minijinja::Environment;
use mockable::Clock;
use serde_json::{Map, Value};

/// Checks that an agent's instruction template compiles.
///
/// # Errors
///
/// Returns [`InstructionTemplateError`] with the template engine's message
/// when the template has a syntax error.
pub fn validate_instructions(agent: &AgentConfig) -> Result<(), InstructionTemplateError> {
    let mut environment = Environment::new();
    environment
        .add_template("instructions", &agent.instructions)
        .map_err(|error| template_error(agent, &error))
}

/// Renders an agent's instructions for one run.
///
/// The template sees `agent` (the agent name), `providers` (allowed provider
/// ids), `session_id` (absent for one-shot runs), and `date` (today in UTC as
/// `YYYY-MM-DD`, taken from `clock`).
///
/// # Errors
///
/// Returns [`InstructionTemplateError`] when the template fails to compile
/// or render.
///
/// # Examples
///
/// ```
/// use palladio::config::{AgentConfig, render_instructions};
/// use mockable::DefaultClock;
///
/// let agent = AgentConfig::new("forecaster").with_instructions("You are {{ agent }}.");
/// let rendered = render_instructions(&agent, None, &DefaultClock).expect("renders");
/// assert_eq!(rendered, "You are forecaster.");
/// ```
pub fn render_instructions(
    agent: &AgentConfig,
    session_id: Option<&SessionId>,
    clock: &impl Clock,
) -> Result<String, InstructionTemplateError> {
    let environment = Environment::new();
    let context = build_context(agent, session_id, clock);
    environment
        .render_str(&agent.instructions, context)
        .map_err(|error| template_error(agent, &error))
}

fn build_context(
    agent: &AgentConfig,
    session_id: Option<&SessionId>,
    clock: &impl Clock,
) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert("agent".to_owned(), Value::String(agent.name.clone()));
    context.insert(
        "providers".to_owned(),
        Value::Array(
            agent
                .providers
                .iter()
                .map(|id| Value::String(id.to_string()))
                .collect(),
        ),
    );
    if let Some(session) = session_id {
        context.insert("session_id".to_owned(), Value::String(session.to_string()));
    }
    context.insert(
        "date".to_owned(),
        Value::String(clock.utc().format("%Y-%m-%d").to_string()),
    );
    context
}

fn template_error(agent: &AgentConfig, error: &minijinja::Error) -> InstructionTemplateError {
    InstructionTemplateError {
        agent: agent.name.clone(),
        reason: error.to_string(),
    }
}

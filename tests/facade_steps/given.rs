//! Given steps for facade BDD scenarios.

use super::world::{FacadeWorld, insistent_model};
use eyre::WrapErr;
use palladio::config::{AgentConfig, WorkflowConfig};
use palladio::conversation::ports::ModelError;
use palladio::provider::domain::{
    CapabilityDefinition, CapabilityKind, ProviderDescriptor, ProviderId, ProviderTransport,
};
use rstest_bdd_macros::given;
use serde_json::{Value, json};

#[given(r#"a weather provider whose lookup returns "{payload}""#)]
fn weather_provider(world: &mut FacadeWorld, payload: String) -> Result<(), eyre::Report> {
    let lookup = CapabilityDefinition::tool(
        "lookup",
        "Current weather for a city",
        json!({"type": "object", "properties": {"city": {"type": "string"}}}),
    )
    .wrap_err("lookup definition should be valid")?;
    world
        .catalog
        .define("weather", vec![lookup])
        .wrap_err("weather provider should be defined")?;
    world
        .catalog
        .on_invoke("weather", CapabilityKind::Tool, "lookup", move |_| {
            Ok(Value::String(payload.clone()))
        })
        .wrap_err("lookup handler should be installed")?;

    let descriptor = ProviderDescriptor::new(
        ProviderId::new("weather").wrap_err("valid provider id expected")?,
        ProviderTransport::in_process("weather").wrap_err("valid transport expected")?,
    );
    world.config.providers.push(descriptor);
    Ok(())
}

#[given(r#"an agent "{name}" allowed to use the weather provider"#)]
fn weather_agent(world: &mut FacadeWorld, name: String) -> Result<(), eyre::Report> {
    let weather = ProviderId::new("weather").wrap_err("valid provider id expected")?;
    world.config.agents.push(
        AgentConfig::new(name)
            .with_instructions("You are {{ agent }}. Answer weather questions.")
            .with_providers([weather]),
    );
    Ok(())
}

#[given(r#"an agent "{name}" that summarizes its input"#)]
fn summarizer_agent(world: &mut FacadeWorld, name: String) {
    world.config.agents.push(
        AgentConfig::new(name)
            .with_instructions("Summarize what you are given.")
            .with_model("summary"),
    );
}

#[given(r#"agent "{name}" excludes the capability "{capability}""#)]
fn agent_excludes(
    world: &mut FacadeWorld,
    name: String,
    capability: String,
) -> Result<(), eyre::Report> {
    world.agent_mut(&name)?.exclude.insert(capability);
    Ok(())
}

#[given(r#"agent "{name}" may think for at most {limit:u32} iterations"#)]
fn agent_iteration_cap(
    world: &mut FacadeWorld,
    name: String,
    limit: u32,
) -> Result<(), eyre::Report> {
    world.agent_mut(&name)?.max_iterations = limit;
    Ok(())
}

#[given("a model that always requests the lookup")]
fn insistent(world: &mut FacadeWorld) {
    world.weather_model = insistent_model();
}

#[given("the weather model fails on its next call")]
fn weather_model_fails(world: &mut FacadeWorld) {
    world
        .weather_model
        .enqueue(Err(ModelError::Rejected("quota exceeded".to_owned())));
}

#[given(r#"a workflow "{name}" running "{steps}""#)]
fn workflow(world: &mut FacadeWorld, name: String, steps: String) {
    let agents: Vec<String> = steps.split(',').map(|step| step.trim().to_owned()).collect();
    world.config.workflows.push(WorkflowConfig::new(name, agents));
}

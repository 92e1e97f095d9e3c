//! Concurrent capability dispatch for one turn.

use crate::conversation::domain::{CapabilityOutcome, OutcomeError, ToolCallPart, ToolResultPart};
use crate::host::{HostError, ProviderHost};
use crate::routing::domain::ConsumerProfile;
use futures::future::join_all;
use std::sync::Arc;

/// Invokes every call concurrently and returns one result per call in the
/// order the calls were requested.
///
/// Each invocation runs as its own task. Dropping the returned future
/// detaches the tasks rather than aborting them, so in-flight provider calls
/// finish or time out on their own.
pub(super) async fn dispatch_calls(
    host: &Arc<ProviderHost>,
    profile: &Arc<ConsumerProfile>,
    calls: &[ToolCallPart],
) -> Vec<ToolResultPart> {
    let handles: Vec<_> = calls
        .iter()
        .map(|call| {
            let task_host = Arc::clone(host);
            let task_profile = Arc::clone(profile);
            let task_call = call.clone();
            tokio::spawn(async move { invoke_one(&task_host, &task_profile, &task_call).await })
        })
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .zip(calls)
        .map(|(joined, call)| {
            let outcome = joined.unwrap_or_else(|err| {
                CapabilityOutcome::Failure(OutcomeError::new(
                    "internal",
                    format!("invocation task failed: {err}"),
                ))
            });
            ToolResultPart::new(call.call_id.clone(), outcome)
        })
        .collect()
}

async fn invoke_one(
    host: &ProviderHost,
    profile: &ConsumerProfile,
    call: &ToolCallPart,
) -> CapabilityOutcome {
    host.invoke(call.kind, &call.name, call.arguments.clone(), profile)
        .await
        .map_or_else(
            |err| {
                log_failure(profile, call, &err);
                CapabilityOutcome::Failure(OutcomeError::new(err.kind(), err.to_string()))
            },
            CapabilityOutcome::Success,
        )
}

fn log_failure(profile: &ConsumerProfile, call: &ToolCallPart, err: &HostError) {
    if matches!(err, HostError::Auth(_)) {
        tracing::info!(
            consumer = profile.consumer(),
            capability = %call.name,
            call_id = %call.call_id,
            error = %err,
            "capability call denied"
        );
    } else {
        tracing::warn!(
            consumer = profile.consumer(),
            capability = %call.name,
            call_id = %call.call_id,
            error_kind = err.kind(),
            error = %err,
            "capability call failed"
        );
    }
}

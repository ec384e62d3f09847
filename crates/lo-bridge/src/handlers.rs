//! Per-command execution.
//!
//! Fast commands resolve inside the request cycle and return a
//! [`CommandOutput`]; long-running commands run in a spawned task that
//! records trace steps, sends the follow-up message, and routes terminal
//! failures through the alert manager.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use lo_core::redact::redact_value;
use lo_core::types::{CommandInvocation, RunConclusion, Severity};
use lo_harness::trace_store::{StepStatus, TraceStatus};
use lo_workflows::dispatch::PollOutcome;
use lo_workflows::types::ApiRun;

use crate::commands::{
    resolve_workflow, DEPLOY_CLIENT_WORKFLOW, DIAGNOSTICS_WORKFLOW, TRACKED_WORKFLOWS,
    VERIFY_WORKFLOW,
};
use crate::error::HandlerError;
use crate::protocol::CommandOutput;
use crate::state::AppState;

/// Backoff bounds for conclusion polling.
const POLL_BASE_BACKOFF: Duration = Duration::from_secs(5);
const POLL_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// List attempts when correlating a dispatched run.
const MAX_LOOKBACK: u32 = 5;

/// Fingerprint of a stored trace, for user-facing correlation.
pub fn trace_fingerprint(state: &AppState, trace_id: &str) -> String {
    state
        .traces
        .get_trace(trace_id)
        .map(|t| t.fingerprint())
        .unwrap_or_else(|| "unknown".to_string())
}

// ---------------------------------------------------------------------------
// Fast commands
// ---------------------------------------------------------------------------

pub async fn execute_fast(
    state: &AppState,
    invocation: &CommandInvocation,
    trace_id: &str,
) -> Result<CommandOutput, HandlerError> {
    match invocation.command_name.as_str() {
        "verify-latest" => verify_latest(state, trace_id).await,
        "verify-run" => verify_run(state, invocation, trace_id).await,
        "status" => status(state, invocation, trace_id).await,
        "deploy-client" => deploy_client_fast(state, invocation, trace_id).await,
        "set-frontend" => set_variable(state, invocation, trace_id, "FRONTEND_BASE_URL").await,
        "set-api-base" => set_variable(state, invocation, trace_id, "CLIENT_API_BASE_URL").await,
        "agents" => Ok(CommandOutput::ok(state.agents.render())),
        "status-digest" => status_digest(state, invocation, trace_id).await,
        "debug-last" => debug_last(state, invocation, trace_id),
        other => Err(HandlerError::Validation(format!("unknown command `{other}`"))),
    }
}

async fn verify_latest(state: &AppState, trace_id: &str) -> Result<CommandOutput, HandlerError> {
    let started = Instant::now();
    let runs = state.workflow_api.list_runs(VERIFY_WORKFLOW, 1).await;
    record(state, trace_id, "list-runs", &runs, started, json!({"workflow": VERIFY_WORKFLOW}));
    let runs = runs?;

    Ok(match runs.first() {
        Some(run) => CommandOutput::ok(summarize_run(run)),
        None => CommandOutput::ok("no verification runs found yet"),
    })
}

async fn verify_run(
    state: &AppState,
    invocation: &CommandInvocation,
    trace_id: &str,
) -> Result<CommandOutput, HandlerError> {
    let run_id = invocation
        .arg_u64("run_id")
        .or_else(|| invocation.arg_str("run_id").and_then(|s| s.parse().ok()))
        .ok_or_else(|| HandlerError::Validation("`run_id` is required".to_string()))?;

    let started = Instant::now();
    let run = state.workflow_api.get_run(run_id).await;
    record(state, trace_id, "get-run", &run, started, json!({"run_id": run_id}));

    Ok(CommandOutput::ok(summarize_run(&run?)))
}

async fn status(
    state: &AppState,
    invocation: &CommandInvocation,
    trace_id: &str,
) -> Result<CommandOutput, HandlerError> {
    let workflow = match invocation.arg_str("workflow") {
        Some(short) => resolve_workflow(short).ok_or_else(|| {
            HandlerError::Validation(format!(
                "unknown workflow `{short}` – tracked workflows: verify, deploy-client, diagnostics"
            ))
        })?,
        None => VERIFY_WORKFLOW,
    };

    let started = Instant::now();
    let runs = state.workflow_api.list_runs(workflow, 5).await;
    record(state, trace_id, "list-runs", &runs, started, json!({"workflow": workflow}));
    let runs = runs?;

    if runs.is_empty() {
        return Ok(CommandOutput::ok(format!("no recent runs of `{workflow}`")));
    }
    let lines: Vec<String> = runs.iter().map(summarize_run).collect();
    Ok(CommandOutput::ok(format!("recent `{workflow}` runs:\n{}", lines.join("\n"))))
}

async fn deploy_client_fast(
    state: &AppState,
    invocation: &CommandInvocation,
    trace_id: &str,
) -> Result<CommandOutput, HandlerError> {
    let mut inputs = Map::new();
    if let Some(api_base) = invocation.arg_str("api_base") {
        if let Some(unhealthy) = health_gate(state, trace_id, api_base).await? {
            return Ok(unhealthy);
        }
        inputs.insert("api_base".to_string(), Value::String(api_base.to_string()));
    }

    let started = Instant::now();
    let result = state
        .dispatcher
        .trigger(DEPLOY_CLIENT_WORKFLOW, inputs, &invocation.requester_id)
        .await;
    record(state, trace_id, "trigger", &result, started, json!({"workflow": DEPLOY_CLIENT_WORKFLOW}));
    let correlation_id = result?;

    Ok(CommandOutput::ok(format!(
        "🚀 client deploy started — correlation id `{correlation_id}`; follow it with `/status deploy-client`"
    )))
}

async fn set_variable(
    state: &AppState,
    invocation: &CommandInvocation,
    trace_id: &str,
    variable: &str,
) -> Result<CommandOutput, HandlerError> {
    if !state.config.allow_secret_writes {
        return Err(HandlerError::Disabled("secret writes"));
    }
    let url = invocation
        .arg_str("url")
        .ok_or_else(|| HandlerError::Validation("`url` is required".to_string()))?;
    state.guard.validate(url)?;

    let started = Instant::now();
    let result = state.workflow_api.set_repo_variable(variable, url).await;
    record(state, trace_id, "set-variable", &result, started, json!({"variable": variable}));
    result?;

    info!(variable, requester = %invocation.requester_id, "configuration variable updated");
    Ok(CommandOutput::ok(format!("✅ `{variable}` updated to {url}")))
}

async fn status_digest(
    state: &AppState,
    invocation: &CommandInvocation,
    trace_id: &str,
) -> Result<CommandOutput, HandlerError> {
    let period = invocation.arg_str("period").unwrap_or("daily");
    let (days, label) = match period {
        "daily" => (1, "last 24 hours"),
        "weekly" => (7, "last 7 days"),
        other => {
            return Err(HandlerError::Validation(format!(
                "`period` must be `daily` or `weekly`, got `{other}`"
            )))
        }
    };
    let cutoff = Utc::now() - chrono::Duration::days(days);

    let started = Instant::now();
    let mut lines = Vec::new();
    let mut total = 0usize;
    for (short, workflow) in TRACKED_WORKFLOWS {
        let runs = match state.workflow_api.list_runs(workflow, 50).await {
            Ok(runs) => runs,
            Err(err) => {
                record(state, trace_id, "aggregate", &Err::<(), _>(&err), started, json!({"workflow": workflow}));
                return Err(err.into());
            }
        };
        let recent: Vec<&ApiRun> = runs.iter().filter(|r| r.created_at >= cutoff).collect();
        if recent.is_empty() {
            continue;
        }
        total += recent.len();
        let succeeded = recent
            .iter()
            .filter(|r| r.run_conclusion() == Some(RunConclusion::Success))
            .count();
        let failed = recent
            .iter()
            .filter(|r| matches!(r.run_conclusion(), Some(c) if c != RunConclusion::Success))
            .count();
        let pending = recent.len() - succeeded - failed;
        let mut line = format!("• `{short}`: {} runs — {succeeded} ✅ {failed} ❌", recent.len());
        if pending > 0 {
            line.push_str(&format!(" {pending} ⏳"));
        }
        lines.push(line);
    }
    record(
        state,
        trace_id,
        "aggregate",
        &Ok::<(), HandlerError>(()),
        started,
        json!({"period": period, "total_runs": total}),
    );

    if lines.is_empty() {
        return Ok(CommandOutput::ok(format!("📊 no workflow runs in the {label}")));
    }
    Ok(CommandOutput::ok(format!(
        "📊 workflow digest ({label}):\n{}",
        lines.join("\n")
    )))
}

fn debug_last(
    state: &AppState,
    invocation: &CommandInvocation,
    trace_id: &str,
) -> Result<CommandOutput, HandlerError> {
    if !state.config.enable_debug_cmd {
        return Err(HandlerError::Disabled("debug-last"));
    }
    let Some(trace) = state
        .traces
        .get_previous_trace(&invocation.requester_id, trace_id)
    else {
        return Ok(CommandOutput::ephemeral("no trace recorded for you yet"));
    };

    let value = serde_json::to_value(&trace).unwrap_or(Value::Null);
    let rendered = serde_json::to_string_pretty(&redact_value(&value)).unwrap_or_default();
    Ok(CommandOutput::ephemeral(format!(
        "your last trace (`{}`):\n```json\n{rendered}\n```",
        trace.fingerprint()
    )))
}

// ---------------------------------------------------------------------------
// Long-running commands
// ---------------------------------------------------------------------------

/// Background half of the deferred-response protocol: trigger → locate →
/// poll, one trace step per phase, follow-up message at the end, alerts on
/// failure and timeout. Never returns an error; every outcome is reported
/// through the chat channel and the trace.
pub async fn execute_long_running(
    state: &Arc<AppState>,
    invocation: &CommandInvocation,
    trace_id: &str,
) {
    let (workflow, label) = match invocation.command_name.as_str() {
        "diagnose" => (DIAGNOSTICS_WORKFLOW, "diagnostics"),
        "deploy-client" => (DEPLOY_CLIENT_WORKFLOW, "client deploy"),
        other => {
            warn!(command = other, "no long-running pipeline for command");
            state.traces.finish_trace(trace_id, TraceStatus::Failed);
            return;
        }
    };

    let mut inputs = Map::new();
    if invocation.command_name == "deploy-client" {
        if let Some(api_base) = invocation.arg_str("api_base") {
            let started = Instant::now();
            match state.health.check(api_base).await {
                Ok(report) if report.healthy => {
                    let detail = serde_json::to_value(&report).unwrap_or(Value::Null);
                    record(state, trace_id, "health-check", &Ok::<(), HandlerError>(()), started, detail);
                    inputs.insert("api_base".to_string(), Value::String(api_base.to_string()));
                }
                Ok(report) => {
                    let detail = serde_json::to_value(&report).unwrap_or(Value::Null);
                    record(state, trace_id, "health-check", &Err::<(), _>(&report.status), started, detail);
                    state.traces.finish_trace(trace_id, TraceStatus::Failed);
                    send_followup(
                        state,
                        invocation,
                        &format!(
                            "⚠️ health check of {api_base} answered {}; deploy not started",
                            report.status
                        ),
                    )
                    .await;
                    return;
                }
                Err(err) => {
                    record(state, trace_id, "health-check", &Err::<(), _>(&err), started, json!({"api_base": api_base}));
                    state.traces.finish_trace(trace_id, TraceStatus::Failed);
                    let err = HandlerError::from(err);
                    send_followup(state, invocation, &with_fingerprint(state, trace_id, &err.user_message())).await;
                    return;
                }
            }
        }
    }

    // trigger
    let started = Instant::now();
    let triggered = state
        .dispatcher
        .trigger(workflow, inputs, &invocation.requester_id)
        .await;
    record(state, trace_id, "trigger", &triggered, started, json!({"workflow": workflow}));
    let correlation_id = match triggered {
        Ok(correlation_id) => correlation_id,
        Err(err) => {
            state.traces.finish_trace(trace_id, TraceStatus::Failed);
            let user = HandlerError::from(err).user_message();
            send_followup(state, invocation, &with_fingerprint(state, trace_id, &user)).await;
            state
                .alerts
                .maybe_emit(
                    Severity::Critical,
                    &invocation.command_name,
                    &format!("failed to trigger `{workflow}`"),
                    trace_id,
                    None,
                )
                .await;
            return;
        }
    };

    // locate
    let started = Instant::now();
    let located = state
        .dispatcher
        .find_run_by_correlation(workflow, &correlation_id, MAX_LOOKBACK)
        .await;
    let run = match located {
        Ok(Some(run)) => {
            record(
                state,
                trace_id,
                "locate",
                &Ok::<(), HandlerError>(()),
                started,
                json!({"run_id": run.id, "html_url": run.html_url}),
            );
            run
        }
        Ok(None) => {
            record(state, trace_id, "locate", &Err::<(), _>(&"not found"), started, json!({"correlation_id": correlation_id}));
            state.traces.finish_trace(trace_id, TraceStatus::Failed);
            send_followup(
                state,
                invocation,
                &format!(
                    "⚠️ {label} was triggered (correlation id `{correlation_id}`) but the run could not be located; check the Actions tab manually"
                ),
            )
            .await;
            state
                .alerts
                .maybe_emit(
                    Severity::Warning,
                    &invocation.command_name,
                    &format!("run of `{workflow}` not found by correlation"),
                    trace_id,
                    None,
                )
                .await;
            return;
        }
        Err(err) => {
            record(state, trace_id, "locate", &Err::<(), _>(&err), started, json!({"correlation_id": correlation_id}));
            state.traces.finish_trace(trace_id, TraceStatus::Failed);
            let user = HandlerError::from(err).user_message();
            send_followup(state, invocation, &with_fingerprint(state, trace_id, &user)).await;
            state
                .alerts
                .maybe_emit(
                    Severity::Critical,
                    &invocation.command_name,
                    &format!("lookup of `{workflow}` run failed"),
                    trace_id,
                    None,
                )
                .await;
            return;
        }
    };

    // poll
    let started = Instant::now();
    let polled = state
        .dispatcher
        .poll_conclusion(run.id, state.config.poll_timeout(), POLL_BASE_BACKOFF, POLL_MAX_BACKOFF)
        .await;
    match polled {
        Ok(PollOutcome::Concluded(conclusion)) => {
            record(
                state,
                trace_id,
                "poll",
                &Ok::<(), HandlerError>(()),
                started,
                json!({"run_id": run.id, "conclusion": conclusion}),
            );
            let status = if conclusion == RunConclusion::Success {
                TraceStatus::Succeeded
            } else {
                TraceStatus::Failed
            };
            state.traces.finish_trace(trace_id, status);
            send_followup(
                state,
                invocation,
                &format!("{} {label}: {conclusion} — {}", conclusion.marker(), run.html_url),
            )
            .await;
            if conclusion != RunConclusion::Success {
                state
                    .alerts
                    .maybe_emit(
                        Severity::Critical,
                        &invocation.command_name,
                        &format!("`{workflow}` concluded {conclusion}"),
                        trace_id,
                        Some(&run.html_url),
                    )
                    .await;
            }
        }
        Ok(PollOutcome::Timeout) => {
            record(
                state,
                trace_id,
                "poll",
                &Ok::<(), HandlerError>(()),
                started,
                json!({"run_id": run.id, "outcome": "timeout"}),
            );
            state.traces.finish_trace(trace_id, TraceStatus::TimedOut);
            send_followup(
                state,
                invocation,
                &format!(
                    "⏱️ timeout: {label} did not conclude within {}s — {}",
                    state.config.poll_timeout_secs, run.html_url
                ),
            )
            .await;
            state
                .alerts
                .maybe_emit(
                    Severity::Warning,
                    &invocation.command_name,
                    &format!("polling `{workflow}` timed out"),
                    trace_id,
                    Some(&run.html_url),
                )
                .await;
        }
        Err(err) => {
            record(state, trace_id, "poll", &Err::<(), _>(&err), started, json!({"run_id": run.id}));
            state.traces.finish_trace(trace_id, TraceStatus::Failed);
            let user = HandlerError::from(err).user_message();
            send_followup(state, invocation, &with_fingerprint(state, trace_id, &user)).await;
            state
                .alerts
                .maybe_emit(
                    Severity::Critical,
                    &invocation.command_name,
                    &format!("polling `{workflow}` failed"),
                    trace_id,
                    Some(&run.html_url),
                )
                .await;
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Probe `api_base` for the fast deploy path. `Ok(Some(output))` means the
/// target answered unhealthy and the deploy should not start.
async fn health_gate(
    state: &AppState,
    trace_id: &str,
    api_base: &str,
) -> Result<Option<CommandOutput>, HandlerError> {
    let started = Instant::now();
    let report = state.health.check(api_base).await;
    record(state, trace_id, "health-check", &report, started, json!({"api_base": api_base}));
    let report = report?;
    if report.healthy {
        Ok(None)
    } else {
        Ok(Some(CommandOutput::ok(format!(
            "⚠️ health check of {api_base} answered {}; deploy not started",
            report.status
        ))))
    }
}

fn record<T, E: std::fmt::Debug>(
    state: &AppState,
    trace_id: &str,
    name: &str,
    result: &Result<T, E>,
    started: Instant,
    mut detail: Value,
) {
    let status = if result.is_ok() {
        StepStatus::Ok
    } else {
        StepStatus::Error
    };
    if let (Err(err), Value::Object(map)) = (result, &mut detail) {
        map.insert("error".to_string(), Value::String(format!("{err:?}")));
    }
    state
        .traces
        .record_step(trace_id, name, status, started.elapsed().as_millis() as u64, detail);
}

fn with_fingerprint(state: &AppState, trace_id: &str, message: &str) -> String {
    format!("{message} (trace `{}`)", trace_fingerprint(state, trace_id))
}

async fn send_followup(state: &AppState, invocation: &CommandInvocation, content: &str) {
    let Some(channel_id) = invocation.channel_id.as_deref() else {
        warn!(
            invocation_id = %invocation.invocation_id,
            "no channel to deliver follow-up to"
        );
        return;
    };
    if let Err(err) = state.chat.post_message(channel_id, content).await {
        warn!(error = %err, channel_id, "follow-up delivery failed");
    }
}

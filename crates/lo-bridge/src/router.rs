//! Per-invocation routing state machine:
//! `received → verified → authorized → executing → {ack_sent → completed} |
//! denied | rejected`.
//!
//! Verification runs against the raw request body before anything is
//! parsed; rejected requests never reach handler logic and their bodies
//! are never logged.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error, info, warn};

use lo_core::types::CommandInvocation;
use lo_harness::trace_store::TraceStatus;

use crate::commands::{self, BehaviorClass};
use crate::handlers;
use crate::protocol::{EventKind, EventResponse, InboundEvent};
use crate::state::AppState;
use crate::verify::{SIGNATURE_HEADER, TIMESTAMP_HEADER};

pub async fn handle_interaction(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // received → verified | rejected
    let Some(verifier) = state.verifier.as_ref() else {
        return rejected("no interaction public key configured");
    };
    let Some(timestamp) = headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok()) else {
        return rejected("missing signature timestamp header");
    };
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return rejected("missing signature header");
    };
    if let Err(err) = verifier.verify(timestamp, &body, signature) {
        return rejected(&err.to_string());
    }
    debug!(state = "verified", "inbound event signature verified");

    let event: InboundEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            warn!(error = %err, "malformed inbound payload");
            return bad_request("malformed payload");
        }
    };

    // Liveness probes are answered before any command logic.
    if event.kind == EventKind::Ping {
        debug!("ping event, answering pong");
        return Json(EventResponse::Pong).into_response();
    }

    let (Some(command_name), Some(requester_id)) = (event.command_name, event.requester_id) else {
        return bad_request("command events require command_name and requester_id");
    };
    let invocation = CommandInvocation::new(
        command_name,
        event.arguments,
        requester_id,
        event.requester_roles,
        event.channel_id,
    );
    // Arguments may carry user-supplied secrets; they only reach the log
    // through the redacting emitter.
    lo_telemetry::logging::log_event(
        tracing::Level::INFO,
        "command event received",
        &json!({
            "invocation_id": invocation.invocation_id,
            "command": invocation.command_name,
            "requester": invocation.requester_id,
            "arguments": invocation.arguments,
        }),
    );

    // verified → authorized | denied
    let Some(descriptor) = commands::lookup(&invocation.command_name) else {
        return Json(EventResponse::ephemeral(format!(
            "❓ unknown command `{}`",
            invocation.command_name
        )))
        .into_response();
    };
    if let Err(denial) = commands::authorize(descriptor, &invocation, &state.config) {
        info!(
            invocation_id = %invocation.invocation_id,
            ?denial,
            state = "denied",
            "authorization denied"
        );
        return Json(EventResponse::ephemeral(
            denial.user_message(&invocation.command_name),
        ))
        .into_response();
    }
    debug!(invocation_id = %invocation.invocation_id, state = "authorized", "command authorized");

    // authorized → executing
    let trace_id = state
        .traces
        .start_trace(&invocation.command_name, &invocation.requester_id);

    match commands::effective_behavior(descriptor, &invocation) {
        BehaviorClass::Fast => match handlers::execute_fast(&state, &invocation, &trace_id).await {
            Ok(output) => {
                state.traces.finish_trace(&trace_id, TraceStatus::Succeeded);
                debug!(
                    invocation_id = %invocation.invocation_id,
                    state = "completed",
                    "fast command completed"
                );
                Json(EventResponse::from(output)).into_response()
            }
            Err(err) => {
                state.traces.finish_trace(&trace_id, TraceStatus::Failed);
                let fingerprint = handlers::trace_fingerprint(&state, &trace_id);
                error!(
                    invocation_id = %invocation.invocation_id,
                    command = %invocation.command_name,
                    error = %err,
                    %trace_id,
                    "fast command failed"
                );
                Json(EventResponse::ephemeral(format!(
                    "{} (trace `{fingerprint}`)",
                    err.user_message()
                )))
                .into_response()
            }
        },
        BehaviorClass::LongRunning => {
            // executing → ack_sent; the spawned task reports completion as
            // a follow-up message and finishes the trace.
            let task_state = Arc::clone(&state);
            let task_invocation = invocation.clone();
            let task_trace = trace_id.clone();
            tokio::spawn(async move {
                handlers::execute_long_running(&task_state, &task_invocation, &task_trace).await;
            });
            debug!(
                invocation_id = %invocation.invocation_id,
                state = "ack_sent",
                "acknowledged, background task spawned"
            );
            Json(EventResponse::Ack).into_response()
        }
    }
}

fn rejected(reason: &str) -> Response {
    // Only the rejection reason is logged, never the payload body.
    warn!(reason, state = "rejected", "rejected inbound event");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "invalid request signature"})),
    )
        .into_response()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
}

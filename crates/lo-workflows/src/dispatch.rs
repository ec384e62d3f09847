use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use lo_core::types::{RunConclusion, RunStatus};

use crate::client::{WorkflowApi, WorkflowApiError};
use crate::types::ApiRun;

// ---------------------------------------------------------------------------
// Error & outcome
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("could not start workflow `{workflow}` (correlation id {correlation_id}): {source}")]
    Trigger {
        workflow: String,
        correlation_id: String,
        #[source]
        source: WorkflowApiError,
    },

    #[error(transparent)]
    Api(#[from] WorkflowApiError),
}

/// Terminal outcome of polling a run. Timing out is a normal outcome,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Concluded(RunConclusion),
    Timeout,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Branch workflow runs are dispatched against.
const DEFAULT_REF: &str = "main";

/// Runs fetched per correlation-lookup attempt.
const LOOKBACK_PAGE: u8 = 10;

/// Triggers workflow runs and correlates them back to their invocation.
///
/// The dispatch endpoint returns no run id, so a generated correlation id
/// is passed as a workflow input; the workflow templates it into its run
/// name, which [`Dispatcher::find_run_by_correlation`] then matches.
pub struct Dispatcher {
    api: Arc<dyn WorkflowApi>,
    lookback_delay: Duration,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn WorkflowApi>) -> Self {
        Self {
            api,
            lookback_delay: Duration::from_secs(3),
        }
    }

    /// Override the delay between correlation-lookup attempts (tests).
    pub fn with_lookback_delay(mut self, delay: Duration) -> Self {
        self.lookback_delay = delay;
        self
    }

    /// Trigger `workflow`, embedding a fresh correlation id into its
    /// inputs. Returns the correlation id; trigger failures carry it so
    /// the user-facing message can name it.
    pub async fn trigger(
        &self,
        workflow: &str,
        mut inputs: Map<String, Value>,
        requester_id: &str,
    ) -> Result<String, DispatchError> {
        let correlation_id: String = Uuid::new_v4().simple().to_string().chars().take(12).collect();
        inputs.insert("correlation_id".to_string(), Value::String(correlation_id.clone()));
        inputs.insert("requested_by".to_string(), Value::String(requester_id.to_string()));

        info!(workflow, %correlation_id, requester_id, "triggering workflow");
        self.api
            .dispatch_workflow(workflow, DEFAULT_REF, &Value::Object(inputs))
            .await
            .map_err(|source| DispatchError::Trigger {
                workflow: workflow.to_string(),
                correlation_id: correlation_id.clone(),
                source,
            })?;
        Ok(correlation_id)
    }

    /// Locate the run whose display title contains `correlation_id`,
    /// re-listing up to `max_lookback` times. `Ok(None)` after exhaustion;
    /// the caller degrades to "check manually" instead of blocking.
    pub async fn find_run_by_correlation(
        &self,
        workflow: &str,
        correlation_id: &str,
        max_lookback: u32,
    ) -> Result<Option<ApiRun>, DispatchError> {
        for attempt in 1..=max_lookback {
            let runs = self.api.list_runs(workflow, LOOKBACK_PAGE).await?;
            if let Some(run) = runs.iter().find(|r| r.title().contains(correlation_id)) {
                debug!(workflow, correlation_id, run_id = run.id, attempt, "correlated run");
                return Ok(Some(run.clone()));
            }
            if attempt < max_lookback {
                tokio::time::sleep(self.lookback_delay).await;
            }
        }
        warn!(workflow, correlation_id, max_lookback, "run not found by correlation");
        Ok(None)
    }

    /// Poll `run_id` until it completes or the time budget is spent.
    /// Backoff doubles from `base_backoff` up to `max_backoff`, with each
    /// sleep capped at the remaining budget so the call returns promptly
    /// at the deadline.
    pub async fn poll_conclusion(
        &self,
        run_id: u64,
        timeout: Duration,
        base_backoff: Duration,
        max_backoff: Duration,
    ) -> Result<PollOutcome, DispatchError> {
        let start = Instant::now();
        let mut backoff = base_backoff;
        loop {
            if start.elapsed() >= timeout {
                return Ok(PollOutcome::Timeout);
            }
            let run = self.api.get_run(run_id).await?;
            if run.run_status() == Some(RunStatus::Completed) {
                let conclusion = run.run_conclusion().unwrap_or(RunConclusion::Failure);
                debug!(run_id, %conclusion, "run concluded");
                return Ok(PollOutcome::Concluded(conclusion));
            }
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Ok(PollOutcome::Timeout);
            }
            tokio::time::sleep(backoff.min(remaining)).await;
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

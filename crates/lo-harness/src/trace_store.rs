use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use lo_core::redact::redact_value;

// ---------------------------------------------------------------------------
// Trace types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

/// One recorded phase of a command handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    /// Structured context, redacted before storage.
    pub detail: Value,
}

/// Execution trace of one command invocation. Created when the handler
/// starts, appended to as it runs, retained only in process memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: String,
    pub command_name: String,
    pub requester_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: TraceStatus,
    pub steps: Vec<Step>,
}

impl Trace {
    /// Short id used to correlate user-facing messages with stored traces:
    /// the first 8 characters of the trace id, `"unknown"` when empty.
    pub fn fingerprint(&self) -> String {
        if self.trace_id.is_empty() {
            "unknown".to_string()
        } else {
            self.trace_id.chars().take(8).collect()
        }
    }
}

// ---------------------------------------------------------------------------
// TraceStore
// ---------------------------------------------------------------------------

/// Capacity-bounded store of recent invocation traces.
///
/// All mutation goes through this type's methods; the LRU bound and the
/// insert are applied under one lock so two concurrent invocations cannot
/// race an eviction. Nothing here ever touches durable storage; a process
/// restart drops all traces.
#[derive(Debug)]
pub struct TraceStore {
    inner: Mutex<LruCache<String, Trace>>,
}

impl TraceStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Begin a trace for one invocation; returns its id. Inserting beyond
    /// capacity evicts the least-recently-used trace in the same critical
    /// section.
    pub fn start_trace(
        &self,
        command_name: impl Into<String>,
        requester_id: impl Into<String>,
    ) -> String {
        let trace_id = Uuid::new_v4().to_string().replace('-', "");
        let trace = Trace {
            trace_id: trace_id.clone(),
            command_name: command_name.into(),
            requester_id: requester_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: TraceStatus::Running,
            steps: Vec::new(),
        };
        if let Some((_, evicted)) = self.lock().push(trace_id.clone(), trace) {
            debug!(
                trace_id = %evicted.trace_id,
                status = ?evicted.status,
                "trace store at capacity, evicted oldest trace"
            );
        }
        trace_id
    }

    /// Append a step. `detail` is redacted before storage. Recording onto
    /// an evicted or unknown trace is a logged no-op.
    pub fn record_step(
        &self,
        trace_id: &str,
        name: impl Into<String>,
        status: StepStatus,
        duration_ms: u64,
        detail: Value,
    ) {
        let mut inner = self.lock();
        match inner.get_mut(trace_id) {
            Some(trace) => trace.steps.push(Step {
                name: name.into(),
                status,
                duration_ms,
                detail: redact_value(&detail),
            }),
            None => debug!(trace_id, "step recorded against unknown or evicted trace"),
        }
    }

    /// Mark a trace finished with its terminal status.
    pub fn finish_trace(&self, trace_id: &str, status: TraceStatus) {
        let mut inner = self.lock();
        if let Some(trace) = inner.get_mut(trace_id) {
            trace.finished_at = Some(Utc::now());
            trace.status = status;
        }
    }

    /// Fetch a trace by id without disturbing eviction order.
    pub fn get_trace(&self, trace_id: &str) -> Option<Trace> {
        self.lock().peek(trace_id).cloned()
    }

    /// The most recent trace, optionally restricted to one requester.
    pub fn get_last_trace(&self, requester_id: Option<&str>) -> Option<Trace> {
        let inner = self.lock();
        inner
            .iter()
            .map(|(_, trace)| trace)
            .find(|trace| requester_id.is_none_or(|r| trace.requester_id == r))
            .cloned()
    }

    /// The requester's most recent trace other than `excluding`, used by
    /// introspection commands so they do not report their own in-flight
    /// trace.
    pub fn get_previous_trace(&self, requester_id: &str, excluding: &str) -> Option<Trace> {
        let inner = self.lock();
        inner
            .iter()
            .map(|(_, trace)| trace)
            .find(|trace| trace.requester_id == requester_id && trace.trace_id != excluding)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Trace>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_takes_first_eight_chars() {
        let mut trace = Trace {
            trace_id: "abcdef1234567890".into(),
            command_name: "status".into(),
            requester_id: "u1".into(),
            started_at: Utc::now(),
            finished_at: None,
            status: TraceStatus::Running,
            steps: Vec::new(),
        };
        assert_eq!(trace.fingerprint(), "abcdef12");
        trace.trace_id.clear();
        assert_eq!(trace.fingerprint(), "unknown");
    }

    #[test]
    fn start_record_finish_roundtrip() {
        let store = TraceStore::new(8);
        let id = store.start_trace("deploy-client", "u1");

        store.record_step(&id, "trigger", StepStatus::Ok, 120, json!({"workflow": "deploy.yml"}));
        store.record_step(&id, "locate", StepStatus::Ok, 3000, json!({"run_id": 7}));
        store.finish_trace(&id, TraceStatus::Succeeded);

        let trace = store.get_trace(&id).unwrap();
        assert_eq!(trace.steps.len(), 2);
        assert_eq!(trace.status, TraceStatus::Succeeded);
        assert!(trace.finished_at.is_some());
        assert_eq!(trace.steps[0].name, "trigger");
    }

    #[test]
    fn step_detail_is_redacted_on_write() {
        let store = TraceStore::new(2);
        let id = store.start_trace("diagnose", "u1");
        store.record_step(&id, "trigger", StepStatus::Ok, 5, json!({"api_token": "tok_9999zzzz"}));
        let trace = store.get_trace(&id).unwrap();
        assert_eq!(trace.steps[0].detail["api_token"], "***zzzz");
    }

    #[test]
    fn capacity_bound_evicts_oldest() {
        let store = TraceStore::new(2);
        let first = store.start_trace("status", "u1");
        let second = store.start_trace("status", "u2");
        let third = store.start_trace("status", "u3");

        assert_eq!(store.len(), 2);
        assert!(store.get_trace(&first).is_none());
        assert!(store.get_trace(&second).is_some());
        assert!(store.get_trace(&third).is_some());
    }

    #[test]
    fn recording_on_evicted_trace_is_noop() {
        let store = TraceStore::new(1);
        let first = store.start_trace("status", "u1");
        let _second = store.start_trace("status", "u2");
        store.record_step(&first, "late", StepStatus::Ok, 1, Value::Null);
        assert!(store.get_trace(&first).is_none());
    }

    #[test]
    fn previous_trace_skips_the_current_one() {
        let store = TraceStore::new(8);
        let earlier = store.start_trace("status", "u1");
        let current = store.start_trace("debug-last", "u1");

        let found = store.get_previous_trace("u1", &current).unwrap();
        assert_eq!(found.trace_id, earlier);
        assert!(store.get_previous_trace("u1", &earlier).is_some());
        assert!(store.get_previous_trace("u2", &current).is_none());
    }

    #[test]
    fn last_trace_filters_by_requester() {
        let store = TraceStore::new(8);
        let a = store.start_trace("status", "u1");
        let b = store.start_trace("diagnose", "u2");

        assert_eq!(store.get_last_trace(None).unwrap().trace_id, b);
        assert_eq!(store.get_last_trace(Some("u1")).unwrap().trace_id, a);
        assert!(store.get_last_trace(Some("u3")).is_none());
    }

    #[test]
    fn concurrent_writers_keep_distinct_traces_consistent() {
        use std::sync::Arc;
        let store = Arc::new(TraceStore::new(64));
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let id = store.start_trace("status", format!("u{i}"));
                for step in 0..5 {
                    store.record_step(&id, format!("step-{step}"), StepStatus::Ok, 1, Value::Null);
                }
                store.finish_trace(&id, TraceStatus::Succeeded);
                id
            }));
        }
        for handle in handles {
            let id = handle.join().expect("writer panicked");
            let trace = store.get_trace(&id).expect("trace missing");
            assert_eq!(trace.steps.len(), 5);
            assert_eq!(trace.status, TraceStatus::Succeeded);
        }
    }
}

//! Shared domain types for the lodge-ops subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// CommandInvocation
// ---------------------------------------------------------------------------

/// One verified inbound command, immutable for its request lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub invocation_id: Uuid,
    pub command_name: String,
    pub arguments: Map<String, Value>,
    pub requester_id: String,
    pub requester_roles: Vec<String>,
    /// Channel the command arrived from; follow-ups are posted back here.
    pub channel_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl CommandInvocation {
    pub fn new(
        command_name: impl Into<String>,
        arguments: Map<String, Value>,
        requester_id: impl Into<String>,
        requester_roles: Vec<String>,
        channel_id: Option<String>,
    ) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            command_name: command_name.into(),
            arguments,
            requester_id: requester_id.into(),
            requester_roles,
            channel_id,
            received_at: Utc::now(),
        }
    }

    pub fn arg_str(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).and_then(|v| v.as_str())
    }

    pub fn arg_u64(&self, name: &str) -> Option<u64> {
        self.arguments.get(name).and_then(|v| v.as_u64())
    }

    pub fn arg_bool(&self, name: &str) -> Option<bool> {
        self.arguments.get(name).and_then(|v| v.as_bool())
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Marker prefixed to alert channel posts.
    pub fn marker(&self) -> &'static str {
        match self {
            Severity::Info => "ℹ️",
            Severity::Warning => "⚠️",
            Severity::Critical => "🚨",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Workflow run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
}

impl RunStatus {
    /// Parse the status string reported by the workflow API. Pre-start
    /// states (`waiting`, `pending`, `requested`) count as queued.
    pub fn from_api(status: &str) -> Option<Self> {
        match status {
            "queued" | "waiting" | "pending" | "requested" => Some(RunStatus::Queued),
            "in_progress" => Some(RunStatus::InProgress),
            "completed" => Some(RunStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    TimedOut,
}

impl RunConclusion {
    /// Parse the conclusion string reported by the workflow API.
    /// Anything that is not a recognized terminal state maps to `Failure`.
    pub fn from_api(conclusion: &str) -> Self {
        match conclusion {
            "success" => RunConclusion::Success,
            "cancelled" => RunConclusion::Cancelled,
            "timed_out" => RunConclusion::TimedOut,
            _ => RunConclusion::Failure,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunConclusion::Success => "success",
            RunConclusion::Failure => "failure",
            RunConclusion::Cancelled => "cancelled",
            RunConclusion::TimedOut => "timed_out",
        }
    }

    /// Marker used in user-facing summaries.
    pub fn marker(&self) -> &'static str {
        match self {
            RunConclusion::Success => "✅",
            RunConclusion::Failure => "❌",
            RunConclusion::Cancelled => "🚫",
            RunConclusion::TimedOut => "⏱️",
        }
    }
}

impl std::fmt::Display for RunConclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dispatched workflow run, tracked for the lifetime of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub workflow_name: String,
    pub correlation_id: String,
    pub run_id: Option<u64>,
    pub html_url: Option<String>,
    pub status: RunStatus,
    pub conclusion: Option<RunConclusion>,
}

impl WorkflowRun {
    pub fn pending(workflow_name: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            correlation_id: correlation_id.into(),
            run_id: None,
            html_url: None,
            status: RunStatus::Queued,
            conclusion: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lo_core::types::{RunConclusion, RunStatus};

/// One workflow run as reported by the Actions API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_title: Option<String>,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
}

impl ApiRun {
    /// The run's display title, falling back to the workflow name.
    /// Correlation ids are matched against this.
    pub fn title(&self) -> &str {
        self.display_title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("")
    }

    pub fn run_status(&self) -> Option<RunStatus> {
        RunStatus::from_api(&self.status)
    }

    /// Terminal conclusion; a completed run with no recognizable
    /// conclusion counts as a failure.
    pub fn run_conclusion(&self) -> Option<RunConclusion> {
        if self.run_status() != Some(RunStatus::Completed) {
            return None;
        }
        Some(
            self.conclusion
                .as_deref()
                .map(RunConclusion::from_api)
                .unwrap_or(RunConclusion::Failure),
        )
    }
}

/// Envelope of the list-runs endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RunsResponse {
    #[serde(default)]
    pub total_count: u64,
    pub workflow_runs: Vec<ApiRun>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(status: &str, conclusion: Option<&str>) -> ApiRun {
        ApiRun {
            id: 1,
            name: Some("verify".into()),
            display_title: Some("verify [abc123]".into()),
            status: status.into(),
            conclusion: conclusion.map(String::from),
            html_url: "https://github.com/lodge-social/lodge/actions/runs/1".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn title_prefers_display_title() {
        let mut r = run("queued", None);
        assert_eq!(r.title(), "verify [abc123]");
        r.display_title = None;
        assert_eq!(r.title(), "verify");
        r.name = None;
        assert_eq!(r.title(), "");
    }

    #[test]
    fn conclusion_only_on_completed_runs() {
        assert_eq!(run("in_progress", None).run_conclusion(), None);
        assert_eq!(
            run("completed", Some("success")).run_conclusion(),
            Some(RunConclusion::Success)
        );
    }

    #[test]
    fn completed_without_conclusion_is_failure() {
        assert_eq!(
            run("completed", None).run_conclusion(),
            Some(RunConclusion::Failure)
        );
    }

    #[test]
    fn runs_response_parses_api_shape() {
        let json = r#"{
            "total_count": 1,
            "workflow_runs": [{
                "id": 42,
                "display_title": "deploy [fe12ab34cd56]",
                "status": "completed",
                "conclusion": "success",
                "html_url": "https://github.com/lodge-social/lodge/actions/runs/42",
                "created_at": "2026-08-01T12:00:00Z"
            }]
        }"#;
        let parsed: RunsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.total_count, 1);
        assert_eq!(parsed.workflow_runs[0].id, 42);
        assert!(parsed.workflow_runs[0].title().contains("fe12ab34cd56"));
    }
}

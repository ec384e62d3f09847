use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use lo_core::config::{Credentials, OpsConfig};
use lo_harness::rate_limiter::ApiGate;
use lo_harness::retry::{with_retry, RetryPolicy};

use crate::types::{ApiRun, RunsResponse};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WorkflowApiError {
    #[error("workflow api http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("workflow api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("missing workflow api token – set GITHUB_TOKEN")]
    MissingToken,
}

impl WorkflowApiError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            WorkflowApiError::Http(err) => err.is_timeout() || err.is_connect(),
            WorkflowApiError::Api { status, .. } => *status >= 500 || *status == 429,
            WorkflowApiError::MissingToken => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowApiError>;

// ---------------------------------------------------------------------------
// WorkflowApi trait
// ---------------------------------------------------------------------------

/// The outbound workflow surface the dispatcher and handlers depend on.
/// Production uses [`WorkflowClient`]; tests substitute a fake.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Trigger a run of `workflow` on `git_ref` with the given inputs.
    async fn dispatch_workflow(&self, workflow: &str, git_ref: &str, inputs: &Value) -> Result<()>;

    /// Most recent runs of `workflow`, newest first.
    async fn list_runs(&self, workflow: &str, limit: u8) -> Result<Vec<ApiRun>>;

    /// One run by id.
    async fn get_run(&self, run_id: u64) -> Result<ApiRun>;

    /// Create or update a repository Actions variable.
    async fn set_repo_variable(&self, name: &str, value: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// WorkflowClient
// ---------------------------------------------------------------------------

const API_VERSION: &str = "2022-11-28";

/// GitHub Actions REST client. The token is read from the environment at
/// call time and never stored; every request passes the shared [`ApiGate`]
/// and the bounded retry policy.
#[derive(Clone)]
pub struct WorkflowClient {
    http: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    gate: Arc<ApiGate>,
    retry: RetryPolicy,
}

impl WorkflowClient {
    pub fn new(config: &OpsConfig, gate: Arc<ApiGate>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("lodge-ops")
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            api_base: "https://api.github.com".to_string(),
            owner: config.github_owner.clone(),
            repo: config.github_repo.clone(),
            gate,
            retry: RetryPolicy::default(),
        })
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{tail}",
            self.api_base, self.owner, self.repo
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> Result<reqwest::RequestBuilder> {
        let token = Credentials::github_token().ok_or(WorkflowApiError::MissingToken)?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(WorkflowApiError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl WorkflowApi for WorkflowClient {
    async fn dispatch_workflow(&self, workflow: &str, git_ref: &str, inputs: &Value) -> Result<()> {
        let url = self.repo_url(&format!("actions/workflows/{workflow}/dispatches"));
        let body = serde_json::json!({ "ref": git_ref, "inputs": inputs });
        debug!(workflow, git_ref, "dispatching workflow run");
        with_retry(&self.retry, "dispatch_workflow", WorkflowApiError::is_transient, || async {
            self.gate.acquire().await;
            let resp = self
                .request(reqwest::Method::POST, &url)?
                .json(&body)
                .send()
                .await?;
            Self::check(resp).await?;
            Ok(())
        })
        .await
    }

    async fn list_runs(&self, workflow: &str, limit: u8) -> Result<Vec<ApiRun>> {
        let url = self.repo_url(&format!("actions/workflows/{workflow}/runs"));
        with_retry(&self.retry, "list_runs", WorkflowApiError::is_transient, || async {
            self.gate.acquire().await;
            let resp = self
                .request(reqwest::Method::GET, &url)?
                .query(&[("per_page", limit.to_string())])
                .send()
                .await?;
            let parsed: RunsResponse = Self::check(resp).await?.json().await?;
            Ok(parsed.workflow_runs)
        })
        .await
    }

    async fn get_run(&self, run_id: u64) -> Result<ApiRun> {
        let url = self.repo_url(&format!("actions/runs/{run_id}"));
        with_retry(&self.retry, "get_run", WorkflowApiError::is_transient, || async {
            self.gate.acquire().await;
            let resp = self.request(reqwest::Method::GET, &url)?.send().await?;
            Ok(Self::check(resp).await?.json().await?)
        })
        .await
    }

    async fn set_repo_variable(&self, name: &str, value: &str) -> Result<()> {
        let body = serde_json::json!({ "name": name, "value": value });
        let patch_url = self.repo_url(&format!("actions/variables/{name}"));
        let create_url = self.repo_url("actions/variables");
        with_retry(&self.retry, "set_repo_variable", WorkflowApiError::is_transient, || async {
            self.gate.acquire().await;
            let resp = self
                .request(reqwest::Method::PATCH, &patch_url)?
                .json(&body)
                .send()
                .await?;
            match Self::check(resp).await {
                Ok(_) => Ok(()),
                // Variable does not exist yet: create it.
                Err(WorkflowApiError::Api { status: 404, .. }) => {
                    self.gate.acquire().await;
                    let resp = self
                        .request(reqwest::Method::POST, &create_url)?
                        .json(&body)
                        .send()
                        .await?;
                    Self::check(resp).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(WorkflowApiError::Api { status: 502, body: String::new() }.is_transient());
        assert!(WorkflowApiError::Api { status: 429, body: String::new() }.is_transient());
        assert!(!WorkflowApiError::Api { status: 404, body: String::new() }.is_transient());
        assert!(!WorkflowApiError::Api { status: 422, body: String::new() }.is_transient());
        assert!(!WorkflowApiError::MissingToken.is_transient());
    }

    #[test]
    fn repo_urls_are_shaped_for_the_actions_api() {
        let config = OpsConfig::from_lookup(|name| match name {
            "GITHUB_OWNER" => Some("lodge-social".into()),
            "GITHUB_REPO" => Some("lodge".into()),
            _ => None,
        });
        let gate = Arc::new(ApiGate::min_interval(Duration::from_millis(1)));
        let client = WorkflowClient::new(&config, gate).unwrap();
        assert_eq!(
            client.repo_url("actions/workflows/verify.yml/runs"),
            "https://api.github.com/repos/lodge-social/lodge/actions/workflows/verify.yml/runs"
        );
    }
}

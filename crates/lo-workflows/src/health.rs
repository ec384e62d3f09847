use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use lo_harness::url_guard::{UnsafeTargetError, UrlGuard};

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error(transparent)]
    Unsafe(#[from] UnsafeTargetError),

    #[error("health check request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result of one guarded health probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub url: String,
    pub status: u16,
    pub latency_ms: u64,
    pub healthy: bool,
}

/// Probes user-supplied endpoints. Every target passes the [`UrlGuard`]
/// before any connection is opened.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    guard: UrlGuard,
    http: reqwest::Client,
    timeout: Duration,
}

impl HealthChecker {
    pub fn new(guard: UrlGuard) -> Result<Self, HealthError> {
        let timeout = Duration::from_secs(5);
        let http = reqwest::Client::builder()
            .user_agent("lodge-ops")
            .timeout(timeout)
            .build()?;
        Ok(Self { guard, http, timeout })
    }

    /// Validate `target` and probe it with a GET.
    pub async fn check(&self, target: &str) -> Result<HealthReport, HealthError> {
        self.guard.validate(target)?;

        let start = Instant::now();
        let resp = self.http.get(target).timeout(self.timeout).send().await?;
        let latency_ms = start.elapsed().as_millis() as u64;
        let status = resp.status();

        let report = HealthReport {
            url: target.to_string(),
            status: status.as_u16(),
            latency_ms,
            healthy: status.is_success(),
        };
        info!(url = target, status = report.status, latency_ms, "health probe");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsafe_targets_rejected_before_any_request() {
        let checker = HealthChecker::new(UrlGuard::new()).unwrap();
        for target in [
            "http://api.lodge.social/health",
            "https://127.0.0.1/health",
            "https://10.1.2.3/health",
            "https://169.254.169.254/latest/meta-data",
        ] {
            let err = checker.check(target).await.unwrap_err();
            assert!(matches!(err, HealthError::Unsafe(_)), "{target} should be guarded");
        }
    }
}

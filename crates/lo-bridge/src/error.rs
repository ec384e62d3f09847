use lo_harness::url_guard::UnsafeTargetError;
use lo_workflows::client::WorkflowApiError;
use lo_workflows::dispatch::DispatchError;
use lo_workflows::health::HealthError;

use crate::chat::ChatError;

/// Failure of one command handler. Everything here is recovered at the
/// router boundary and rendered as a short user-facing message; the raw
/// error only reaches the (redacted) logs.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Malformed or missing arguments; the message names the field.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Unsafe(#[from] UnsafeTargetError),

    #[error(transparent)]
    Health(#[from] HealthError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Api(#[from] WorkflowApiError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("`{0}` is disabled")]
    Disabled(&'static str),
}

impl HandlerError {
    /// Short user-facing rendering. Never leaks internals: transport and
    /// API errors collapse to a generic line.
    pub fn user_message(&self) -> String {
        match self {
            HandlerError::Validation(msg) => format!("⚠️ {msg}"),
            HandlerError::Unsafe(err) | HandlerError::Health(HealthError::Unsafe(err)) => {
                format!("⚠️ unsafe target: {err}")
            }
            HandlerError::Health(HealthError::Http(_)) => {
                "❌ health check failed – the target did not answer".to_string()
            }
            HandlerError::Dispatch(DispatchError::Trigger { correlation_id, .. }) => format!(
                "❌ could not start the workflow (correlation id `{correlation_id}`) – check the Actions tab"
            ),
            HandlerError::Dispatch(_) | HandlerError::Api(_) => {
                "❌ the workflow API is not answering; try again shortly".to_string()
            }
            HandlerError::Chat(_) => "❌ something went wrong delivering the reply".to_string(),
            HandlerError::Disabled(feature) => format!("🚫 `{feature}` is disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_failures_name_the_correlation_id() {
        let err = HandlerError::Dispatch(DispatchError::Trigger {
            workflow: "deploy-client.yml".into(),
            correlation_id: "abc123def456".into(),
            source: WorkflowApiError::Api {
                status: 500,
                body: "boom".into(),
            },
        });
        let msg = err.user_message();
        assert!(msg.contains("abc123def456"));
        assert!(!msg.contains("boom"), "internal body must not leak");
    }

    #[test]
    fn api_errors_render_generically() {
        let err = HandlerError::Api(WorkflowApiError::Api {
            status: 502,
            body: "secret internals".into(),
        });
        assert!(!err.user_message().contains("secret internals"));
    }

    #[test]
    fn validation_errors_name_the_field() {
        let err = HandlerError::Validation("`run_id` is required".into());
        assert!(err.user_message().contains("run_id"));
    }
}

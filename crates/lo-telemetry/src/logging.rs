use serde_json::Value;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use lo_core::redact::redact_value;

/// Initialize logging with human-readable output format.
///
/// Uses the `RUST_LOG` environment variable if set, otherwise falls back
/// to `default_level` (e.g. "info", "lo_bridge=debug,warn").
///
/// Safe to call multiple times (e.g. in tests) -- subsequent calls are no-ops.
pub fn init_logging(service_name: &str, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .try_init()
        .ok();

    tracing::info!(service = service_name, "logging initialised (human-readable)");
}

/// Initialize logging with JSON output format (suitable for a log collector).
///
/// Safe to call multiple times -- subsequent calls are no-ops.
pub fn init_logging_json(service_name: &str, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .try_init()
        .ok();

    tracing::info!(service = service_name, "logging initialised (json)");
}

/// Emit one structured event with `fields` redacted.
///
/// The subscriber supplies the UTC timestamp and level name; `fields` is
/// serialized after passing through the secret redactor so sensitive
/// values never reach the sink. This function cannot fail: redaction is
/// pure and `serde_json::Value` always serializes.
pub fn log_event(level: Level, message: &str, fields: &Value) {
    let fields = redact_value(fields).to_string();
    match level {
        Level::ERROR => tracing::error!(fields = %fields, "{message}"),
        Level::WARN => tracing::warn!(fields = %fields, "{message}"),
        Level::INFO => tracing::info!(fields = %fields, "{message}"),
        _ => tracing::debug!(fields = %fields, "{message}"),
    }
}

/// Redact a field set without emitting, for callers that embed the fields
/// into an event of their own.
pub fn redacted(fields: &Value) -> String {
    redact_value(fields).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn init_is_idempotent() {
        init_logging("lo-telemetry-test", "debug");
        init_logging("lo-telemetry-test", "debug");
    }

    #[test]
    fn log_event_never_panics_on_any_level() {
        init_logging("lo-telemetry-test", "debug");
        let fields = json!({"api_token": "tok_abcd1234", "workflow": "verify.yml"});
        for level in [Level::DEBUG, Level::INFO, Level::WARN, Level::ERROR] {
            log_event(level, "dispatching", &fields);
        }
    }

    #[test]
    fn redacted_masks_sensitive_fields() {
        let out = redacted(&json!({"Password": "hunter2x", "count": 2}));
        assert!(out.contains("***er2x"));
        assert!(!out.contains("hunter2x"));
        assert!(out.contains("\"count\":2"));
    }
}

//! Environment-sourced runtime configuration.
//!
//! **Security**: `OpsConfig` NEVER stores API tokens or bot credentials.
//! Secrets are read from environment variables at call time via
//! [`Credentials`]. Config only carries non-secret settings and the names
//! of things.

use std::time::Duration;

// ---------------------------------------------------------------------------
// OpsConfig
// ---------------------------------------------------------------------------

/// Immutable runtime configuration, computed once at process start and
/// threaded explicitly into every component constructor.
///
/// All values come from environment variables; every flag defaults to
/// disabled and every list to empty. Tests construct configs through
/// [`OpsConfig::from_lookup`] with an injected lookup instead of mutating
/// the process environment.
#[derive(Debug, Clone)]
pub struct OpsConfig {
    /// `ENABLE_DEBUG_CMD` — expose the `debug-last` command.
    pub enable_debug_cmd: bool,
    /// `ENABLE_ALERTS` — master switch for the alert manager.
    pub enable_alerts: bool,
    /// `ALERT_CHANNEL_ID` — chat channel receiving operational alerts.
    pub alert_channel_id: Option<String>,
    /// `ALLOW_SECRET_WRITES` — permit `set-frontend` / `set-api-base` to
    /// write repository variables.
    pub allow_secret_writes: bool,
    /// `ADMIN_USER_IDS` — comma-separated requester ids allowed to run
    /// admin-tagged commands.
    pub admin_user_ids: Vec<String>,
    /// `ADMIN_ROLE_IDS` — comma-separated role ids allowed to run
    /// admin-tagged commands.
    pub admin_role_ids: Vec<String>,

    /// `LODGE_CHAT_PUBLIC_KEY` — hex Ed25519 public key used to verify
    /// inbound interaction signatures. Verification fails closed when
    /// absent.
    pub chat_public_key: Option<String>,
    /// `LODGE_CHAT_API_BASE` — base URL of the chat platform REST API.
    pub chat_api_base: String,

    /// `GITHUB_OWNER` / `GITHUB_REPO` — repository whose workflows the
    /// dispatcher drives.
    pub github_owner: String,
    pub github_repo: String,

    /// `LODGE_BIND_ADDR` — socket address the daemon listens on.
    pub bind_addr: String,
    /// `LODGE_LOG_LEVEL` — default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// `LODGE_LOG_FORMAT` — `json` for collector-friendly output.
    pub log_json: bool,

    /// `ALERT_DEDUP_SECS` — dedup window for repeated alerts.
    pub alert_dedup_secs: u64,
    /// `TRACE_CAPACITY` — maximum retained invocation traces.
    pub trace_capacity: usize,
    /// `WORKFLOW_MIN_INTERVAL_MS` — shared minimum interval between
    /// outbound workflow API calls.
    pub workflow_min_interval_ms: u64,
    /// `POLL_TIMEOUT_SECS` — budget for polling a dispatched run.
    pub poll_timeout_secs: u64,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl OpsConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration through an injected variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            enable_debug_cmd: flag(&lookup, "ENABLE_DEBUG_CMD"),
            enable_alerts: flag(&lookup, "ENABLE_ALERTS"),
            alert_channel_id: non_empty(&lookup, "ALERT_CHANNEL_ID"),
            allow_secret_writes: flag(&lookup, "ALLOW_SECRET_WRITES"),
            admin_user_ids: list(&lookup, "ADMIN_USER_IDS"),
            admin_role_ids: list(&lookup, "ADMIN_ROLE_IDS"),
            chat_public_key: non_empty(&lookup, "LODGE_CHAT_PUBLIC_KEY"),
            chat_api_base: non_empty(&lookup, "LODGE_CHAT_API_BASE")
                .unwrap_or_else(|| "https://chat.lodge.social/api".to_string()),
            github_owner: non_empty(&lookup, "GITHUB_OWNER")
                .unwrap_or_else(|| "lodge-social".to_string()),
            github_repo: non_empty(&lookup, "GITHUB_REPO")
                .unwrap_or_else(|| "lodge".to_string()),
            bind_addr: non_empty(&lookup, "LODGE_BIND_ADDR")
                .unwrap_or_else(|| "0.0.0.0:8787".to_string()),
            log_level: non_empty(&lookup, "LODGE_LOG_LEVEL")
                .unwrap_or_else(|| "info".to_string()),
            log_json: lookup("LODGE_LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            alert_dedup_secs: parse_or(&lookup, "ALERT_DEDUP_SECS", 300),
            trace_capacity: parse_or(&lookup, "TRACE_CAPACITY", 50),
            workflow_min_interval_ms: parse_or(&lookup, "WORKFLOW_MIN_INTERVAL_MS", 750),
            poll_timeout_secs: parse_or(&lookup, "POLL_TIMEOUT_SECS", 600),
        }
    }

    /// Whether a requester may run admin-tagged commands.
    pub fn is_admin(&self, requester_id: &str, roles: &[String]) -> bool {
        self.admin_user_ids.iter().any(|id| id == requester_id)
            || roles.iter().any(|r| self.admin_role_ids.contains(r))
    }

    pub fn alert_dedup_window(&self) -> Duration {
        Duration::from_secs(self.alert_dedup_secs)
    }

    pub fn workflow_min_interval(&self) -> Duration {
        Duration::from_millis(self.workflow_min_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Credentials — secrets resolved from the environment at call time
// ---------------------------------------------------------------------------

/// Reads credentials from environment variables on demand; secrets are
/// never held in [`OpsConfig`].
pub struct Credentials;

impl Credentials {
    /// Token used for the workflow API (`GITHUB_TOKEN`).
    pub fn github_token() -> Option<String> {
        std::env::var("GITHUB_TOKEN").ok().filter(|v| !v.is_empty())
    }

    /// Bot token used for the chat REST API (`LODGE_CHAT_BOT_TOKEN`).
    pub fn chat_bot_token() -> Option<String> {
        std::env::var("LODGE_CHAT_BOT_TOKEN")
            .ok()
            .filter(|v| !v.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

fn flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> bool {
    match lookup(name) {
        Some(v) => {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") || v == "1"
        }
        None => false,
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn list(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Vec<String> {
    lookup(name)
        .map(|v| {
            v.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> T {
    lookup(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_disabled_and_empty() {
        let cfg = OpsConfig::from_lookup(|_| None);
        assert!(!cfg.enable_debug_cmd);
        assert!(!cfg.enable_alerts);
        assert!(!cfg.allow_secret_writes);
        assert!(cfg.alert_channel_id.is_none());
        assert!(cfg.admin_user_ids.is_empty());
        assert!(cfg.admin_role_ids.is_empty());
        assert_eq!(cfg.alert_dedup_secs, 300);
        assert_eq!(cfg.trace_capacity, 50);
    }

    #[test]
    fn flags_accept_common_truthy_spellings() {
        for spelling in ["1", "true", "TRUE", "yes"] {
            let cfg = OpsConfig::from_lookup(lookup_from(&[("ENABLE_ALERTS", spelling)]));
            assert!(cfg.enable_alerts, "spelling {spelling:?} should enable");
        }
        let cfg = OpsConfig::from_lookup(lookup_from(&[("ENABLE_ALERTS", "0")]));
        assert!(!cfg.enable_alerts);
    }

    #[test]
    fn admin_lists_split_and_trim() {
        let cfg = OpsConfig::from_lookup(lookup_from(&[
            ("ADMIN_USER_IDS", "u1, u2 ,,u3"),
            ("ADMIN_ROLE_IDS", "ops"),
        ]));
        assert_eq!(cfg.admin_user_ids, vec!["u1", "u2", "u3"]);
        assert_eq!(cfg.admin_role_ids, vec!["ops"]);
    }

    #[test]
    fn is_admin_matches_user_or_role() {
        let cfg = OpsConfig::from_lookup(lookup_from(&[
            ("ADMIN_USER_IDS", "u1"),
            ("ADMIN_ROLE_IDS", "r9"),
        ]));
        assert!(cfg.is_admin("u1", &[]));
        assert!(cfg.is_admin("u2", &["r9".to_string()]));
        assert!(!cfg.is_admin("u2", &["r1".to_string()]));
    }

    #[test]
    fn numeric_overrides_parse_with_fallback() {
        let cfg = OpsConfig::from_lookup(lookup_from(&[
            ("ALERT_DEDUP_SECS", "60"),
            ("TRACE_CAPACITY", "not-a-number"),
        ]));
        assert_eq!(cfg.alert_dedup_secs, 60);
        assert_eq!(cfg.trace_capacity, 50);
    }

    #[test]
    fn empty_channel_id_is_none() {
        let cfg = OpsConfig::from_lookup(lookup_from(&[("ALERT_CHANNEL_ID", "  ")]));
        assert!(cfg.alert_channel_id.is_none());
    }
}

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHasher;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use lo_core::types::Severity;

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
#[error("alert channel post failed: {0}")]
pub struct SinkError(pub String);

/// Where emitted alerts go. The production impl posts to the chat API;
/// tests record posts in memory.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn post(&self, channel_id: &str, content: &str) -> Result<(), SinkError>;
}

// ---------------------------------------------------------------------------
// AlertManager
// ---------------------------------------------------------------------------

/// Longest alert message body posted to the channel.
const MAX_MESSAGE_CHARS: usize = 500;

/// Fingerprint table size that triggers a lazy prune of stale entries.
const PRUNE_THRESHOLD: usize = 64;

/// Fingerprinted, time-windowed alert deduplication.
///
/// Shared process-wide; the fingerprint check and the `last_emitted_at`
/// update happen under the map's entry lock so two near-simultaneous
/// alerts with the same fingerprint cannot both pass the window check.
pub struct AlertManager {
    enabled: bool,
    channel_id: Option<String>,
    window: Duration,
    fingerprints: DashMap<u64, Instant>,
    sink: Arc<dyn AlertSink>,
}

impl AlertManager {
    pub fn new(
        enabled: bool,
        channel_id: Option<String>,
        window: Duration,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            enabled,
            channel_id,
            window,
            fingerprints: DashMap::new(),
            sink,
        }
    }

    /// An alert manager that never emits (alerts feature-flagged off).
    pub fn disabled(sink: Arc<dyn AlertSink>) -> Self {
        Self::new(false, None, Duration::from_secs(300), sink)
    }

    /// Emit an alert unless an identical one fired within the dedup window.
    ///
    /// Returns `true` when the alert was emitted (or emission was attempted
    /// ; channel failures are logged, never propagated). Returns `false`
    /// when alerts are disabled or the fingerprint was suppressed; a
    /// disabled manager touches no fingerprint state at all.
    pub async fn maybe_emit(
        &self,
        severity: Severity,
        source_id: &str,
        message: &str,
        trace_id: &str,
        run_url: Option<&str>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(channel_id) = self.channel_id.clone() else {
            return false;
        };

        let fingerprint = fingerprint(severity, source_id, message);
        let now = Instant::now();

        if self.fingerprints.len() > PRUNE_THRESHOLD {
            let window = self.window;
            self.fingerprints
                .retain(|_, emitted| now.duration_since(*emitted) < window);
        }

        let emit = match self.fingerprints.entry(fingerprint) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.window {
                    false
                } else {
                    *entry.get_mut() = now;
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        };

        if !emit {
            debug!(source_id, fingerprint, "alert suppressed within dedup window");
            return false;
        }

        let mut content = format!(
            "{} **{}** `{}`: {}",
            severity.marker(),
            severity,
            source_id,
            truncate(message, MAX_MESSAGE_CHARS),
        );
        content.push_str(&format!("\ntrace `{trace_id}`"));
        if let Some(url) = run_url {
            content.push_str(&format!("\n{url}"));
        }

        info!(source_id, %severity, trace_id, "emitting alert");
        if let Err(err) = self.sink.post(&channel_id, &content).await {
            // Alerting must never crash the invoking command.
            warn!(error = %err, channel_id, "failed to post alert");
        }
        true
    }

    /// Number of fingerprints currently tracked.
    pub fn fingerprint_count(&self) -> usize {
        self.fingerprints.len()
    }
}

fn fingerprint(severity: Severity, source_id: &str, message: &str) -> u64 {
    let normalized = message
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut hasher = AHasher::default();
    severity.as_str().hash(&mut hasher);
    source_id.hash(&mut hasher);
    normalized.hash(&mut hasher);
    hasher.finish()
}

fn truncate(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        message.to_string()
    } else {
        let cut: String = message.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

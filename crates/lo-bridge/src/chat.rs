use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use lo_core::config::{Credentials, OpsConfig};
use lo_harness::alerts::{AlertSink, SinkError};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat api http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("missing chat bot token – set LODGE_CHAT_BOT_TOKEN")]
    MissingToken,
}

// ---------------------------------------------------------------------------
// ChatApi trait
// ---------------------------------------------------------------------------

/// Outbound chat surface: follow-up messages and alert posts both go
/// through here. Tests substitute a recording fake.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn post_message(&self, channel_id: &str, content: &str) -> Result<(), ChatError>;
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// REST client for the chat platform. The bot token is read from the
/// environment at call time and never stored.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    api_base: String,
}

impl ChatClient {
    pub fn new(config: &OpsConfig) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .user_agent("lodge-ops")
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_base: config.chat_api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatApi for ChatClient {
    async fn post_message(&self, channel_id: &str, content: &str) -> Result<(), ChatError> {
        let token = Credentials::chat_bot_token().ok_or(ChatError::MissingToken)?;
        let url = format!("{}/channels/{channel_id}/messages", self.api_base);
        debug!(channel_id, "posting chat message");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(ChatError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Alert sink adapter
// ---------------------------------------------------------------------------

/// Adapts any [`ChatApi`] into the harness's [`AlertSink`].
pub struct ChatAlertSink(pub Arc<dyn ChatApi>);

#[async_trait]
impl AlertSink for ChatAlertSink {
    async fn post(&self, channel_id: &str, content: &str) -> Result<(), SinkError> {
        self.0
            .post_message(channel_id, content)
            .await
            .map_err(|err| SinkError(err.to_string()))
    }
}

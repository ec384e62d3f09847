use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Liveness probe from the chat platform; answered before any command
    /// logic runs.
    Ping,
    Command,
}

/// A signed command event as delivered by the chat platform. Signature
/// verification happens on the raw body before this is ever parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub command_name: Option<String>,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    #[serde(default)]
    pub requester_id: Option<String>,
    #[serde(default)]
    pub requester_roles: Vec<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Immediate reply sent in the request/response cycle. Long-running
/// commands answer `Ack` and deliver their result as a follow-up chat
/// message once the background work completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EventResponse {
    Pong,
    Ack,
    Message {
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        ephemeral: bool,
    },
}

impl EventResponse {
    pub fn message(content: impl Into<String>) -> Self {
        EventResponse::Message {
            content: content.into(),
            ephemeral: false,
        }
    }

    /// A reply visible only to the requester.
    pub fn ephemeral(content: impl Into<String>) -> Self {
        EventResponse::Message {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// What a fast command handler produces.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub content: String,
    pub ephemeral: bool,
}

impl CommandOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

impl From<CommandOutput> for EventResponse {
    fn from(output: CommandOutput) -> Self {
        EventResponse::Message {
            content: output.content,
            ephemeral: output.ephemeral,
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
    fn ping_event_parses_without_command_fields() {
        let event: InboundEvent = serde_json::from_value(json!({"type": "ping"})).unwrap();
        assert_eq!(event.kind, EventKind::Ping);
        assert!(event.command_name.is_none());
        assert!(event.arguments.is_empty());
    }

    #[test]
    fn command_event_parses_full_shape() {
        let event: InboundEvent = serde_json::from_value(json!({
            "type": "command",
            "command_name": "deploy-client",
            "arguments": {"wait": true},
            "requester_id": "u1",
            "requester_roles": ["ops"],
            "channel_id": "c9"
        }))
        .unwrap();
        assert_eq!(event.kind, EventKind::Command);
        assert_eq!(event.command_name.as_deref(), Some("deploy-client"));
        assert_eq!(event.arguments["wait"], json!(true));
        assert_eq!(event.channel_id.as_deref(), Some("c9"));
    }

    #[test]
    fn responses_serialize_with_type_tag() {
        assert_eq!(
            serde_json::to_value(EventResponse::Pong).unwrap(),
            json!({"type": "pong"})
        );
        assert_eq!(
            serde_json::to_value(EventResponse::Ack).unwrap(),
            json!({"type": "ack"})
        );
        assert_eq!(
            serde_json::to_value(EventResponse::message("done")).unwrap(),
            json!({"type": "message", "content": "done"})
        );
        assert_eq!(
            serde_json::to_value(EventResponse::ephemeral("for you")).unwrap(),
            json!({"type": "message", "content": "for you", "ephemeral": true})
        );
    }
}

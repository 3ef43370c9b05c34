//! Wire messages exchanged over the command/control WebSocket.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{BanEntry, WorldSnapshot};

/// Client → server message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    GetStatus,
    GetWorlds,
    Command { command: String },
}

impl OutboundMessage {
    pub fn command(text: impl Into<String>) -> Self {
        OutboundMessage::Command {
            command: text.into(),
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing these variants cannot fail: only strings and tags.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Payload of a `status_update` message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub cpu_usage: Option<f64>,
    #[serde(default)]
    pub memory_percent: Option<f64>,
    /// Any further fields the host reports (container id, uptime, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Server → client message
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    ContainerOutput {
        output: String,
    },
    CommandResponse {
        #[serde(default)]
        command: Option<String>,
        #[serde(default)]
        output: String,
    },
    StatusUpdate {
        status: StatusPayload,
    },
    WorldsUpdate {
        #[serde(alias = "worlds")]
        output: Vec<WorldSnapshot>,
    },
    BansUpdate {
        #[serde(alias = "bans")]
        output: Vec<BanEntry>,
    },
    Error {
        message: String,
    },
    FocusAck {
        world: usize,
    },
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_poll_requests_have_no_body() {
        // テスト項目: ポーリング要求は type のみの JSON になる
        // given (前提条件):
        let status = OutboundMessage::GetStatus;
        let worlds = OutboundMessage::GetWorlds;

        // when (操作):
        let status_json = status.to_json();
        let worlds_json = worlds.to_json();

        // then (期待する結果):
        assert_eq!(status_json, r#"{"type":"get_status"}"#);
        assert_eq!(worlds_json, r#"{"type":"get_worlds"}"#);
    }

    #[test]
    fn test_outbound_command_carries_text() {
        // テスト項目: コマンドは type と command を持つ JSON になる
        // given (前提条件):
        let message = OutboundMessage::command("kick bob");

        // when (操作):
        let json = message.to_json();

        // then (期待する結果):
        assert_eq!(json, r#"{"type":"command","command":"kick bob"}"#);
    }

    #[test]
    fn test_inbound_status_keeps_extra_fields() {
        // テスト項目: status_update の未定義フィールドは extra に保持される
        // given (前提条件):
        let json = r#"{"type":"status_update","status":{"status":"running","name":"headless","id":"abc","cpu_usage":12.5}}"#;

        // when (操作):
        let message: InboundMessage = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        let InboundMessage::StatusUpdate { status } = message else {
            panic!("expected status update");
        };
        assert_eq!(status.status.as_deref(), Some("running"));
        assert_eq!(status.cpu_usage, Some(12.5));
        assert_eq!(status.extra.get("id"), Some(&Value::String("abc".into())));
    }

    #[test]
    fn test_inbound_unknown_type_is_tolerated() {
        // テスト項目: 未知の type は Unknown として受理される
        // given (前提条件):
        let json = r#"{"type":"future_event","payload":{"x":1}}"#;

        // when (操作):
        let message: InboundMessage = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(message, InboundMessage::Unknown);
    }

    #[test]
    fn test_inbound_command_response_without_command_field() {
        // テスト項目: command フィールドのない command_response も受理される
        // given (前提条件):
        let json = r#"{"type":"command_response","output":"ok"}"#;

        // when (操作):
        let message: InboundMessage = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(
            message,
            InboundMessage::CommandResponse {
                command: None,
                output: "ok".to_string()
            }
        );
    }
}

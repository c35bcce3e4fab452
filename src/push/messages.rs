//! Push Message Types
//!
//! JSON frames exchanged over the push channel, tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sync::{ChangeNotification, RemoteEvent};

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerPush {
    /// Stored data of `username` changed
    DataChanged {
        username: String,
    },
    /// Single/multi-user mode was toggled
    ModeChanged {
        /// Session id of the client that toggled it
        #[serde(default)]
        origin: Option<String>,
    },
    /// Fresh server-side content for one widget
    WidgetData {
        #[serde(rename = "widgetId")]
        widget_id: String,
        #[serde(default)]
        data: Value,
    },
    /// Pong response to ping
    Pong,
    /// Any message type this client does not understand
    #[serde(other)]
    Unknown,
}

impl ServerPush {
    /// Event for the sync engine, if the message carries one
    pub fn into_event(self) -> Option<RemoteEvent> {
        match self {
            ServerPush::DataChanged { username } => {
                Some(RemoteEvent::DataChanged(ChangeNotification {
                    affected_identity: username,
                }))
            }
            ServerPush::ModeChanged { origin } => Some(RemoteEvent::ModeChanged { origin }),
            ServerPush::WidgetData { widget_id, data } => {
                Some(RemoteEvent::WidgetData { widget_id, data })
            }
            ServerPush::Pong | ServerPush::Unknown => None,
        }
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientPush {
    /// Announce the session; sent on connect and whenever the token changes
    Auth {
        token: Option<String>,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    /// Keepalive
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_push_deserialize_data_changed() {
        let json = r#"{"type": "data_changed", "username": "alice"}"#;
        let msg: ServerPush = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg.into_event(),
            Some(RemoteEvent::DataChanged(ChangeNotification {
                affected_identity: "alice".to_string()
            }))
        );
    }

    #[test]
    fn test_server_push_deserialize_widget_data() {
        let json = r#"{"type": "widget_data", "widgetId": "w-1", "data": {"temp": 21}}"#;
        let msg: ServerPush = serde_json::from_str(json).unwrap();
        match msg {
            ServerPush::WidgetData { widget_id, data } => {
                assert_eq!(widget_id, "w-1");
                assert_eq!(data, json!({"temp": 21}));
            }
            _ => panic!("Expected WidgetData"),
        }
    }

    #[test]
    fn test_mode_changed_without_origin() {
        let msg: ServerPush = serde_json::from_str(r#"{"type": "mode_changed"}"#).unwrap();
        assert_eq!(msg, ServerPush::ModeChanged { origin: None });
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let msg: ServerPush = serde_json::from_str(r#"{"type": "server_restarting"}"#).unwrap();
        assert_eq!(msg, ServerPush::Unknown);
        assert_eq!(msg.into_event(), None);

        let pong: ServerPush = serde_json::from_str(r#"{"type": "pong"}"#).unwrap();
        assert_eq!(pong.into_event(), None);
    }

    #[test]
    fn test_client_push_serialize_auth() {
        let msg = ClientPush::Auth {
            token: Some("t-1".to_string()),
            session_id: "s-1".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"auth\""));
        assert!(json.contains("\"token\":\"t-1\""));
        assert!(json.contains("\"sessionId\":\"s-1\""));

        assert_eq!(
            serde_json::to_string(&ClientPush::Ping).unwrap(),
            r#"{"type":"ping"}"#
        );
    }
}

//! Wire format of the status channel.
//!
//! Server to client frames are JSON objects `{ "type": ..., "data": ... }`.
//! Client to server frames are the bare texts `ping` and
//! `get_initial_status`; anything else is ignored.

use crate::server::domain::ServerStatusEvent;
use serde::{Deserialize, Serialize};

/// Reply text for a heartbeat.
pub const PONG: &str = "pong";

/// WebSocket close code sent when the connection ceiling is reached.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// WebSocket close code sent when a connection is evicted or the hub shuts
/// down.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// WebSocket close code sent when the initial snapshot cannot be built.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// JSON message pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StatusMessage {
    /// One server changed status.
    ServerStatus(ServerStatusEvent),
    /// Every server's status, ordered by identifier.
    InitialStatus(Vec<ServerStatusEvent>),
}

impl StatusMessage {
    /// Serialises the message to its JSON text.
    ///
    /// # Errors
    ///
    /// Returns the serialiser error; the message types always serialise.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Text command sent by a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// Heartbeat; answered with [`PONG`].
    Ping,
    /// Request for a fresh [`StatusMessage::InitialStatus`].
    GetInitialStatus,
}

impl ClientCommand {
    /// Parses a client text frame, ignoring surrounding whitespace.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "ping" => Some(Self::Ping),
            "get_initial_status" => Some(Self::GetInitialStatus),
            _ => None,
        }
    }
}

/// Frame queued for delivery to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubFrame {
    /// A text frame.
    Text(String),
    /// A close frame; nothing follows it.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Human-readable reason.
        reason: String,
    },
}

impl HubFrame {
    /// Builds a close frame.
    #[must_use]
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Self::Close {
            code,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::domain::{ServerId, ServerStatus};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn single_event_shape() {
        let started = Utc
            .with_ymd_and_hms(2024, 5, 1, 8, 0, 0)
            .single()
            .expect("valid timestamp");
        let message = StatusMessage::ServerStatus(ServerStatusEvent {
            id: ServerId::new(7),
            status: ServerStatus::Running,
            last_started: Some(started),
        });

        let value: serde_json::Value =
            serde_json::from_str(&message.to_json().expect("message should serialise"))
                .expect("valid json");
        assert_eq!(
            value,
            json!({
                "type": "server_status",
                "data": { "id": 7, "status": "running", "last_started": "2024-05-01T08:00:00Z" }
            })
        );
    }

    #[test]
    fn snapshot_shape() {
        let message = StatusMessage::InitialStatus(vec![ServerStatusEvent {
            id: ServerId::new(1),
            status: ServerStatus::Stopped,
            last_started: None,
        }]);

        let value = serde_json::to_value(&message).expect("message should serialise");
        assert_eq!(
            value,
            json!({
                "type": "initial_status",
                "data": [{ "id": 1, "status": "stopped", "last_started": null }]
            })
        );
    }

    #[rstest]
    #[case("ping", Some(ClientCommand::Ping))]
    #[case(" ping\n", Some(ClientCommand::Ping))]
    #[case("get_initial_status", Some(ClientCommand::GetInitialStatus))]
    #[case("PING", None)]
    #[case("{\"type\":\"ping\"}", None)]
    fn client_commands(#[case] text: &str, #[case] expected: Option<ClientCommand>) {
        assert_eq!(ClientCommand::parse(text), expected);
    }
}

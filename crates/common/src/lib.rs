// ================
// common/src/lib.rs
// ================
//! Common types shared between study-room clients and the server.
//! This module defines the live-channel event protocol and the REST payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Room identifier
pub type RoomId = u64;

/// User identifier
pub type UserId = u64;

/// Label used when a chat or cursor event carries no sender name
pub const ANONYMOUS_LABEL: &str = "Anonymous";

fn anonymous() -> String {
    ANONYMOUS_LABEL.to_string()
}

/// Visibility kind of a room
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    #[default]
    Public,
    Private,
    Course,
}

/// Role a member holds inside a room
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Moderator,
    Participant,
}

/// Events sent from a client over the live channel
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientEvent {
    /// Chat line
    /// # Fields
    /// * `message` - Free text
    /// * `user` - Sender label, defaults to [`ANONYMOUS_LABEL`]
    Chat {
        message: String,
        #[serde(default = "anonymous")]
        user: String,
    },
    /// Whiteboard stroke; `data` is relayed untouched
    Draw { data: Value },
    /// Pointer position
    Cursor {
        x: f64,
        y: f64,
        #[serde(default = "anonymous")]
        user: String,
    },
}

impl ClientEvent {
    /// Stamp the event for relay.
    pub fn into_server_event(self, timestamp: DateTime<Utc>) -> ServerEvent {
        match self {
            ClientEvent::Chat { message, user } => ServerEvent::Chat {
                user,
                message,
                timestamp,
            },
            ClientEvent::Draw { data } => ServerEvent::Draw { data, timestamp },
            ClientEvent::Cursor { x, y, user } => ServerEvent::Cursor {
                user,
                x,
                y,
                timestamp,
            },
        }
    }
}

/// Events sent from the server over the live channel
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Informational notice (arrivals, departures)
    System {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Chat {
        user: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Draw {
        data: Value,
        timestamp: DateTime<Utc>,
    },
    Cursor {
        user: String,
        x: f64,
        y: f64,
        timestamp: DateTime<Utc>,
    },
}

impl ServerEvent {
    pub fn system(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        ServerEvent::System {
            message: message.into(),
            timestamp,
        }
    }

    /// Wire name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::System { .. } => "system",
            ServerEvent::Chat { .. } => "chat",
            ServerEvent::Draw { .. } => "draw",
            ServerEvent::Cursor { .. } => "cursor",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ServerEvent::System { timestamp, .. }
            | ServerEvent::Chat { timestamp, .. }
            | ServerEvent::Draw { timestamp, .. }
            | ServerEvent::Cursor { timestamp, .. } => *timestamp,
        }
    }
}

/// Body of a room creation request
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RoomCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub room_type: RoomKind,
    /// Falls back to the server's configured default when absent
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub settings: Option<Value>,
}

/// Partial room update; absent fields are left untouched
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RoomUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub max_participants: Option<u32>,
    pub settings: Option<Value>,
    pub is_active: Option<bool>,
}

/// Room as returned by the management API
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoomResponse {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub room_type: RoomKind,
    pub owner_id: UserId,
    pub max_participants: u32,
    pub settings: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of memberships at the time of the snapshot
    pub participant_count: usize,
}

/// Membership as returned by the participant listing
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParticipantResponse {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
    /// Display name from the user directory, if the user still exists
    pub username: Option<String>,
}

/// Reply to a join request
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JoinResponse {
    pub message: String,
    pub room_id: RoomId,
}

/// Plain acknowledgement
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

/// Account registration
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Public view of an account
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
}

/// Bearer credential issued on login
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_without_user_defaults_to_anonymous() {
        let event: ClientEvent =
            serde_json::from_value(json!({"type": "chat", "message": "hi"})).unwrap();
        assert_eq!(
            event,
            ClientEvent::Chat {
                message: "hi".to_string(),
                user: ANONYMOUS_LABEL.to_string()
            }
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let parsed = serde_json::from_value::<ClientEvent>(json!({"type": "video", "sdp": "x"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn cursor_requires_coordinates() {
        let parsed = serde_json::from_value::<ClientEvent>(json!({"type": "cursor", "x": 1.0}));
        assert!(parsed.is_err());
    }

    #[test]
    fn outbound_events_carry_type_and_timestamp() {
        let now = Utc::now();
        let event = ClientEvent::Draw {
            data: json!({"points": [[0, 0], [4, 4]]}),
        }
        .into_server_event(now);
        let wire = serde_json::to_value(&event).unwrap();

        assert_eq!(wire["type"], "draw");
        assert_eq!(wire["data"]["points"][1][0], 4);
        assert!(wire["timestamp"].is_string());
        assert_eq!(event.timestamp(), now);
    }

    #[test]
    fn room_kind_uses_lowercase_names() {
        assert_eq!(serde_json::to_value(RoomKind::Course).unwrap(), json!("course"));
        let kind: RoomKind = serde_json::from_value(json!("private")).unwrap();
        assert_eq!(kind, RoomKind::Private);
    }
}

// Notification domain models and the frame format used on push channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const KIND_COMMENT_FLAGGED: &str = "comment_flagged";
pub const KIND_COMMENT_POSTED: &str = "comment_posted";
pub const KIND_COMMENT_STATUS: &str = "comment_status";

/// Addressing rule for a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum RecipientScope {
    User {
        #[serde(rename = "userId")]
        user_id: i64,
    },
    Role {
        role: String,
    },
    Broadcast,
}

impl RecipientScope {
    pub fn kind(&self) -> &'static str {
        match self {
            RecipientScope::User { .. } => "user",
            RecipientScope::Role { .. } => "role",
            RecipientScope::Broadcast => "broadcast",
        }
    }
}

/// The authenticated party reading notifications or holding a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: i64,
    pub role: String,
}

impl Viewer {
    pub fn new(user_id: i64, role: impl Into<String>) -> Self {
        Self {
            user_id,
            role: role.into(),
        }
    }

    pub fn matches(&self, scope: &RecipientScope) -> bool {
        match scope {
            RecipientScope::User { user_id } => *user_id == self.user_id,
            RecipientScope::Role { role } => *role == self.role,
            RecipientScope::Broadcast => true,
        }
    }
}

/// A persisted notification. Only `is_read` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub recipient: RecipientScope,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification about to be written; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub recipient: RecipientScope,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// One message on a push channel.
///
/// Encoded as `{"type":"notification","notification":{..}}` or
/// `{"type":"heartbeat"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    Notification { notification: Notification },
    Heartbeat,
}

impl Frame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Notification {
        Notification {
            id: 11,
            recipient: RecipientScope::Role {
                role: "moderator".into(),
            },
            kind: KIND_COMMENT_FLAGGED.into(),
            title: "Comment awaiting review".into(),
            message: "Spam detected".into(),
            payload: json!({"commentId": 3}),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_viewer_matching() {
        let viewer = Viewer::new(5, "moderator");
        assert!(viewer.matches(&RecipientScope::User { user_id: 5 }));
        assert!(!viewer.matches(&RecipientScope::User { user_id: 6 }));
        assert!(viewer.matches(&RecipientScope::Role {
            role: "moderator".into()
        }));
        assert!(!viewer.matches(&RecipientScope::Role {
            role: "editor".into()
        }));
        assert!(viewer.matches(&RecipientScope::Broadcast));
    }

    #[test]
    fn test_frame_wire_shape() {
        let frame = Frame::Notification {
            notification: sample(),
        };
        let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "notification");
        assert_eq!(value["notification"]["type"], KIND_COMMENT_FLAGGED);
        assert_eq!(value["notification"]["isRead"], false);
        assert_eq!(value["notification"]["recipient"]["scope"], "role");

        assert_eq!(Frame::Heartbeat.encode().unwrap(), r#"{"type":"heartbeat"}"#);
    }

    #[test]
    fn test_frame_decodes_from_wire() {
        let frame = Frame::decode(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(frame, Frame::Heartbeat);
        assert!(Frame::decode(r#"{"type":"presence"}"#).is_err());
    }

    #[test]
    fn test_user_scope_wire_shape() {
        let scope = RecipientScope::User { user_id: 9 };
        let value = serde_json::to_value(&scope).unwrap();
        assert_eq!(value, json!({"scope": "user", "userId": 9}));
    }
}

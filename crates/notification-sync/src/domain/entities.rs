//! Notification entities and identifiers.
//!
//! The wire shape is camelCase JSON as emitted by the platform backend:
//!
//! ```json
//! {"id": 7, "recipientId": 42, "kind": "scout-invite",
//!  "payload": {"projectId": "p-1"}, "isRead": false,
//!  "createdAt": "2024-05-01T09:30:00Z"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Timestamp type used for ordering (`createdAt`).
pub type Timestamp = DateTime<Utc>;

/// Identifier assigned by the remote authority. Immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The member who owns a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub u64);

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification kind tag.
///
/// Unknown tags decode as `Generic` so newer backends do not break older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    /// Invitation to join a project; can be accepted or rejected.
    #[serde(alias = "scout")]
    ScoutInvite,
    /// Someone commented on a tracked item.
    Comment,
    /// A milestone deadline is approaching.
    DeadlineReminder,
    /// Anything else.
    #[serde(other)]
    Generic,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScoutInvite => "scout-invite",
            Self::Comment => "comment",
            Self::DeadlineReminder => "deadline-reminder",
            Self::Generic => "generic",
        }
    }
}

/// A single notification as known to the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    #[serde(alias = "memberId")]
    pub recipient_id: RecipientId,
    #[serde(alias = "type")]
    pub kind: NotificationKind,
    /// Kind-specific data, opaque to the store.
    #[serde(default)]
    pub payload: serde_json::Value,
    pub is_read: bool,
    pub created_at: Timestamp,
}

impl Notification {
    /// Create an unread notification with an empty payload.
    pub fn new(
        id: NotificationId,
        recipient_id: RecipientId,
        kind: NotificationKind,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            recipient_id,
            kind,
            payload: serde_json::Value::Null,
            is_read: false,
            created_at,
        }
    }

    /// Mark as already read.
    pub fn read(mut self) -> Self {
        self.is_read = true;
        self
    }

    pub fn is_scout_invite(&self) -> bool {
        self.kind == NotificationKind::ScoutInvite
    }
}

/// Identity of one authenticated session.
///
/// Two logins of the same member get different epochs, so a stream opened for
/// a previous login is never mistaken for the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId {
    recipient: RecipientId,
    epoch: Uuid,
}

impl SessionId {
    /// Start a new session for a member.
    pub fn new(recipient: RecipientId) -> Self {
        Self {
            recipient,
            epoch: Uuid::new_v4(),
        }
    }

    pub fn recipient(&self) -> RecipientId {
        self.recipient
    }

    pub fn epoch(&self) -> Uuid {
        self.epoch
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member-{}/{}", self.recipient, self.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_wire_shape() {
        let json = r#"{
            "id": 7,
            "recipientId": 42,
            "kind": "scout-invite",
            "payload": {"projectId": "p-1"},
            "isRead": false,
            "createdAt": "2024-05-01T09:30:00Z"
        }"#;

        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.id, NotificationId(7));
        assert_eq!(n.recipient_id, RecipientId(42));
        assert_eq!(n.kind, NotificationKind::ScoutInvite);
        assert_eq!(n.payload["projectId"], "p-1");
        assert!(!n.is_read);
    }

    #[test]
    fn test_unknown_kind_is_generic() {
        let json = r#"{"id":1,"recipientId":1,"kind":"poll-closed","isRead":true,"createdAt":"2024-05-01T09:30:00Z"}"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.kind, NotificationKind::Generic);
        assert!(n.payload.is_null());
    }

    #[test]
    fn test_missing_kind_is_rejected() {
        let json = r#"{"id":1,"recipientId":1,"isRead":true,"createdAt":"2024-05-01T09:30:00Z"}"#;
        assert!(serde_json::from_str::<Notification>(json).is_err());
    }

    #[test]
    fn test_legacy_field_aliases() {
        let json = r#"{"id":3,"memberId":9,"type":"scout","isRead":false,"createdAt":"2024-05-01T09:30:00Z"}"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.recipient_id, RecipientId(9));
        assert!(n.is_scout_invite());
    }

    #[test]
    fn test_session_epochs_differ() {
        let a = SessionId::new(RecipientId(1));
        let b = SessionId::new(RecipientId(1));
        assert_eq!(a.recipient(), b.recipient());
        assert_ne!(a, b);
    }
}

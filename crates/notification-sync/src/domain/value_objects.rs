//! Command outcomes and user-facing notices.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Answer to a scout invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoutResponse {
    Accept,
    Reject,
}

impl ScoutResponse {
    /// Path segment used by the REST interface.
    pub fn as_path(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }
}

/// User commands the dispatcher accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    MarkAsRead,
    MarkAllAsRead,
    DeleteNotification,
    DeleteAllNotifications,
    AcceptScout,
    RejectScout,
}

impl CommandKind {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarkAsRead => "mark_as_read",
            Self::MarkAllAsRead => "mark_all_as_read",
            Self::DeleteNotification => "delete_notification",
            Self::DeleteAllNotifications => "delete_all_notifications",
            Self::AcceptScout => "accept_scout",
            Self::RejectScout => "reject_scout",
        }
    }
}

impl From<ScoutResponse> for CommandKind {
    fn from(response: ScoutResponse) -> Self {
        match response {
            ScoutResponse::Accept => Self::AcceptScout,
            ScoutResponse::Reject => Self::RejectScout,
        }
    }
}

/// Result of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Remote authority confirmed; local state updated.
    Success,
    /// Bulk command where some calls failed.
    Partial { succeeded: usize, failed: usize },
    /// Remote authority refused or could not be reached; local state untouched.
    Failure(String),
    /// Nothing to do (no unread, empty store, not a scout invite).
    Skipped,
    /// The session ended before the command settled.
    Discarded,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial { .. } => "partial",
            Self::Failure(_) => "failure",
            Self::Skipped => "skipped",
            Self::Discarded => "discarded",
        }
    }
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Failure,
}

/// One user-visible message, emitted exactly once per command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub command: CommandKind,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, command: CommandKind, message: impl Into<String>) -> Self {
        Self {
            level,
            command,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Failure => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scout_paths() {
        assert_eq!(ScoutResponse::Accept.as_path(), "accept");
        assert_eq!(ScoutResponse::Reject.as_path(), "reject");
        assert_eq!(CommandKind::from(ScoutResponse::Reject), CommandKind::RejectScout);
    }

    #[test]
    fn test_notice_display() {
        let notice = Notice::new(NoticeLevel::Failure, CommandKind::MarkAsRead, "nope");
        assert_eq!(notice.to_string(), "[error] nope");
    }
}

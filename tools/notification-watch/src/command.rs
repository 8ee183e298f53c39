//! Interactive command parsing.

use notification_sync::NotificationId;
use thiserror::Error;

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Status,
    Read(NotificationId),
    ReadAll,
    Delete(NotificationId),
    DeleteAll,
    Accept(NotificationId),
    Reject(NotificationId),
    Metrics,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("`{0}` needs a notification id")]
    MissingId(&'static str),

    #[error("invalid notification id: {0}")]
    InvalidId(String),
}

pub const HELP: &str = "\
commands:
  list | ls          show notifications, newest first
  status             connection state and unread count
  read <id>          mark one notification read
  read-all           mark every unread notification read
  delete <id>        delete one notification
  delete-all         delete every notification
  accept <id>        accept a scout invitation
  reject <id>        reject a scout invitation
  metrics            dump Prometheus metrics
  quit | exit        end the session";

impl Command {
    /// Parse a prompt line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Ok(None);
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "list" | "ls" => Self::List,
            "status" => Self::Status,
            "read" => Self::Read(parse_id("read", parts.next())?),
            "read-all" => Self::ReadAll,
            "delete" | "rm" => Self::Delete(parse_id("delete", parts.next())?),
            "delete-all" => Self::DeleteAll,
            "accept" => Self::Accept(parse_id("accept", parts.next())?),
            "reject" => Self::Reject(parse_id("reject", parts.next())?),
            "metrics" => Self::Metrics,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn parse_id(verb: &'static str, arg: Option<&str>) -> Result<NotificationId, ParseError> {
    let raw = arg.ok_or(ParseError::MissingId(verb))?;
    raw.parse::<u64>()
        .map(NotificationId)
        .map_err(|_| ParseError::InvalidId(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("ls").unwrap(), Some(Command::List));
        assert_eq!(
            Command::parse("  read 12 ").unwrap(),
            Some(Command::Read(NotificationId(12)))
        );
        assert_eq!(Command::parse("DELETE-ALL").unwrap(), Some(Command::DeleteAll));
        assert_eq!(
            Command::parse("accept 3").unwrap(),
            Some(Command::Accept(NotificationId(3)))
        );
        assert_eq!(Command::parse("").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse("read"), Err(ParseError::MissingId("read")));
        assert_eq!(
            Command::parse("delete abc"),
            Err(ParseError::InvalidId("abc".into()))
        );
        assert!(matches!(
            Command::parse("launch"),
            Err(ParseError::Unknown(_))
        ));
    }
}

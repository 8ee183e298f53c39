//! Push frame decoding.
//!
//! A frame's JSON shape decides the event type:
//!
//! | Payload | Event |
//! |---------|-------|
//! | array of notifications | [`StreamEvent::Snapshot`] |
//! | single notification object | [`StreamEvent::Incremental`] |
//! | empty, whitespace or `null` | heartbeat, nothing to apply |
//!
//! A snapshot with one undecodable item is rejected as a whole: applying a
//! partial snapshot would delete the entries that failed to decode.

use serde_json::Value;

use crate::domain::{DecodeError, Notification, StreamEvent};

/// Decode one text frame.
///
/// Returns `Ok(None)` for heartbeat frames.
pub fn decode_frame(text: &str) -> Result<Option<StreamEvent>, DecodeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    match value {
        Value::Null => Ok(None),
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value::<Notification>)
            .collect::<Result<Vec<_>, _>>()
            .map(|items| Some(StreamEvent::Snapshot(items)))
            .map_err(|e| DecodeError::Shape(e.to_string())),
        Value::Object(_) => serde_json::from_value::<Notification>(value)
            .map(|item| Some(StreamEvent::Incremental(item)))
            .map_err(|e| DecodeError::Shape(e.to_string())),
        Value::Bool(_) => Err(DecodeError::Unexpected("boolean")),
        Value::Number(_) => Err(DecodeError::Unexpected("number")),
        Value::String(_) => Err(DecodeError::Unexpected("string")),
    }
}

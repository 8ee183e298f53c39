//! Push channel connection states.
//!
//! ```text
//!                 connect()
//! [Disconnected] ──────────> [Connecting] ──ok──> [Connected]
//!                                 ^  │                 │
//!                                 │  └──fail──┐  fault │
//!                           delay │           v        v
//!                                 └──── [Reconnecting{attempt, delay}]
//!
//! any state ── disconnect() ──> [Closed]   (terminal)
//! ```

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting {
        attempt: u32,
        delay: Duration,
    },
    Closed,
}

impl ConnectionState {
    /// Whether a connection loop is running for this state.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::Reconnecting { .. }
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Numeric encoding for the connection state gauge.
    pub fn gauge_value(&self) -> f64 {
        match self {
            Self::Disconnected => 0.0,
            Self::Connecting => 1.0,
            Self::Connected => 2.0,
            Self::Reconnecting { .. } => 3.0,
            Self::Closed => 4.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting { attempt, delay } => {
                write!(f, "reconnecting (attempt {attempt}, in {}ms)", delay.as_millis())
            }
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(!ConnectionState::Disconnected.is_active());
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Connected.is_active());
        assert!(ConnectionState::Reconnecting {
            attempt: 1,
            delay: Duration::from_secs(1)
        }
        .is_active());
        assert!(!ConnectionState::Closed.is_active());
    }

    #[test]
    fn test_display_reconnecting() {
        let state = ConnectionState::Reconnecting {
            attempt: 3,
            delay: Duration::from_millis(4_000),
        };
        assert_eq!(state.to_string(), "reconnecting (attempt 3, in 4000ms)");
    }
}

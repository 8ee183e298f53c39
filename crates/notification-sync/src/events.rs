//! # Session Events
//!
//! Everything a presentation layer needs to react to: store changes, newly
//! arrived notifications, command notices and connection state changes.
//!
//! Delivery uses `tokio::sync::broadcast`, so a slow subscriber lags and
//! skips events rather than blocking the session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::{ConnectionState, Notice, Notification};

/// Default per-subscriber buffer.
pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Observable session activity.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Store contents changed; carries the recomputed counters.
    StoreChanged { unread_count: usize, total: usize },
    /// A new notification arrived through the push channel.
    NotificationArrived(Notification),
    /// Outcome of a user command.
    Notice(Notice),
    /// Push channel moved to a new state.
    ConnectionChanged(ConnectionState),
}

/// Fan-out point for [`SessionEvent`]s.
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<SessionEvent>,
    events_published: Arc<AtomicU64>,
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            events_published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns the number of subscribers reached.
    pub fn publish(&self, event: SessionEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("Session event published with no subscribers");
                0
            }
        }
    }

    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

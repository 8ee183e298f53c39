//! Reconciliation worker.
//!
//! Drains decoded events from the stream client and applies them to the
//! session state one at a time, in arrival order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::domain::StreamEvent;

use super::state::SessionState;

/// Run until the event channel closes or the session state is discarded.
pub async fn run_reconciliation(state: Arc<SessionState>, mut events: mpsc::Receiver<StreamEvent>) {
    while let Some(event) = events.recv().await {
        trace!(kind = event.label(), "Reconciling event");
        if state.apply(event).is_none() {
            debug!("Session closed, reconciliation worker stopping");
            return;
        }
    }
    debug!("Event channel closed, reconciliation worker stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Notification, NotificationId, NotificationKind, RecipientId};
    use crate::events::EventHub;
    use chrono::{TimeZone, Utc};

    fn notification(id: u64) -> Notification {
        Notification::new(
            NotificationId(id),
            RecipientId(1),
            NotificationKind::Comment,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, id as u32).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_events_applied_in_order() {
        let state = Arc::new(SessionState::new(RecipientId(1), vec![], EventHub::new()));
        let (tx, rx) = mpsc::channel(8);
        let worker = tokio::spawn(run_reconciliation(state.clone(), rx));

        tx.send(StreamEvent::Incremental(notification(1))).await.unwrap();
        tx.send(StreamEvent::Snapshot(vec![notification(2), notification(3)]))
            .await
            .unwrap();
        tx.send(StreamEvent::Incremental(notification(4))).await.unwrap();
        drop(tx);
        worker.await.unwrap();

        let ids: Vec<u64> = state.snapshot().iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![4, 3, 2]);
    }

    #[tokio::test]
    async fn test_worker_stops_when_state_closed() {
        let state = Arc::new(SessionState::new(RecipientId(1), vec![], EventHub::new()));
        let (tx, rx) = mpsc::channel(8);
        let worker = tokio::spawn(run_reconciliation(state.clone(), rx));

        state.close();
        tx.send(StreamEvent::Incremental(notification(1))).await.unwrap();
        worker.await.unwrap();

        assert!(state.snapshot().is_empty());
    }
}

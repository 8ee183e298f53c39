//! Shared session state.
//!
//! The store and the pending set live behind one lock so reconciliation and
//! command settlement observe each other atomically. The lock is never held
//! across an await point.

use parking_lot::Mutex;
use tracing::{debug, warn};

use notification_telemetry::{FRAMES_DROPPED, RECONCILE_EVENTS, UNREAD_NOTIFICATIONS};

use crate::domain::{
    Notification, NotificationStore, PendingMutations, RecipientId, ReconcileReport, Reconciler,
    StreamEvent,
};
use crate::events::{EventHub, SessionEvent};

/// Store and pending set of a live session.
pub struct StateInner {
    pub store: NotificationStore,
    pub pending: PendingMutations,
}

/// Session-scoped state, shared by the reconciliation worker and the
/// command dispatcher.
///
/// Once closed, every accessor behaves as if the store were empty and
/// mutations are refused.
pub struct SessionState {
    recipient: RecipientId,
    inner: Mutex<Option<StateInner>>,
    events: EventHub,
}

impl SessionState {
    /// Create state seeded with the session's initial notification set.
    ///
    /// Seed items addressed to another member are dropped.
    pub fn new(recipient: RecipientId, seed: Vec<Notification>, events: EventHub) -> Self {
        let mut store = NotificationStore::new(recipient);
        let (own, foreign): (Vec<_>, Vec<_>) =
            seed.into_iter().partition(|n| n.recipient_id == recipient);
        if !foreign.is_empty() {
            warn!(
                dropped = foreign.len(),
                %recipient,
                "Dropping seed notifications for another recipient"
            );
        }
        store.upsert_many(own);
        UNREAD_NOTIFICATIONS.set(store.unread_count() as f64);

        Self {
            recipient,
            inner: Mutex::new(Some(StateInner {
                store,
                pending: PendingMutations::new(),
            })),
            events,
        }
    }

    pub fn recipient(&self) -> RecipientId {
        self.recipient
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_none()
    }

    /// Run `f` against the live state. `None` once the session is closed.
    pub fn with<R>(&self, f: impl FnOnce(&mut StateInner) -> R) -> Option<R> {
        self.inner.lock().as_mut().map(f)
    }

    /// Newest-first view; empty once closed.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.with(|state| state.store.snapshot()).unwrap_or_default()
    }

    pub fn unread_count(&self) -> usize {
        self.with(|state| state.store.unread_count()).unwrap_or(0)
    }

    /// Apply one inbound event and publish the resulting session events.
    pub fn apply(&self, event: StreamEvent) -> Option<ReconcileReport> {
        let label = event.label();
        let arrived = match &event {
            StreamEvent::Incremental(item) => Some(item.clone()),
            StreamEvent::Snapshot(_) => None,
        };

        let report = self.with(|state| Reconciler::apply(&mut state.store, &state.pending, event))?;

        let metric_kind = if report.duplicate { "duplicate" } else { label };
        RECONCILE_EVENTS.with_label_values(&[metric_kind]).inc();
        if report.foreign > 0 {
            FRAMES_DROPPED
                .with_label_values(&["recipient"])
                .inc_by(report.foreign as f64);
        }

        if let Some(item) = arrived {
            if report.inserted.contains(&item.id) {
                self.events.publish(SessionEvent::NotificationArrived(item));
            }
        }
        if report.changed() {
            self.publish_store_changed();
        }

        Some(report)
    }

    /// Publish the recomputed counters.
    pub fn publish_store_changed(&self) {
        let Some((unread_count, total)) =
            self.with(|state| (state.store.unread_count(), state.store.len()))
        else {
            return;
        };

        UNREAD_NOTIFICATIONS.set(unread_count as f64);
        self.events.publish(SessionEvent::StoreChanged {
            unread_count,
            total,
        });
    }

    /// Discard the store and pending set. Idempotent.
    pub fn close(&self) {
        if self.inner.lock().take().is_some() {
            UNREAD_NOTIFICATIONS.set(0.0);
            debug!(recipient = %self.recipient, "Session state discarded");
        }
    }
}

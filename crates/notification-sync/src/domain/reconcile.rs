//! Reconciliation of inbound push events with the local store.
//!
//! ## Rules
//!
//! | Event | Id state | Action |
//! |-------|----------|--------|
//! | Snapshot | listed, not pending | overwrite |
//! | Snapshot | listed, pending | keep local |
//! | Snapshot | absent, not pending | remove |
//! | Snapshot | absent, pending | keep local |
//! | Incremental | already present | ignore (duplicate) |
//! | Incremental | new | insert |
//!
//! Items addressed to another member are dropped from both event types.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::entities::{Notification, NotificationId};
use super::pending::PendingMutations;
use super::store::NotificationStore;

/// A decoded push-channel event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The server's complete current set for the member.
    Snapshot(Vec<Notification>),
    /// One newly created notification.
    Incremental(Notification),
}

impl StreamEvent {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::Incremental(_) => "incremental",
        }
    }
}

/// What a single reconciliation did to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Ids that did not exist before.
    pub inserted: Vec<NotificationId>,
    /// Existing entries whose content changed.
    pub updated: usize,
    /// Entries removed because a snapshot no longer listed them.
    pub removed: usize,
    /// Entries kept because a mutation was in flight.
    pub guarded: usize,
    /// Items dropped for naming a different recipient.
    pub foreign: usize,
    /// The event was an incremental for an id already held.
    pub duplicate: bool,
}

impl ReconcileReport {
    /// Whether the visible store contents changed.
    pub fn changed(&self) -> bool {
        !self.inserted.is_empty() || self.updated > 0 || self.removed > 0
    }
}

/// Stateless reconciliation rules.
pub struct Reconciler;

impl Reconciler {
    /// Apply one event. Events must be applied in arrival order.
    pub fn apply(
        store: &mut NotificationStore,
        pending: &PendingMutations,
        event: StreamEvent,
    ) -> ReconcileReport {
        match event {
            StreamEvent::Snapshot(items) => Self::apply_snapshot(store, pending, items),
            StreamEvent::Incremental(item) => Self::apply_incremental(store, item),
        }
    }

    fn apply_snapshot(
        store: &mut NotificationStore,
        pending: &PendingMutations,
        items: Vec<Notification>,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut listed = HashSet::with_capacity(items.len());

        for item in items {
            if item.recipient_id != store.recipient() {
                warn!(
                    id = %item.id,
                    recipient = %item.recipient_id,
                    expected = %store.recipient(),
                    "Dropping snapshot item for another recipient"
                );
                report.foreign += 1;
                continue;
            }

            listed.insert(item.id);

            if pending.contains(item.id) {
                report.guarded += 1;
                continue;
            }

            match store.upsert_one(item.clone()) {
                None => report.inserted.push(item.id),
                Some(previous) if previous != item => report.updated += 1,
                Some(_) => {}
            }
        }

        for id in store.ids() {
            if listed.contains(&id) {
                continue;
            }
            if pending.contains(id) {
                report.guarded += 1;
                continue;
            }
            store.remove(id);
            report.removed += 1;
        }

        debug!(
            inserted = report.inserted.len(),
            updated = report.updated,
            removed = report.removed,
            guarded = report.guarded,
            "Snapshot reconciled"
        );

        report
    }

    fn apply_incremental(store: &mut NotificationStore, item: Notification) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        if item.recipient_id != store.recipient() {
            warn!(
                id = %item.id,
                recipient = %item.recipient_id,
                expected = %store.recipient(),
                "Dropping notification for another recipient"
            );
            report.foreign = 1;
            return report;
        }

        if store.contains(item.id) {
            debug!(id = %item.id, "Duplicate notification ignored");
            report.duplicate = true;
            return report;
        }

        report.inserted.push(item.id);
        store.upsert_one(item);
        report
    }
}

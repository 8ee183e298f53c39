//! Session-scoped notification store.
//!
//! Holds the authoritative local view of one member's notifications. All
//! operations are total: unknown ids are ignored, never an error.

use std::collections::HashMap;

use super::entities::{Notification, NotificationId, RecipientId};

/// Local notification set keyed by id.
///
/// The unread count is always derived from the entries, never stored.
#[derive(Debug, Clone)]
pub struct NotificationStore {
    recipient: RecipientId,
    entries: HashMap<NotificationId, Notification>,
}

impl NotificationStore {
    /// Create an empty store for a member.
    pub fn new(recipient: RecipientId) -> Self {
        Self {
            recipient,
            entries: HashMap::new(),
        }
    }

    /// The member this store belongs to.
    pub fn recipient(&self) -> RecipientId {
        self.recipient
    }

    /// Insert or overwrite every item. Returns how many entries changed.
    pub fn upsert_many(&mut self, items: impl IntoIterator<Item = Notification>) -> usize {
        let mut changed = 0;
        for item in items {
            let previous = self.entries.insert(item.id, item.clone());
            if previous.as_ref() != Some(&item) {
                changed += 1;
            }
        }
        changed
    }

    /// Insert or overwrite one item, returning the previous version.
    pub fn upsert_one(&mut self, item: Notification) -> Option<Notification> {
        self.entries.insert(item.id, item)
    }

    /// Remove by id. Absent ids are a no-op.
    pub fn remove(&mut self, id: NotificationId) -> Option<Notification> {
        self.entries.remove(&id)
    }

    /// Empty the store. Returns how many entries were removed.
    pub fn remove_all(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    /// Set the read flag.
    ///
    /// Only `false -> true` transitions take effect: a read entry stays read.
    /// Returns whether anything changed.
    pub fn set_read(&mut self, id: NotificationId, value: bool) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) if value && !entry.is_read => {
                entry.is_read = true;
                true
            }
            _ => false,
        }
    }

    /// All entries, newest first (ties broken by descending id).
    pub fn snapshot(&self) -> Vec<Notification> {
        let mut items: Vec<Notification> = self.entries.values().cloned().collect();
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        items
    }

    /// Number of entries with `is_read == false`.
    pub fn unread_count(&self) -> usize {
        self.entries.values().filter(|n| !n.is_read).count()
    }

    /// Ids of unread entries in snapshot order.
    pub fn unread_ids(&self) -> Vec<NotificationId> {
        self.snapshot()
            .into_iter()
            .filter(|n| !n.is_read)
            .map(|n| n.id)
            .collect()
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: NotificationId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Ids currently held, in no particular order.
    pub fn ids(&self) -> Vec<NotificationId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::NotificationKind;
    use chrono::{TimeZone, Utc};

    fn notification(id: u64, minute: u32) -> Notification {
        Notification::new(
            NotificationId(id),
            RecipientId(1),
            NotificationKind::Comment,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap(),
        )
    }

    #[test]
    fn test_snapshot_orders_newest_first() {
        let mut store = NotificationStore::new(RecipientId(1));
        store.upsert_many(vec![notification(1, 0), notification(2, 30), notification(3, 15)]);

        let ids: Vec<u64> = store.snapshot().iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_snapshot_ties_break_on_id() {
        let mut store = NotificationStore::new(RecipientId(1));
        store.upsert_many(vec![notification(4, 10), notification(9, 10)]);

        let ids: Vec<u64> = store.snapshot().iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![9, 4]);
    }

    #[test]
    fn test_upsert_overwrites_by_id() {
        let mut store = NotificationStore::new(RecipientId(1));
        store.upsert_one(notification(1, 0));
        let previous = store.upsert_one(notification(1, 0).read());

        assert!(previous.is_some());
        assert_eq!(store.len(), 1);
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_upsert_many_counts_only_changes() {
        let mut store = NotificationStore::new(RecipientId(1));
        assert_eq!(store.upsert_many(vec![notification(1, 0), notification(2, 0)]), 2);
        assert_eq!(store.upsert_many(vec![notification(1, 0), notification(2, 0).read()]), 1);
    }

    #[test]
    fn test_set_read_is_monotonic() {
        let mut store = NotificationStore::new(RecipientId(1));
        store.upsert_one(notification(1, 0));

        assert!(store.set_read(NotificationId(1), true));
        assert!(!store.set_read(NotificationId(1), true));
        assert!(!store.set_read(NotificationId(1), false));
        assert!(store.get(NotificationId(1)).unwrap().is_read);
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let mut store = NotificationStore::new(RecipientId(1));
        assert!(!store.set_read(NotificationId(99), true));
        assert!(store.remove(NotificationId(99)).is_none());
        assert_eq!(store.remove_all(), 0);
    }

    #[test]
    fn test_unread_count_tracks_entries() {
        let mut store = NotificationStore::new(RecipientId(1));
        store.upsert_many(vec![notification(1, 0), notification(2, 1), notification(3, 2).read()]);
        assert_eq!(store.unread_count(), 2);

        store.remove(NotificationId(1));
        assert_eq!(store.unread_count(), 1);
        assert_eq!(store.unread_ids(), vec![NotificationId(2)]);

        store.remove_all();
        assert_eq!(store.unread_count(), 0);
        assert!(store.is_empty());
    }
}

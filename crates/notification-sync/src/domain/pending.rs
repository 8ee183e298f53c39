//! In-flight mutation tracking.
//!
//! A notification with a mutation in flight is "pending": its local state has
//! not yet been confirmed by the remote authority. Reconciliation must not
//! overwrite it from a snapshot until the mutation settles.
//!
//! ## Two-Phase Flow
//!
//! ```text
//! begin(id) ──> [PENDING] ──> remote call ──> settle(ticket) ──> [SETTLED]
//! ```
//!
//! Several mutations may overlap on one id (for example a mark-as-read
//! followed quickly by a delete). Each gets its own ticket; the id stays
//! pending until every ticket is settled.

use std::collections::HashMap;

use super::entities::NotificationId;

/// The kind of mutation in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    MarkRead,
    Delete,
    ScoutResponse,
}

/// Proof that a mutation was begun. Settle it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationTicket {
    id: NotificationId,
    seq: u64,
    kind: MutationKind,
}

impl MutationTicket {
    pub fn id(&self) -> NotificationId {
        self.id
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }
}

/// Set of notification ids with at least one unsettled mutation.
#[derive(Debug, Default)]
pub struct PendingMutations {
    in_flight: HashMap<NotificationId, Vec<MutationTicket>>,
    next_seq: u64,
}

impl PendingMutations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` pending and hand out a ticket for the mutation.
    pub fn begin(&mut self, id: NotificationId, kind: MutationKind) -> MutationTicket {
        self.next_seq += 1;
        let ticket = MutationTicket {
            id,
            seq: self.next_seq,
            kind,
        };
        self.in_flight.entry(id).or_default().push(ticket);
        ticket
    }

    /// Settle a ticket. Returns `false` if it was unknown or already settled.
    pub fn settle(&mut self, ticket: MutationTicket) -> bool {
        let Some(tickets) = self.in_flight.get_mut(&ticket.id) else {
            return false;
        };

        let before = tickets.len();
        tickets.retain(|t| t.seq != ticket.seq);
        let settled = tickets.len() < before;

        if tickets.is_empty() {
            self.in_flight.remove(&ticket.id);
        }

        settled
    }

    /// Whether any mutation on `id` is still in flight.
    pub fn contains(&self, id: NotificationId) -> bool {
        self.in_flight.contains_key(&id)
    }

    /// Number of distinct pending ids.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_and_settle() {
        let mut pending = PendingMutations::new();
        let ticket = pending.begin(NotificationId(1), MutationKind::MarkRead);

        assert!(pending.contains(NotificationId(1)));
        assert!(pending.settle(ticket));
        assert!(!pending.contains(NotificationId(1)));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_double_settle_is_rejected() {
        let mut pending = PendingMutations::new();
        let ticket = pending.begin(NotificationId(1), MutationKind::Delete);

        assert!(pending.settle(ticket));
        assert!(!pending.settle(ticket));
    }

    #[test]
    fn test_overlapping_mutations_keep_id_pending() {
        let mut pending = PendingMutations::new();
        let read = pending.begin(NotificationId(5), MutationKind::MarkRead);
        let delete = pending.begin(NotificationId(5), MutationKind::Delete);

        assert_eq!(read.kind(), MutationKind::MarkRead);
        assert_eq!(delete.kind(), MutationKind::Delete);
        assert_eq!(pending.len(), 1);

        pending.settle(read);
        assert!(pending.contains(NotificationId(5)));

        pending.settle(delete);
        assert!(!pending.contains(NotificationId(5)));
    }
}

//! Command dispatcher.
//!
//! Every command follows the same shape:
//!
//! 1. Mark the target ids pending (under the state lock)
//! 2. Call the remote authority (lock released)
//! 3. Settle the ticket and, on success only, update the store
//! 4. Publish exactly one notice
//!
//! The store is never updated optimistically. A failed call leaves local state
//! exactly as it was.

use std::sync::Arc;

use tracing::{debug, info, warn};

use notification_telemetry::COMMANDS;

use crate::domain::{
    CommandKind, CommandOutcome, MutationKind, Notice, NoticeLevel, NotificationId, RemoteError,
    ScoutResponse,
};
use crate::events::SessionEvent;
use crate::ports::RemoteAuthority;

use super::state::SessionState;

/// Result of one remote call, after settlement.
enum Settled {
    Applied,
    Rejected(RemoteError),
    /// The session closed while the call was in flight.
    Orphaned,
}

/// Issues user commands against the remote authority and applies confirmed
/// results to the session state.
pub struct CommandDispatcher {
    state: Arc<SessionState>,
    authority: Arc<dyn RemoteAuthority>,
}

impl CommandDispatcher {
    pub fn new(state: Arc<SessionState>, authority: Arc<dyn RemoteAuthority>) -> Self {
        Self { state, authority }
    }

    /// Persist `isRead = true` for one notification.
    ///
    /// An already-read entry is a no-op. An id the store does not hold is
    /// still sent to the authority, which owns id existence.
    pub async fn mark_as_read(&self, id: NotificationId) -> CommandOutcome {
        let command = CommandKind::MarkAsRead;

        let outcome = match self.state.with(|s| s.store.get(id).map(|n| n.is_read)) {
            None => CommandOutcome::Discarded,
            Some(Some(true)) => CommandOutcome::Skipped,
            Some(_) => Self::outcome_of(self.mark_one(id).await),
        };

        self.finish(command, outcome, |outcome| match outcome {
            CommandOutcome::Success => "Notification marked as read".into(),
            CommandOutcome::Skipped => "Notification is already read".into(),
            _ => "Failed to mark notification as read".into(),
        })
    }

    /// Mark every unread notification read, one remote call at a time.
    ///
    /// Per-item failures do not stop the run; a single notice summarises it.
    pub async fn mark_all_as_read(&self) -> CommandOutcome {
        let command = CommandKind::MarkAllAsRead;

        let outcome = match self.state.with(|s| s.store.unread_ids()) {
            None => CommandOutcome::Discarded,
            Some(ids) if ids.is_empty() => CommandOutcome::Skipped,
            Some(ids) => self.mark_sequentially(ids).await,
        };

        self.finish(command, outcome, |outcome| match outcome {
            CommandOutcome::Success => "All notifications marked as read".into(),
            CommandOutcome::Skipped => "No unread notifications".into(),
            CommandOutcome::Partial { succeeded, failed } => format!(
                "Marked {succeeded} of {} notifications as read",
                succeeded + failed
            ),
            _ => "Failed to mark notifications as read".into(),
        })
    }

    /// Delete one notification.
    pub async fn delete_notification(&self, id: NotificationId) -> CommandOutcome {
        let command = CommandKind::DeleteNotification;

        let outcome = match self.state.with(|s| s.store.contains(id)) {
            None => CommandOutcome::Discarded,
            Some(false) => CommandOutcome::Skipped,
            Some(true) => {
                let settled = self
                    .guarded_call(
                        id,
                        MutationKind::Delete,
                        |state| state.store.remove(id).is_some(),
                        async {
                            self.authority
                                .delete_notification(self.state.recipient(), id)
                                .await
                        },
                    )
                    .await;
                Self::outcome_of(settled)
            }
        };

        self.finish(command, outcome, |outcome| match outcome {
            CommandOutcome::Success => "Notification deleted".into(),
            CommandOutcome::Skipped => "Notification no longer exists".into(),
            _ => "Failed to delete notification".into(),
        })
    }

    /// Delete every notification of the member in one remote call.
    ///
    /// On success the whole store is cleared, including entries that arrived
    /// while the call was in flight.
    pub async fn delete_all_notifications(&self) -> CommandOutcome {
        let command = CommandKind::DeleteAllNotifications;

        let begun = self.state.with(|s| {
            s.store
                .ids()
                .into_iter()
                .map(|id| s.pending.begin(id, MutationKind::Delete))
                .collect::<Vec<_>>()
        });

        let outcome = match begun {
            None => CommandOutcome::Discarded,
            Some(tickets) if tickets.is_empty() => CommandOutcome::Skipped,
            Some(tickets) => {
                let result = self
                    .authority
                    .delete_all_notifications(self.state.recipient())
                    .await;

                let settled = self.state.with(|s| {
                    for ticket in &tickets {
                        s.pending.settle(*ticket);
                    }
                    if result.is_ok() {
                        s.store.remove_all();
                    }
                });

                match (settled, result) {
                    (None, _) => CommandOutcome::Discarded,
                    (Some(()), Ok(())) => {
                        self.state.publish_store_changed();
                        CommandOutcome::Success
                    }
                    (Some(()), Err(e)) => CommandOutcome::Failure(e.to_string()),
                }
            }
        };

        self.finish(command, outcome, |outcome| match outcome {
            CommandOutcome::Success => "All notifications deleted".into(),
            CommandOutcome::Skipped => "No notifications to delete".into(),
            _ => "Failed to delete notifications".into(),
        })
    }

    /// Accept a scout invitation.
    pub async fn accept_scout(&self, id: NotificationId) -> CommandOutcome {
        self.respond_to_scout(id, ScoutResponse::Accept).await
    }

    /// Reject a scout invitation.
    pub async fn reject_scout(&self, id: NotificationId) -> CommandOutcome {
        self.respond_to_scout(id, ScoutResponse::Reject).await
    }

    async fn respond_to_scout(&self, id: NotificationId, response: ScoutResponse) -> CommandOutcome {
        let command = CommandKind::from(response);
        let mut failure = "Failed to respond to scout invitation";

        let outcome = match self
            .state
            .with(|s| s.store.get(id).map(|n| n.is_scout_invite()).unwrap_or(false))
        {
            None => CommandOutcome::Discarded,
            Some(false) => {
                failure = "Notification is not a scout invitation";
                CommandOutcome::Failure("not a scout invitation".into())
            }
            Some(true) => {
                let settled = self
                    .guarded_call(
                        id,
                        MutationKind::ScoutResponse,
                        |state| state.store.set_read(id, true),
                        async {
                            self.authority
                                .respond_to_scout(self.state.recipient(), id, response)
                                .await
                        },
                    )
                    .await;
                Self::outcome_of(settled)
            }
        };

        self.finish(command, outcome, |outcome| match (outcome, response) {
            (CommandOutcome::Success, ScoutResponse::Accept) => "Scout invitation accepted".into(),
            (CommandOutcome::Success, ScoutResponse::Reject) => "Scout invitation rejected".into(),
            _ => failure.into(),
        })
    }

    async fn mark_sequentially(&self, ids: Vec<NotificationId>) -> CommandOutcome {
        let mut succeeded = 0;
        let mut failed = 0;

        for id in ids {
            match self.mark_one(id).await {
                Settled::Applied => succeeded += 1,
                Settled::Rejected(e) => {
                    warn!(%id, error = %e, "Mark as read failed during bulk run");
                    failed += 1;
                }
                Settled::Orphaned => return CommandOutcome::Discarded,
            }
        }

        match (succeeded, failed) {
            (_, 0) => CommandOutcome::Success,
            (0, _) => CommandOutcome::Failure(format!("{failed} updates rejected")),
            _ => CommandOutcome::Partial { succeeded, failed },
        }
    }

    async fn mark_one(&self, id: NotificationId) -> Settled {
        self.guarded_call(
            id,
            MutationKind::MarkRead,
            |state| state.store.set_read(id, true),
            async {
                self.authority
                    .set_read_state(self.state.recipient(), id, true)
                    .await
            },
        )
        .await
    }

    /// Run one remote call with `id` pending, applying `on_success` to the
    /// store only once the authority confirms.
    async fn guarded_call<F>(
        &self,
        id: NotificationId,
        kind: MutationKind,
        on_success: impl FnOnce(&mut super::state::StateInner) -> bool,
        call: F,
    ) -> Settled
    where
        F: std::future::Future<Output = Result<(), RemoteError>>,
    {
        let Some(ticket) = self.state.with(|s| s.pending.begin(id, kind)) else {
            return Settled::Orphaned;
        };

        let result = call.await;

        let changed = self.state.with(|s| {
            s.pending.settle(ticket);
            result.is_ok() && on_success(s)
        });
        debug!(%id, kind = ?ticket.kind(), ok = result.is_ok(), "Mutation settled");

        match (changed, result) {
            (None, _) => Settled::Orphaned,
            (Some(changed), Ok(())) => {
                if changed {
                    self.state.publish_store_changed();
                }
                Settled::Applied
            }
            (Some(_), Err(e)) => Settled::Rejected(e),
        }
    }

    fn outcome_of(settled: Settled) -> CommandOutcome {
        match settled {
            Settled::Applied => CommandOutcome::Success,
            Settled::Rejected(e) => CommandOutcome::Failure(e.to_string()),
            Settled::Orphaned => CommandOutcome::Discarded,
        }
    }

    /// Record metrics and publish the single notice for this invocation.
    /// Discarded outcomes publish nothing: the session is gone.
    fn finish(
        &self,
        command: CommandKind,
        outcome: CommandOutcome,
        message: impl FnOnce(&CommandOutcome) -> String,
    ) -> CommandOutcome {
        COMMANDS
            .with_label_values(&[command.as_str(), outcome.as_str()])
            .inc();

        let level = match &outcome {
            CommandOutcome::Success => NoticeLevel::Success,
            CommandOutcome::Skipped => NoticeLevel::Info,
            CommandOutcome::Partial { .. } | CommandOutcome::Failure(_) => NoticeLevel::Failure,
            CommandOutcome::Discarded => {
                debug!(command = command.as_str(), "Command outcome discarded");
                return outcome;
            }
        };

        match &outcome {
            CommandOutcome::Failure(reason) => {
                warn!(command = command.as_str(), %reason, "Command failed")
            }
            _ => info!(command = command.as_str(), outcome = outcome.as_str(), "Command settled"),
        }

        let notice = Notice::new(level, command, message(&outcome));
        self.state.events().publish(SessionEvent::Notice(notice));
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Notification, NotificationKind, RecipientId, StreamEvent};
    use crate::events::EventHub;
    use crate::ports::outbound::{MockAuthority, RemoteCall};
    use chrono::{TimeZone, Utc};
    use tokio::sync::broadcast;

    fn notification(id: u64, kind: NotificationKind) -> Notification {
        Notification::new(
            NotificationId(id),
            RecipientId(1),
            kind,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, id as u32).unwrap(),
        )
    }

    fn comments(ids: &[u64]) -> Vec<Notification> {
        ids.iter()
            .map(|id| notification(*id, NotificationKind::Comment))
            .collect()
    }

    fn setup(
        seed: Vec<Notification>,
        authority: MockAuthority,
    ) -> (
        CommandDispatcher,
        Arc<SessionState>,
        Arc<MockAuthority>,
        broadcast::Receiver<SessionEvent>,
    ) {
        let hub = EventHub::new();
        let events = hub.subscribe();
        let state = Arc::new(SessionState::new(RecipientId(1), seed, hub));
        let authority = Arc::new(authority);
        let dispatcher = CommandDispatcher::new(state.clone(), authority.clone());
        (dispatcher, state, authority, events)
    }

    fn notices(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<Notice> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Notice(notice) = event {
                out.push(notice);
            }
        }
        out
    }

    fn is_read(state: &SessionState, id: u64) -> bool {
        state
            .with(|s| s.store.get(NotificationId(id)).map(|n| n.is_read))
            .flatten()
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_mark_as_read_success() {
        let (dispatcher, state, authority, mut events) =
            setup(comments(&[1, 2]), MockAuthority::new());

        let outcome = dispatcher.mark_as_read(NotificationId(1)).await;

        assert_eq!(outcome, CommandOutcome::Success);
        assert!(is_read(&state, 1));
        assert_eq!(state.unread_count(), 1);
        assert_eq!(authority.calls(), vec![RemoteCall::SetRead(NotificationId(1), true)]);

        let notices = notices(&mut events);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn test_mark_as_read_failure_leaves_state() {
        let (dispatcher, state, _authority, mut events) = setup(
            comments(&[1]),
            MockAuthority::new().failing_for(NotificationId(1)),
        );

        let outcome = dispatcher.mark_as_read(NotificationId(1)).await;

        assert!(matches!(outcome, CommandOutcome::Failure(_)));
        assert!(!is_read(&state, 1));
        assert!(state.with(|s| s.pending.is_empty()).unwrap());
        assert_eq!(notices(&mut events)[0].level, NoticeLevel::Failure);
    }

    #[tokio::test]
    async fn test_mark_as_read_twice_issues_one_call() {
        let (dispatcher, state, authority, mut events) =
            setup(comments(&[1]), MockAuthority::new());

        dispatcher.mark_as_read(NotificationId(1)).await;
        let second = dispatcher.mark_as_read(NotificationId(1)).await;

        assert_eq!(second, CommandOutcome::Skipped);
        assert!(is_read(&state, 1));
        assert_eq!(authority.calls().len(), 1);

        let notices = notices(&mut events);
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[1].level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn test_mark_as_read_unknown_id_reaches_authority() {
        let (dispatcher, state, authority, mut events) =
            setup(comments(&[1]), MockAuthority::new());

        assert_eq!(
            dispatcher.mark_as_read(NotificationId(7)).await,
            CommandOutcome::Success
        );
        assert_eq!(
            authority.calls(),
            vec![RemoteCall::SetRead(NotificationId(7), true)]
        );
        assert_eq!(state.snapshot().len(), 1);
        assert_eq!(state.unread_count(), 1);
        assert!(state.with(|s| s.pending.is_empty()).unwrap());
        assert_eq!(notices(&mut events).len(), 1);
    }

    #[tokio::test]
    async fn test_mark_all_as_read_partial_failure() {
        let (dispatcher, state, authority, mut events) = setup(
            comments(&[1, 2, 3]),
            MockAuthority::new().failing_for(NotificationId(2)),
        );

        let outcome = dispatcher.mark_all_as_read().await;

        assert_eq!(
            outcome,
            CommandOutcome::Partial {
                succeeded: 2,
                failed: 1
            }
        );
        assert!(is_read(&state, 1));
        assert!(!is_read(&state, 2));
        assert!(is_read(&state, 3));
        assert_eq!(state.unread_count(), 1);
        assert_eq!(
            authority.calls(),
            vec![
                RemoteCall::SetRead(NotificationId(3), true),
                RemoteCall::SetRead(NotificationId(2), true),
                RemoteCall::SetRead(NotificationId(1), true),
            ]
        );

        let notices = notices(&mut events);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Failure);
        assert_eq!(notices[0].message, "Marked 2 of 3 notifications as read");
    }

    #[tokio::test]
    async fn test_mark_all_as_read_with_nothing_unread() {
        let (dispatcher, _state, authority, mut events) =
            setup(vec![notification(1, NotificationKind::Comment).read()], MockAuthority::new());

        assert_eq!(dispatcher.mark_all_as_read().await, CommandOutcome::Skipped);
        assert!(authority.calls().is_empty());

        let notices = notices(&mut events);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn test_delete_success_and_failure() {
        let (dispatcher, state, _authority, mut events) = setup(
            comments(&[1, 2]),
            MockAuthority::new().failing_for(NotificationId(2)),
        );

        assert_eq!(
            dispatcher.delete_notification(NotificationId(1)).await,
            CommandOutcome::Success
        );
        assert!(matches!(
            dispatcher.delete_notification(NotificationId(2)).await,
            CommandOutcome::Failure(_)
        ));

        let ids: Vec<u64> = state.snapshot().iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(notices(&mut events).len(), 2);
    }

    #[tokio::test]
    async fn test_delete_all_notifications() {
        let (dispatcher, state, authority, _events) =
            setup(comments(&[1, 2, 3]), MockAuthority::new());

        assert_eq!(
            dispatcher.delete_all_notifications().await,
            CommandOutcome::Success
        );
        assert!(state.snapshot().is_empty());
        assert_eq!(state.unread_count(), 0);
        assert_eq!(authority.calls(), vec![RemoteCall::DeleteAll]);
    }

    #[tokio::test]
    async fn test_delete_all_clears_items_arriving_mid_flight() {
        let (authority, gate) = MockAuthority::new().gated();
        let (dispatcher, state, authority, _events) = setup(comments(&[1]), authority);
        let dispatcher = Arc::new(dispatcher);

        let task = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.delete_all_notifications().await })
        };
        while authority.calls().is_empty() {
            tokio::task::yield_now().await;
        }

        state
            .apply(StreamEvent::Incremental(notification(2, NotificationKind::Comment)))
            .unwrap();
        assert_eq!(state.unread_count(), 2);

        gate.add_permits(1);
        assert_eq!(task.await.unwrap(), CommandOutcome::Success);
        assert!(state.snapshot().is_empty());
        assert_eq!(state.unread_count(), 0);
        assert!(state.with(|s| s.pending.is_empty()).unwrap());
    }

    #[tokio::test]
    async fn test_delete_all_failure_keeps_store() {
        let (dispatcher, state, _authority, mut events) =
            setup(comments(&[1, 2]), MockAuthority::new().failing_bulk());

        assert!(matches!(
            dispatcher.delete_all_notifications().await,
            CommandOutcome::Failure(_)
        ));
        assert_eq!(state.snapshot().len(), 2);
        assert!(state.with(|s| s.pending.is_empty()).unwrap());
        assert_eq!(notices(&mut events)[0].message, "Failed to delete notifications");
    }

    #[tokio::test]
    async fn test_delete_all_on_empty_store_is_info() {
        let (dispatcher, _state, authority, mut events) = setup(vec![], MockAuthority::new());

        assert_eq!(
            dispatcher.delete_all_notifications().await,
            CommandOutcome::Skipped
        );
        assert!(authority.calls().is_empty());
        assert_eq!(notices(&mut events)[0].level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn test_scout_accept_requires_scout_kind() {
        let (dispatcher, state, authority, mut events) = setup(
            vec![
                notification(1, NotificationKind::ScoutInvite),
                notification(2, NotificationKind::Comment),
            ],
            MockAuthority::new(),
        );

        assert_eq!(
            dispatcher.accept_scout(NotificationId(1)).await,
            CommandOutcome::Success
        );
        assert_eq!(
            dispatcher.reject_scout(NotificationId(2)).await,
            CommandOutcome::Failure("not a scout invitation".into())
        );

        assert!(is_read(&state, 1));
        assert_eq!(
            authority.calls(),
            vec![RemoteCall::Scout(NotificationId(1), ScoutResponse::Accept)]
        );
        let notices = notices(&mut events);
        assert_eq!(notices[0].message, "Scout invitation accepted");
        assert_eq!(notices[1].level, NoticeLevel::Failure);
        assert_eq!(notices[1].message, "Notification is not a scout invitation");
    }

    #[tokio::test]
    async fn test_snapshot_during_pending_mark_read() {
        let (authority, gate) = MockAuthority::new().gated();
        let (dispatcher, state, authority, _events) = setup(comments(&[1]), authority);
        let dispatcher = Arc::new(dispatcher);

        let task = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.mark_as_read(NotificationId(1)).await })
        };

        while authority.calls().is_empty() {
            tokio::task::yield_now().await;
        }

        // Snapshot still reports the entry unread while the call is in flight.
        let report = state
            .apply(StreamEvent::Snapshot(comments(&[1])))
            .unwrap();
        assert_eq!(report.guarded, 1);

        gate.add_permits(1);
        assert_eq!(task.await.unwrap(), CommandOutcome::Success);
        assert!(is_read(&state, 1));
        assert_eq!(state.unread_count(), 0);
    }

    #[test]
    fn test_no_local_change_until_authority_confirms() {
        use tokio_test::{assert_pending, assert_ready_eq, task};

        let (authority, gate) = MockAuthority::new().gated();
        let (dispatcher, state, _authority, mut events) = setup(comments(&[1]), authority);

        let mut command = task::spawn(dispatcher.mark_as_read(NotificationId(1)));
        assert_pending!(command.poll());

        assert!(!is_read(&state, 1));
        assert!(state.with(|s| s.pending.contains(NotificationId(1))).unwrap());
        assert!(notices(&mut events).is_empty());

        gate.add_permits(1);
        assert!(command.is_woken());
        assert_ready_eq!(command.poll(), CommandOutcome::Success);
        assert!(is_read(&state, 1));
        assert!(!state.with(|s| s.pending.contains(NotificationId(1))).unwrap());
    }

    #[tokio::test]
    async fn test_session_closed_mid_flight_is_discarded() {
        let (authority, gate) = MockAuthority::new().gated();
        let (dispatcher, state, authority, mut events) = setup(comments(&[1]), authority);
        let dispatcher = Arc::new(dispatcher);

        let task = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.delete_notification(NotificationId(1)).await })
        };
        while authority.calls().is_empty() {
            tokio::task::yield_now().await;
        }

        state.close();
        gate.add_permits(1);

        assert_eq!(task.await.unwrap(), CommandOutcome::Discarded);
        assert!(notices(&mut events).is_empty());
    }
}

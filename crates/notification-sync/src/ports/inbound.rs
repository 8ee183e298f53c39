//! Inbound port: the API a presentation layer drives.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{CommandOutcome, ConnectionState, Notification, NotificationId};
use crate::events::SessionEvent;

/// Read and command surface of one notification session.
///
/// Reads are synchronous views of the local store. Commands resolve once the
/// remote authority has answered and emit exactly one
/// [`SessionEvent::Notice`].
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Newest-first view of the store.
    fn notifications(&self) -> Vec<Notification>;

    /// Live unread counter.
    fn unread_count(&self) -> usize;

    /// Current push channel state.
    fn connection_state(&self) -> ConnectionState;

    /// Subscribe to session events.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    async fn mark_as_read(&self, id: NotificationId) -> CommandOutcome;

    async fn mark_all_as_read(&self) -> CommandOutcome;

    async fn delete_notification(&self, id: NotificationId) -> CommandOutcome;

    async fn delete_all_notifications(&self) -> CommandOutcome;

    async fn accept_scout(&self, id: NotificationId) -> CommandOutcome;

    async fn reject_scout(&self, id: NotificationId) -> CommandOutcome;
}

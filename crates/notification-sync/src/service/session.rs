//! Notification session.
//!
//! Wires one authenticated member's store, reconciliation worker, push
//! channel and command dispatcher together. Dropping or shutting down the
//! session closes the channel, cancels any pending reconnect and discards
//! the store.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use crate::adapters::{transport_from_config, HttpAuthority};
use crate::domain::{
    CommandOutcome, ConfigError, ConnectionState, Notification, NotificationId, RemoteError,
    SessionId, StreamClientError, SyncConfig, TransportError,
};
use crate::events::{EventHub, SessionEvent};
use crate::ports::{NotificationApi, PushTransport, RemoteAuthority};

use super::dispatcher::CommandDispatcher;
use super::reconcile_worker::run_reconciliation;
use super::state::SessionState;
use super::stream_client::EventStreamClient;

/// Errors starting a session from configuration.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build REST client: {0}")]
    Remote(#[from] RemoteError),

    #[error("failed to build push transport: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Stream(#[from] StreamClientError),
}

/// A live notification session for one member.
pub struct NotificationSession {
    id: SessionId,
    state: Arc<SessionState>,
    dispatcher: CommandDispatcher,
    stream: Mutex<EventStreamClient>,
    worker: JoinHandle<()>,
}

impl NotificationSession {
    /// Start a session with explicit adapters.
    ///
    /// The store is seeded from `seed` and the push channel is opened
    /// immediately. Must be called inside a Tokio runtime.
    pub fn start(
        config: &SyncConfig,
        id: SessionId,
        seed: Vec<Notification>,
        authority: Arc<dyn RemoteAuthority>,
        transport: Arc<dyn PushTransport>,
    ) -> Result<Self, SessionError> {
        let events = EventHub::with_capacity(config.subscriber_capacity);
        let state = Arc::new(SessionState::new(id.recipient(), seed, events.clone()));

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let worker = tokio::spawn(run_reconciliation(state.clone(), event_rx));

        let mut stream =
            EventStreamClient::new(transport, config.reconnect.clone(), event_tx, events);
        stream.connect(&id)?;

        info!(session = %id, "Notification session started");

        Ok(Self {
            id,
            dispatcher: CommandDispatcher::new(state.clone(), authority),
            state,
            stream: Mutex::new(stream),
            worker,
        })
    }

    /// Validate `config`, build the HTTP adapters it selects and start.
    pub fn from_config(
        config: &SyncConfig,
        id: SessionId,
        seed: Vec<Notification>,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let authority: Arc<dyn RemoteAuthority> = Arc::new(HttpAuthority::new(
            config.api_base_url.clone(),
            config.request_timeout(),
            config.auth_token.clone(),
        )?);
        let transport = transport_from_config(config)?;

        Self::start(config, id, seed, authority, transport)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Watch push channel state changes.
    pub fn watch_connection(&self) -> tokio::sync::watch::Receiver<ConnectionState> {
        self.stream.lock().watch_state()
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// End the session. Idempotent.
    ///
    /// Commands still in flight resolve as [`CommandOutcome::Discarded`].
    pub fn shutdown(&self) {
        if self.state.is_closed() {
            return;
        }
        self.stream.lock().disconnect();
        self.worker.abort();
        self.state.close();
        info!(session = %self.id, "Notification session ended");
    }
}

impl Drop for NotificationSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl NotificationApi for NotificationSession {
    fn notifications(&self) -> Vec<Notification> {
        self.state.snapshot()
    }

    fn unread_count(&self) -> usize {
        self.state.unread_count()
    }

    fn connection_state(&self) -> ConnectionState {
        self.stream.lock().state()
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.state.events().subscribe()
    }

    async fn mark_as_read(&self, id: NotificationId) -> CommandOutcome {
        self.dispatcher.mark_as_read(id).await
    }

    async fn mark_all_as_read(&self) -> CommandOutcome {
        self.dispatcher.mark_all_as_read().await
    }

    async fn delete_notification(&self, id: NotificationId) -> CommandOutcome {
        self.dispatcher.delete_notification(id).await
    }

    async fn delete_all_notifications(&self) -> CommandOutcome {
        self.dispatcher.delete_all_notifications().await
    }

    async fn accept_scout(&self, id: NotificationId) -> CommandOutcome {
        self.dispatcher.accept_scout(id).await
    }

    async fn reject_scout(&self, id: NotificationId) -> CommandOutcome {
        self.dispatcher.reject_scout(id).await
    }
}

//! Event stream client.
//!
//! Owns the push channel for one session: opens it, decodes frames into
//! [`StreamEvent`]s, forwards them in order, and reconnects with backoff
//! after any transport fault.
//!
//! ## Connection Loop
//!
//! ```text
//! loop {
//!     Connecting ── open() ──ok──> Connected ── frames ──> decode ──> forward
//!         │                             │
//!         │ fail                        │ stream error / remote close
//!         v                             v
//!     Reconnecting{attempt, delay} <────┘
//!         │ sleep(delay) or shutdown
//!         └──> Connecting
//! }
//! ```
//!
//! There is no retry limit: the loop runs until `disconnect()` or until the
//! consumer of decoded events goes away.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use notification_telemetry::{CONNECTION_STATE, FRAMES_DROPPED, FRAMES_RECEIVED, RECONNECT_ATTEMPTS};

use crate::adapters::decode_frame;
use crate::domain::{
    ConnectionState, ReconnectBackoff, ReconnectConfig, SessionId, StreamClientError, StreamEvent,
    TransportError,
};
use crate::events::{EventHub, SessionEvent};
use crate::ports::PushTransport;

/// Connection state shared between the client handle and its loop task.
///
/// Each loop carries the generation it was started with; transitions from a
/// superseded loop are ignored, and nothing leaves `Closed`.
struct ConnectionCell {
    state: watch::Sender<ConnectionState>,
    generation: AtomicU64,
    events: EventHub,
}

impl ConnectionCell {
    fn transition(&self, generation: u64, next: ConnectionState) -> bool {
        let applied = self.state.send_if_modified(|current| {
            if current.is_closed() || self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if applied {
            self.announce(next);
        }
        applied
    }

    /// Unconditional transition used by the client handle itself.
    fn force(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            self.announce(next);
        }
    }

    fn announce(&self, state: ConnectionState) {
        CONNECTION_STATE.set(state.gauge_value());
        self.events.publish(SessionEvent::ConnectionChanged(state));
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

struct RunningLoop {
    session: SessionId,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// How a single connection attempt ended.
enum ConnectionEnd {
    /// Open failed or the established stream broke.
    Fault(TransportError),
    /// Remote side ended the stream.
    RemoteClosed,
    /// Nobody is consuming decoded events any more.
    ConsumerGone,
}

/// Push channel client for one session at a time.
pub struct EventStreamClient {
    transport: Arc<dyn PushTransport>,
    reconnect: ReconnectConfig,
    event_tx: mpsc::Sender<StreamEvent>,
    cell: Arc<ConnectionCell>,
    running: Option<RunningLoop>,
}

impl EventStreamClient {
    /// Create a disconnected client.
    ///
    /// Decoded events are sent to `event_tx`; every state change is also
    /// published on `events` as [`SessionEvent::ConnectionChanged`].
    pub fn new(
        transport: Arc<dyn PushTransport>,
        reconnect: ReconnectConfig,
        event_tx: mpsc::Sender<StreamEvent>,
        events: EventHub,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            reconnect,
            event_tx,
            cell: Arc::new(ConnectionCell {
                state,
                generation: AtomicU64::new(0),
                events,
            }),
            running: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.cell.current()
    }

    /// Watch connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.cell.state.subscribe()
    }

    /// Start consuming the push channel for `session`.
    ///
    /// A no-op while a loop for the same session is running. A different
    /// session replaces the running loop. Must be called inside a Tokio
    /// runtime.
    pub fn connect(&mut self, session: &SessionId) -> Result<(), StreamClientError> {
        if self.cell.current().is_closed() {
            return Err(StreamClientError::Closed);
        }

        if let Some(running) = &self.running {
            if running.session == *session && !running.handle.is_finished() {
                debug!(session = %session, "Already connected, ignoring connect");
                return Ok(());
            }
            info!(
                previous = %running.session,
                next = %session,
                "Replacing push channel for new session"
            );
        }
        self.stop_running();

        let generation = self.cell.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.cell.force(ConnectionState::Connecting);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(Self::connection_loop(
            LoopContext {
                session: *session,
                generation,
                transport: self.transport.clone(),
                event_tx: self.event_tx.clone(),
                cell: self.cell.clone(),
            },
            ReconnectBackoff::new(self.reconnect.clone()),
            shutdown_rx,
        ));

        self.running = Some(RunningLoop {
            session: *session,
            shutdown_tx,
            handle,
        });
        Ok(())
    }

    /// Tear down the channel and cancel any pending reconnect. Terminal and
    /// idempotent: once closed, the client cannot connect again.
    pub fn disconnect(&mut self) {
        if self.cell.current().is_closed() {
            debug!("Stream client already closed");
            return;
        }
        self.cell.generation.fetch_add(1, Ordering::SeqCst);
        self.stop_running();
        self.cell.force(ConnectionState::Closed);
        info!("Push channel closed");
    }

    fn stop_running(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown_tx.send(true);
            running.handle.abort();
        }
    }

    async fn connection_loop(
        ctx: LoopContext,
        mut backoff: ReconnectBackoff,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            ctx.cell.transition(ctx.generation, ConnectionState::Connecting);

            let end = tokio::select! {
                _ = shutdown_rx.changed() => return,
                end = Self::run_connection(&ctx, &mut backoff) => end,
            };

            match end {
                ConnectionEnd::ConsumerGone => {
                    debug!(session = %ctx.session, "Event consumer gone, stopping push channel");
                    ctx.cell.transition(ctx.generation, ConnectionState::Disconnected);
                    return;
                }
                ConnectionEnd::Fault(e) => {
                    warn!(session = %ctx.session, error = %e, "Push channel fault");
                }
                ConnectionEnd::RemoteClosed => {
                    info!(session = %ctx.session, "Push channel closed by remote");
                }
            }

            let delay = backoff.next_delay();
            let attempt = backoff.attempt();
            RECONNECT_ATTEMPTS.inc();
            ctx.cell.transition(
                ctx.generation,
                ConnectionState::Reconnecting { attempt, delay },
            );
            debug!(
                session = %ctx.session,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnect"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.changed() => return,
            }
        }
    }

    async fn run_connection(ctx: &LoopContext, backoff: &mut ReconnectBackoff) -> ConnectionEnd {
        let mut frames = match ctx.transport.open(&ctx.session).await {
            Ok(frames) => frames,
            Err(e) => return ConnectionEnd::Fault(e),
        };

        backoff.reset();
        ctx.cell.transition(ctx.generation, ConnectionState::Connected);
        info!(session = %ctx.session, "Push channel connected");

        while let Some(frame) = frames.next().await {
            let text = match frame {
                Ok(text) => text,
                Err(e) => return ConnectionEnd::Fault(e),
            };
            FRAMES_RECEIVED.inc();

            match decode_frame(&text) {
                Ok(Some(event)) => {
                    if ctx.event_tx.send(event).await.is_err() {
                        return ConnectionEnd::ConsumerGone;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    FRAMES_DROPPED.with_label_values(&[e.reason()]).inc();
                    warn!(session = %ctx.session, error = %e, "Dropping undecodable frame");
                }
            }
        }

        ConnectionEnd::RemoteClosed
    }
}

impl Drop for EventStreamClient {
    fn drop(&mut self) {
        self.stop_running();
    }
}

struct LoopContext {
    session: SessionId,
    generation: u64,
    transport: Arc<dyn PushTransport>,
    event_tx: mpsc::Sender<StreamEvent>,
    cell: Arc<ConnectionCell>,
}

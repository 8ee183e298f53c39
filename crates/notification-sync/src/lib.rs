//! # Notification Sync
//!
//! Keeps a member's notification list current while they are signed in.
//!
//! ## Purpose
//!
//! Consumes a server push channel, reconciles what it delivers with a local
//! store, and routes user commands (mark read, delete, answer a scout
//! invitation) to the remote authority. Local state changes only after the
//! authority confirms.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | At most one entry per id | `domain/store.rs` - `HashMap` keyed by id |
//! | Unread count is derived, never stored | `domain/store.rs` - `unread_count()` |
//! | Snapshots never clobber pending entries | `domain/reconcile.rs` - `apply_snapshot()` |
//! | Incremental duplicates are ignored | `domain/reconcile.rs` - `apply_incremental()` |
//! | No optimistic updates | `service/dispatcher.rs` - `guarded_call()` |
//! | Reconnect delays never decrease before a success | `domain/backoff.rs` |
//! | One push channel per session | `service/stream_client.rs` - `connect()` |
//!
//! ## Data Flow
//!
//! ```text
//!  push channel ──frames──> EventStreamClient ──StreamEvent──> reconcile worker
//!                                 │                                 │
//!                          ConnectionChanged                    SessionState
//!                                 │                          (store + pending)
//!                                 v                                 ^
//!                            EventHub <──── Notice ──── CommandDispatcher
//!                                 │                                 │
//!                          subscribers                       RemoteAuthority
//! ```
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/ - HTTP authority, SSE and WebSocket transports,     │
//! │              frame codec                                       │
//! │  service/  - session, stream client, dispatcher, worker        │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - NotificationApi trait                     │
//! │  ports/outbound.rs - RemoteAuthority, PushTransport traits     │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/store.rs     - NotificationStore                       │
//! │  domain/pending.rs   - PendingMutations (ticketed)             │
//! │  domain/reconcile.rs - Reconciler rules                        │
//! │  domain/backoff.rs   - ReconnectBackoff                        │
//! │  domain/config.rs    - SyncConfig                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notification_sync::{NotificationApi, NotificationSession, RecipientId, SessionId, SyncConfig};
//!
//! let config = SyncConfig::from_env();
//! let session = NotificationSession::from_config(&config, SessionId::new(RecipientId(42)), vec![])?;
//!
//! let mut events = session.subscribe();
//! session.mark_all_as_read().await;
//! ```

pub mod adapters;
pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

pub use domain::{
    CommandKind, CommandOutcome, ConfigError, ConnectionState, DecodeError, Notice, NoticeLevel,
    Notification, NotificationId, NotificationKind, NotificationStore, ReconnectConfig,
    RecipientId, RemoteError, ScoutResponse, SessionId, StreamClientError, StreamEvent,
    SyncConfig, TransportError, TransportKind,
};
pub use events::{EventHub, SessionEvent};
pub use ports::{FrameStream, NotificationApi, PushTransport, RemoteAuthority};
pub use service::{EventStreamClient, NotificationSession, SessionError};

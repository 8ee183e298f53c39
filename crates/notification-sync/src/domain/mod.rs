//! Domain layer: entities, store, reconciliation rules and policies.
//!
//! Nothing here performs I/O or spawns tasks.

pub mod backoff;
pub mod config;
pub mod connection;
pub mod entities;
pub mod errors;
pub mod pending;
pub mod reconcile;
pub mod store;
pub mod value_objects;

pub use backoff::ReconnectBackoff;
pub use config::{render_member_url, ConfigError, ReconnectConfig, SyncConfig, TransportKind};
pub use connection::ConnectionState;
pub use entities::{
    Notification, NotificationId, NotificationKind, RecipientId, SessionId, Timestamp,
};
pub use errors::{DecodeError, RemoteError, StreamClientError, TransportError};
pub use pending::{MutationKind, MutationTicket, PendingMutations};
pub use reconcile::{ReconcileReport, Reconciler, StreamEvent};
pub use store::NotificationStore;
pub use value_objects::{CommandKind, CommandOutcome, Notice, NoticeLevel, ScoutResponse};

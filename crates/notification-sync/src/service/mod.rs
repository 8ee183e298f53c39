//! Service layer: tasks and handles that drive the domain.

pub mod dispatcher;
pub mod reconcile_worker;
pub mod session;
pub mod state;
pub mod stream_client;

pub use dispatcher::CommandDispatcher;
pub use reconcile_worker::run_reconciliation;
pub use session::{NotificationSession, SessionError};
pub use state::{SessionState, StateInner};
pub use stream_client::EventStreamClient;

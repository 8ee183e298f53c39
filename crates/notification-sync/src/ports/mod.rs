//! Ports (hexagonal architecture interfaces).

pub mod inbound;
pub mod outbound;

pub use inbound::NotificationApi;
pub use outbound::{FrameStream, PushTransport, RemoteAuthority};

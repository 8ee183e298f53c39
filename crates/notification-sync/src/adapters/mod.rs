//! Adapters: concrete implementations of the outbound ports plus the frame
//! codec shared by every push transport.

pub mod codec;
pub mod rest;
pub mod sse;
pub mod websocket;

use std::sync::Arc;

use crate::domain::{SyncConfig, TransportError, TransportKind};
use crate::ports::PushTransport;

pub use codec::decode_frame;
pub use rest::HttpAuthority;
pub use sse::{SseDecoder, SseTransport};
pub use websocket::WebSocketTransport;

/// Build the push transport selected by configuration.
pub fn transport_from_config(config: &SyncConfig) -> Result<Arc<dyn PushTransport>, TransportError> {
    let transport: Arc<dyn PushTransport> = match config.transport {
        TransportKind::Sse => Arc::new(SseTransport::new(
            config.stream_url.clone(),
            config.request_timeout(),
            config.auth_token.clone(),
        )?),
        TransportKind::WebSocket => Arc::new(WebSocketTransport::new(
            config.stream_url.clone(),
            config.auth_token.clone(),
        )),
    };
    Ok(transport)
}

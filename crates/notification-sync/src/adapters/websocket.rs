//! WebSocket push transport.
//!
//! Each text frame carries one JSON payload, same as an SSE `data` block.
//! Binary frames are accepted when they hold UTF-8; anything else is dropped
//! and the connection stays up. Ping/pong is answered by tungstenite while the
//! stream is polled.

use async_trait::async_trait;
use futures_util::{future, Stream, StreamExt};
use notification_telemetry::FRAMES_DROPPED;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::domain::{render_member_url, SessionId, TransportError};
use crate::ports::{FrameStream, PushTransport};

/// WebSocket transport over tokio-tungstenite.
pub struct WebSocketTransport {
    url_template: String,
    auth_token: Option<String>,
}

impl WebSocketTransport {
    pub fn new(url_template: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            url_template: url_template.into(),
            auth_token,
        }
    }
}

#[async_trait]
impl PushTransport for WebSocketTransport {
    async fn open(&self, session: &SessionId) -> Result<FrameStream, TransportError> {
        let url = render_member_url(&self.url_template, session.recipient());
        debug!(%url, session = %session, "Opening WebSocket stream");

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(payloads(ws_stream).boxed())
    }
}

/// Text payloads of a WebSocket message stream, up to the first Close.
fn payloads<S>(messages: S) -> impl Stream<Item = Result<String, TransportError>>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>,
{
    messages
        .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(|msg| future::ready(frame_text(msg)))
}

fn frame_text(
    msg: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<String, TransportError>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(text.to_string())),
        Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(Ok(text)),
            Err(e) => {
                FRAMES_DROPPED.with_label_values(&["encoding"]).inc();
                warn!(error = %e, "Dropping binary frame that is not UTF-8");
                None
            }
        },
        Ok(_) => None,
        Err(e) => Some(Err(TransportError::Stream(e.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frames_pass_through() {
        let msg = Ok(Message::Text(String::from("{\"id\":1}").into()));
        assert_eq!(frame_text(msg), Some(Ok("{\"id\":1}".to_string())));
    }

    #[test]
    fn test_control_frames_skipped() {
        assert_eq!(frame_text(Ok(Message::Ping(Vec::new().into()))), None);
        assert_eq!(frame_text(Ok(Message::Pong(Vec::new().into()))), None);
    }

    #[test]
    fn test_invalid_binary_is_dropped() {
        let msg = Ok(Message::Binary(vec![0xff, 0xfe].into()));
        assert_eq!(frame_text(msg), None);
    }

    #[test]
    fn test_valid_binary_is_payload() {
        let msg = Ok(Message::Binary(b"[]".to_vec().into()));
        assert_eq!(frame_text(msg), Some(Ok("[]".to_string())));
    }

    #[tokio::test]
    async fn test_bad_binary_does_not_end_the_connection() {
        let messages = futures_util::stream::iter(vec![
            Ok(Message::Binary(vec![0xff, 0xfe].into())),
            Ok(Message::Text(String::from("{\"id\":2}").into())),
            Ok(Message::Close(None)),
            Ok(Message::Text(String::from("{\"id\":3}").into())),
        ]);

        let frames: Vec<_> = payloads(messages).collect().await;
        assert_eq!(frames, vec![Ok("{\"id\":2}".to_string())]);
    }
}

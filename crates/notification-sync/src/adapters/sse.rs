//! Server-sent events transport.
//!
//! ## Framing
//!
//! ```text
//! : keep-alive            <- comment, ignored
//! event: notification     <- ignored
//! data: {"id":1,          <- data lines are joined with '\n'
//! data:  ...}
//!                         <- blank line dispatches the frame
//! ```
//!
//! Lines may end in `\n` or `\r\n`. Only the `data` field matters; `event`,
//! `id` and `retry` are ignored since reconnect timing is owned by the client.

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::domain::{render_member_url, SessionId, TransportError};
use crate::ports::{FrameStream, PushTransport};

/// Longest line or pending event the decoder will buffer.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Incremental SSE line parser.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    partial: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every frame completed by it.
    ///
    /// Fails once an unterminated line or an undispatched event grows past
    /// [`MAX_FRAME_BYTES`]; the buffered input is discarded.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, TransportError> {
        self.partial.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.partial.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        let buffered = self.partial.len() + self.data.iter().map(String::len).sum::<usize>();
        if buffered > MAX_FRAME_BYTES {
            self.partial.clear();
            self.data.clear();
            return Err(TransportError::Stream(format!(
                "event exceeds {MAX_FRAME_BYTES} bytes"
            )));
        }
        Ok(frames)
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let frame = self.data.join("\n");
            self.data.clear();
            return Some(frame);
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}

/// SSE push transport over reqwest.
pub struct SseTransport {
    client: Client,
    url_template: String,
    auth_token: Option<String>,
}

impl SseTransport {
    /// Create a transport for a `{member}` URL template.
    ///
    /// Only the connect phase is time-limited; the stream itself is long-lived.
    pub fn new(
        url_template: impl Into<String>,
        connect_timeout: Duration,
        auth_token: Option<String>,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            url_template: url_template.into(),
            auth_token,
        })
    }
}

#[async_trait]
impl PushTransport for SseTransport {
    async fn open(&self, session: &SessionId) -> Result<FrameStream, TransportError> {
        let url = render_member_url(&self.url_template, session.recipient());
        debug!(%url, session = %session, "Opening SSE stream");

        let mut request = self
            .client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let mut decoder = SseDecoder::new();
        let frames = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => match decoder.push(&bytes) {
                    Ok(frames) => frames.into_iter().map(Ok).collect::<Vec<_>>(),
                    Err(e) => vec![Err(e)],
                },
                Err(e) => vec![Err(TransportError::Stream(e.to_string()))],
            })
            .flat_map(stream::iter);

        Ok(frames.boxed())
    }
}

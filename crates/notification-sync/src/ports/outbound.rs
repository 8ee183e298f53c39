//! Outbound ports: what the session needs from the outside world.
//!
//! - [`RemoteAuthority`]: the REST interface that owns notification state.
//! - [`PushTransport`]: a long-lived channel delivering raw text frames.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::domain::{
    NotificationId, RecipientId, RemoteError, ScoutResponse, SessionId, TransportError,
};

/// Raw text frames from an open push channel. The stream ending means the
/// remote side closed the connection.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Server-side source of truth for notification state.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Persist the read flag of one notification.
    async fn set_read_state(
        &self,
        recipient: RecipientId,
        id: NotificationId,
        is_read: bool,
    ) -> Result<(), RemoteError>;

    /// Delete one notification.
    async fn delete_notification(
        &self,
        recipient: RecipientId,
        id: NotificationId,
    ) -> Result<(), RemoteError>;

    /// Delete every notification of the member.
    async fn delete_all_notifications(&self, recipient: RecipientId) -> Result<(), RemoteError>;

    /// Accept or reject a scout invitation.
    async fn respond_to_scout(
        &self,
        recipient: RecipientId,
        id: NotificationId,
        response: ScoutResponse,
    ) -> Result<(), RemoteError>;
}

/// Opens push channels.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Open a channel for the session's member.
    async fn open(&self, session: &SessionId) -> Result<FrameStream, TransportError>;
}

// =============================================================================
// TEST DOUBLES
// =============================================================================

/// Recorded call against [`MockAuthority`].
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    SetRead(NotificationId, bool),
    Delete(NotificationId),
    DeleteAll,
    Scout(NotificationId, ScoutResponse),
}

/// In-memory authority with scripted failures and an optional gate that holds
/// every call until the test releases a permit.
#[cfg(test)]
pub struct MockAuthority {
    calls: parking_lot::Mutex<Vec<RemoteCall>>,
    failing: std::collections::HashSet<NotificationId>,
    fail_bulk: bool,
    gate: Option<std::sync::Arc<tokio::sync::Semaphore>>,
}

#[cfg(test)]
impl MockAuthority {
    pub fn new() -> Self {
        Self {
            calls: parking_lot::Mutex::new(Vec::new()),
            failing: std::collections::HashSet::new(),
            fail_bulk: false,
            gate: None,
        }
    }

    /// Calls block until a permit is added to the returned semaphore.
    pub fn gated(mut self) -> (Self, std::sync::Arc<tokio::sync::Semaphore>) {
        let gate = std::sync::Arc::new(tokio::sync::Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    /// Every call naming `id` fails with status 500.
    pub fn failing_for(mut self, id: NotificationId) -> Self {
        self.failing.insert(id);
        self
    }

    /// Delete-all fails with status 500.
    pub fn failing_bulk(mut self) -> Self {
        self.fail_bulk = true;
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    async fn record(&self, call: RemoteCall, fails: bool) -> Result<(), RemoteError> {
        self.calls.lock().push(call);
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if fails {
            Err(RemoteError::Status { status: 500 })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[async_trait]
impl RemoteAuthority for MockAuthority {
    async fn set_read_state(
        &self,
        _recipient: RecipientId,
        id: NotificationId,
        is_read: bool,
    ) -> Result<(), RemoteError> {
        self.record(RemoteCall::SetRead(id, is_read), self.failing.contains(&id))
            .await
    }

    async fn delete_notification(
        &self,
        _recipient: RecipientId,
        id: NotificationId,
    ) -> Result<(), RemoteError> {
        self.record(RemoteCall::Delete(id), self.failing.contains(&id))
            .await
    }

    async fn delete_all_notifications(&self, _recipient: RecipientId) -> Result<(), RemoteError> {
        self.record(RemoteCall::DeleteAll, self.fail_bulk).await
    }

    async fn respond_to_scout(
        &self,
        _recipient: RecipientId,
        id: NotificationId,
        response: ScoutResponse,
    ) -> Result<(), RemoteError> {
        self.record(RemoteCall::Scout(id, response), self.failing.contains(&id))
            .await
    }
}

/// Sender half of one scripted connection.
#[cfg(test)]
pub type ScriptedFrames = tokio::sync::mpsc::UnboundedSender<Result<String, TransportError>>;

/// Transport whose connections are scripted in order. Each `open()` consumes
/// the next script; an exhausted script fails to connect.
#[cfg(test)]
pub struct ScriptedTransport {
    scripts: parking_lot::Mutex<
        std::collections::VecDeque<
            Result<tokio::sync::mpsc::UnboundedReceiver<Result<String, TransportError>>, TransportError>,
        >,
    >,
    opened: parking_lot::Mutex<Vec<SessionId>>,
}

#[cfg(test)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            scripts: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            opened: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Queue a connection that succeeds. Dropping the sender closes it.
    pub fn push_connection(&self) -> ScriptedFrames {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.scripts.lock().push_back(Ok(rx));
        tx
    }

    /// Queue a connection attempt that fails.
    pub fn push_failure(&self, error: TransportError) {
        self.scripts.lock().push_back(Err(error));
    }

    /// Sessions passed to `open()` so far.
    pub fn opened(&self) -> Vec<SessionId> {
        self.opened.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn open(&self, session: &SessionId) -> Result<FrameStream, TransportError> {
        use futures_util::StreamExt;

        self.opened.lock().push(*session);
        match self.scripts.lock().pop_front() {
            Some(Ok(rx)) => Ok(tokio_stream::wrappers::UnboundedReceiverStream::new(rx).boxed()),
            Some(Err(e)) => Err(e),
            None => Err(TransportError::Connect("no scripted connection".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_mock_authority_records_and_fails() {
        let authority = MockAuthority::new().failing_for(NotificationId(2));

        assert!(authority
            .set_read_state(RecipientId(1), NotificationId(1), true)
            .await
            .is_ok());
        assert_eq!(
            authority
                .delete_notification(RecipientId(1), NotificationId(2))
                .await,
            Err(RemoteError::Status { status: 500 })
        );
        assert_eq!(
            authority.calls(),
            vec![
                RemoteCall::SetRead(NotificationId(1), true),
                RemoteCall::Delete(NotificationId(2)),
            ]
        );
    }

    #[tokio::test]
    async fn test_scripted_transport_in_order() {
        let transport = ScriptedTransport::new();
        transport.push_failure(TransportError::Status(503));
        let frames = transport.push_connection();

        let session = SessionId::new(RecipientId(1));
        assert_eq!(
            transport.open(&session).await.err(),
            Some(TransportError::Status(503))
        );

        let mut stream = transport.open(&session).await.unwrap();
        frames.send(Ok("hello".into())).unwrap();
        drop(frames);
        assert_eq!(stream.next().await, Some(Ok("hello".to_string())));
        assert_eq!(stream.next().await, None);

        assert!(transport.open(&session).await.is_err());
        assert_eq!(transport.opened().len(), 3);
    }
}

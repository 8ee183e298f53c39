//! REST adapter for the remote authority.
//!
//! | Command | Request |
//! |---------|---------|
//! | set read | `PUT /member/{m}/notification/{n}` with `{"isRead": true}` |
//! | delete one | `DELETE /member/{m}/notification/{n}` |
//! | delete all | `DELETE /member/{m}/notifications` |
//! | scout | `POST /member/{m}/notification/{n}/scout/{accept,reject}` |

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::{NotificationId, RecipientId, RemoteError, ScoutResponse};
use crate::ports::RemoteAuthority;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadStateBody {
    is_read: bool,
}

/// Remote authority reached over HTTP.
pub struct HttpAuthority {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpAuthority {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        auth_token: Option<String>,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| RemoteError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    fn notification_url(&self, recipient: RecipientId, id: NotificationId) -> String {
        format!("{}/member/{}/notification/{}", self.base_url, recipient, id)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<(), RemoteError> {
        let request = match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RemoteError::Status {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl RemoteAuthority for HttpAuthority {
    async fn set_read_state(
        &self,
        recipient: RecipientId,
        id: NotificationId,
        is_read: bool,
    ) -> Result<(), RemoteError> {
        debug!(%recipient, %id, is_read, "PUT read state");
        let request = self
            .client
            .put(self.notification_url(recipient, id))
            .json(&ReadStateBody { is_read });
        self.execute(request).await
    }

    async fn delete_notification(
        &self,
        recipient: RecipientId,
        id: NotificationId,
    ) -> Result<(), RemoteError> {
        debug!(%recipient, %id, "DELETE notification");
        let request = self.client.delete(self.notification_url(recipient, id));
        self.execute(request).await
    }

    async fn delete_all_notifications(&self, recipient: RecipientId) -> Result<(), RemoteError> {
        debug!(%recipient, "DELETE all notifications");
        let url = format!("{}/member/{}/notifications", self.base_url, recipient);
        self.execute(self.client.delete(url)).await
    }

    async fn respond_to_scout(
        &self,
        recipient: RecipientId,
        id: NotificationId,
        response: ScoutResponse,
    ) -> Result<(), RemoteError> {
        debug!(%recipient, %id, response = response.as_path(), "POST scout response");
        let url = format!(
            "{}/scout/{}",
            self.notification_url(recipient, id),
            response.as_path()
        );
        self.execute(self.client.post(url)).await
    }
}

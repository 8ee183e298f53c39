//! Sync client configuration with validation.
//!
//! Values come from defaults, then environment variables, then explicit
//! overrides (the CLI applies its flags on top of [`SyncConfig::from_env`]).

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::entities::RecipientId;

/// Placeholder replaced by the member id in the stream URL.
pub const MEMBER_PLACEHOLDER: &str = "{member}";

/// Main sync client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the REST interface (no trailing slash needed)
    pub api_base_url: String,
    /// Push channel URL template, must contain `{member}`
    pub stream_url: String,
    /// Push channel transport
    pub transport: TransportKind,
    /// Bearer token sent on every request
    pub auth_token: Option<String>,
    /// Timeout for REST calls
    pub request_timeout_ms: u64,
    /// Reconnect policy
    pub reconnect: ReconnectConfig,
    /// Decoded events buffered between the stream client and reconciliation
    pub event_channel_capacity: usize,
    /// Session events buffered per subscriber
    pub subscriber_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            stream_url: format!("http://localhost:8080/member/{MEMBER_PLACEHOLDER}/notifications/sse"),
            transport: TransportKind::Sse,
            auth_token: None,
            request_timeout_ms: 10_000,
            reconnect: ReconnectConfig::default(),
            event_channel_capacity: 256,
            subscriber_capacity: 128,
        }
    }
}

impl SyncConfig {
    /// Defaults overlaid with `NOTIFY_*` environment variables.
    ///
    /// Unparseable numeric values keep the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("NOTIFY_API_URL") {
            config.api_base_url = url;
        }
        if let Ok(url) = std::env::var("NOTIFY_STREAM_URL") {
            config.stream_url = url;
        }
        if let Some(kind) = std::env::var("NOTIFY_TRANSPORT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.transport = kind;
        }
        if let Ok(token) = std::env::var("NOTIFY_AUTH_TOKEN") {
            if !token.is_empty() {
                config.auth_token = Some(token);
            }
        }
        config.request_timeout_ms = env_u64("NOTIFY_REQUEST_TIMEOUT_MS", config.request_timeout_ms);
        config.reconnect.initial_delay_ms =
            env_u64("NOTIFY_RECONNECT_BASE_MS", config.reconnect.initial_delay_ms);
        config.reconnect.max_delay_ms =
            env_u64("NOTIFY_RECONNECT_MAX_MS", config.reconnect.max_delay_ms);

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !has_http_scheme(&self.api_base_url) {
            return Err(ConfigError::InvalidUrl(format!(
                "api_base_url must be http(s): {}",
                self.api_base_url
            )));
        }

        if !self.stream_url.contains(MEMBER_PLACEHOLDER) {
            return Err(ConfigError::InvalidUrl(format!(
                "stream_url must contain {MEMBER_PLACEHOLDER}: {}",
                self.stream_url
            )));
        }

        let scheme_ok = match self.transport {
            TransportKind::Sse => has_http_scheme(&self.stream_url),
            TransportKind::WebSocket => {
                self.stream_url.starts_with("ws://") || self.stream_url.starts_with("wss://")
            }
        };
        if !scheme_ok {
            return Err(ConfigError::InvalidUrl(format!(
                "stream_url scheme does not match {} transport: {}",
                self.transport, self.stream_url
            )));
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout_ms cannot be 0".into(),
            ));
        }

        self.reconnect.validate()?;

        if self.event_channel_capacity == 0 || self.subscriber_capacity == 0 {
            return Err(ConfigError::InvalidCapacity(
                "channel capacities must be non-zero".into(),
            ));
        }

        Ok(())
    }

    /// Stream URL for one member.
    pub fn stream_endpoint(&self, recipient: RecipientId) -> String {
        render_member_url(&self.stream_url, recipient)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Substitute the member id into a URL template.
pub fn render_member_url(template: &str, recipient: RecipientId) -> String {
    template.replace(MEMBER_PLACEHOLDER, &recipient.to_string())
}

fn has_http_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Push channel transport selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Server-sent events over HTTP
    Sse,
    /// Text frames over a WebSocket
    WebSocket,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sse" => Ok(Self::Sse),
            "websocket" | "ws" => Ok(Self::WebSocket),
            other => Err(ConfigError::UnknownTransport(other.to_string())),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sse => write!(f, "sse"),
            Self::WebSocket => write!(f, "websocket"),
        }
    }
}

/// Reconnect backoff configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// First delay after a fault
    pub initial_delay_ms: u64,
    /// Upper bound for any delay
    pub max_delay_ms: u64,
    /// Growth factor per attempt
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay_ms == 0 {
            return Err(ConfigError::InvalidBackoff(
                "initial_delay_ms cannot be 0".into(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::InvalidBackoff(
                "max_delay_ms must be >= initial_delay_ms".into(),
            ));
        }
        if !self.multiplier.is_finite() || !(1.0..=16.0).contains(&self.multiplier) {
            return Err(ConfigError::InvalidBackoff(
                "multiplier must be between 1.0 and 16.0".into(),
            ));
        }
        Ok(())
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unknown transport: {0}")]
    UnknownTransport(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid backoff: {0}")]
    InvalidBackoff(String),

    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stream_url_requires_placeholder() {
        let mut config = SyncConfig::default();
        config.stream_url = "http://localhost:8080/notifications".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_scheme_must_match_transport() {
        let mut config = SyncConfig::default();
        config.transport = TransportKind::WebSocket;
        assert!(config.validate().is_err());

        config.stream_url = "ws://localhost:8080/member/{member}/notifications".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_backoff_rejected() {
        let mut config = SyncConfig::default();
        config.reconnect.max_delay_ms = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBackoff(_))
        ));

        let mut config = SyncConfig::default();
        config.reconnect.multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = SyncConfig::default();
        config.request_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_stream_endpoint_substitutes_member() {
        let config = SyncConfig::default();
        assert_eq!(
            config.stream_endpoint(RecipientId(42)),
            "http://localhost:8080/member/42/notifications/sse"
        );
    }

    #[test]
    fn test_transport_parse() {
        assert_eq!("SSE".parse::<TransportKind>().unwrap(), TransportKind::Sse);
        assert_eq!("ws".parse::<TransportKind>().unwrap(), TransportKind::WebSocket);
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"transport":"websocket","reconnect":{"max_delay_ms":5000}}"#)
                .unwrap();
        assert_eq!(config.transport, TransportKind::WebSocket);
        assert_eq!(config.reconnect.max_delay_ms, 5_000);
        assert_eq!(config.reconnect.initial_delay_ms, 1_000);
    }
}

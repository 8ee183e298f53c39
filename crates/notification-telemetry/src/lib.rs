//! # Notification Telemetry
//!
//! Logging and metrics for the notification sync client.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an env filter, pretty or JSON output
//! - **Metrics**: Prometheus counters and gauges, exported via [`encode_metrics`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notification_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NOTIFY_SERVICE_NAME` | `notification-sync` | Service name in logs |
//! | `NOTIFY_LOG_LEVEL` | `info` | Log level filter |
//! | `NOTIFY_JSON_LOGS` | `false` | JSON output |
//! | `NOTIFY_CONSOLE_OUTPUT` | `true` | Emit to stdout |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging, LoggingHandle};
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, COMMANDS, CONNECTION_STATE, FRAMES_DROPPED,
    FRAMES_RECEIVED, RECONCILE_EVENTS, RECONNECT_ATTEMPTS, REGISTRY, UNREAD_NOTIFICATIONS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first: they never depend on the subscriber
    let metrics_handle = register_metrics()?;
    let logging_handle = init_logging(&config)?;

    Ok(TelemetryGuard {
        _logging: logging_handle,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logging: LoggingHandle,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

//! Subscriber installation for structured logs.
//!
//! Two output shapes are supported: a compact human-readable format for local
//! runs and a JSON format (one object per line) for log shippers. Both carry the
//! target and every structured field recorded by the `tracing` macros.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Handle proving the global subscriber was installed.
#[derive(Debug)]
pub struct LoggingHandle {
    service_name: String,
}

impl LoggingHandle {
    /// Service name the subscriber was installed for.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

/// Build the env filter from configuration, falling back to `RUST_LOG`.
pub fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .map_err(|e| TelemetryError::Config(format!("invalid log filter: {e}")))
}

/// Install the global `tracing` subscriber.
///
/// Fails with [`TelemetryError::LoggingInit`] if a subscriber is already set.
pub fn init_logging(config: &TelemetryConfig) -> Result<LoggingHandle, TelemetryError> {
    let env_filter = build_filter(config)?;

    let result = match (config.console_output, config.json_logs) {
        (true, true) => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        (true, false) => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .try_init(),
        (false, _) => tracing_subscriber::registry().with(env_filter).try_init(),
    };
    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Structured logging initialized"
    );

    Ok(LoggingHandle {
        service_name: config.service_name.clone(),
    })
}

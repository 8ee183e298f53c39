//! Prometheus metrics for the notification sync client.
//!
//! All metrics follow the naming convention: `notify_<component>_<metric>`
//!
//! Metrics are process-global statics so the library can record them without
//! threading a handle through every component. They are only exported once
//! [`register_metrics`] has added them to [`REGISTRY`].

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT STREAM
    // =========================================================================

    /// Frames received on the push channel, before decoding
    pub static ref FRAMES_RECEIVED: Counter = Counter::new(
        "notify_stream_frames_received_total",
        "Total frames received on the push channel"
    ).expect("metric creation failed");

    /// Frames dropped instead of being applied
    pub static ref FRAMES_DROPPED: CounterVec = CounterVec::new(
        Opts::new("notify_stream_frames_dropped_total", "Frames dropped by the stream client"),
        &["reason"]  // reason: parse/shape/recipient
    ).expect("metric creation failed");

    /// Reconnect attempts scheduled after a transport fault
    pub static ref RECONNECT_ATTEMPTS: Counter = Counter::new(
        "notify_stream_reconnect_attempts_total",
        "Total reconnect attempts scheduled"
    ).expect("metric creation failed");

    /// Current connection state (0=disconnected 1=connecting 2=connected 3=reconnecting 4=closed)
    pub static ref CONNECTION_STATE: Gauge = Gauge::new(
        "notify_stream_connection_state",
        "Current push channel connection state"
    ).expect("metric creation failed");

    // =========================================================================
    // RECONCILIATION
    // =========================================================================

    /// Inbound events applied to the store
    pub static ref RECONCILE_EVENTS: CounterVec = CounterVec::new(
        Opts::new("notify_reconcile_events_total", "Inbound events processed by reconciliation"),
        &["kind"]  // kind: snapshot/incremental/duplicate
    ).expect("metric creation failed");

    /// Current unread notification count
    pub static ref UNREAD_NOTIFICATIONS: Gauge = Gauge::new(
        "notify_store_unread",
        "Unread notifications in the session store"
    ).expect("metric creation failed");

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Commands issued against the remote authority
    pub static ref COMMANDS: CounterVec = CounterVec::new(
        Opts::new("notify_commands_total", "User commands by outcome"),
        &["command", "outcome"]  // outcome: success/failure/skipped/discarded
    ).expect("metric creation failed");
}

/// Keeps the registry alive for the lifetime of the telemetry guard.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register every metric with [`REGISTRY`].
///
/// Registering twice is tolerated so tests and embedders can call this freely.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(FRAMES_RECEIVED.clone()),
        Box::new(FRAMES_DROPPED.clone()),
        Box::new(RECONNECT_ATTEMPTS.clone()),
        Box::new(CONNECTION_STATE.clone()),
        Box::new(RECONCILE_EVENTS.clone()),
        Box::new(UNREAD_NOTIFICATIONS.clone()),
        Box::new(COMMANDS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Render all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

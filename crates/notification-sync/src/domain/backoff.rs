//! Reconnect delay policy.
//!
//! Delays grow geometrically from the initial delay up to a cap:
//!
//! ```text
//! attempt:  1     2     3     4     5     6     7 ...
//! delay:    1s    2s    4s    8s    16s   32s   60s (capped)
//! ```
//!
//! The sequence never decreases until [`ReconnectBackoff::reset`] is called
//! after a successful connection.

use std::time::Duration;

use super::config::ReconnectConfig;

/// Backoff state for one connection loop.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    config: ReconnectConfig,
    attempt: u32,
    next_delay: Duration,
}

impl ReconnectBackoff {
    pub fn new(config: ReconnectConfig) -> Self {
        let next_delay = config.initial_delay();
        Self {
            config,
            attempt: 0,
            next_delay,
        }
    }

    /// Consume the next delay and advance the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next_delay;
        self.attempt = self.attempt.saturating_add(1);

        let max_ms = self.config.max_delay_ms as f64;
        let grown_ms = (delay.as_millis() as f64 * self.config.multiplier).min(max_ms);
        self.next_delay = Duration::from_millis(grown_ms as u64).max(delay);

        delay
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Back to the initial delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.next_delay = self.config.initial_delay();
    }
}

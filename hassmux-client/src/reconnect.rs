//! Reconnection backoff for the session.

use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Whether failed connection attempts are retried.
    pub enabled: bool,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for the delay between retries.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failure.
    pub backoff_multiplier: f64,
    /// Maximum number of connection attempts (0 = unlimited).
    pub max_attempts: usize,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_attempts: 8,
        }
    }
}

/// Tracks the attempts of one connect procedure and computes retry delays.
///
/// Each connect procedure starts from a fresh state.
#[derive(Debug)]
pub struct ReconnectState {
    config: ReconnectConfig,
    attempts: usize,
    current_delay: Duration,
}

impl ReconnectState {
    /// Creates a new reconnect state with the given configuration.
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            attempts: 0,
            current_delay: initial_delay,
        }
    }

    /// Records a failed attempt and returns the delay before the next one.
    ///
    /// Returns `None` once the attempt budget is spent or when retries are
    /// disabled.
    pub fn on_failure(&mut self) -> Option<Duration> {
        self.attempts += 1;

        if !self.can_retry() {
            return None;
        }

        let delay = self.current_delay;
        let scaled = self.current_delay.as_secs_f64() * self.config.backoff_multiplier.max(1.0);
        self.current_delay = Duration::try_from_secs_f64(scaled)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay);

        Some(delay)
    }

    /// Returns the number of failed attempts so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Returns true if another attempt is allowed.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.config.enabled
            && (self.config.max_attempts == 0 || self.attempts < self.config.max_attempts)
    }
}

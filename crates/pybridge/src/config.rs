use std::time::Duration;

/// Limits and configuration for a worker session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum wall-clock time for the worker to answer the startup probe.
    pub startup_timeout: Duration,
    /// Maximum wall-clock time for a single evaluation round trip.
    pub eval_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(10),
            eval_timeout: Duration::from_secs(30),
        }
    }
}

impl SessionConfig {
    /// Replace the startup timeout.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Replace the evaluation timeout.
    pub fn with_eval_timeout(mut self, timeout: Duration) -> Self {
        self.eval_timeout = timeout;
        self
    }
}

//! Configuration for the session cache.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default timeout applied when a caller supplies none (1 day).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_millis(86_400_000);

/// Default interval between eviction sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(25);

/// Smallest timeout a session may be created with by default.
pub const DEFAULT_MIN_TIMEOUT: Duration = Duration::from_millis(50);

/// Configuration for the session cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Interval between eviction sweeps. Must be shorter than `min_timeout`
    /// so that no session outlives its deadline by more than one interval.
    pub sweep_interval: Duration,

    /// Timeout used by callers that do not specify one.
    pub default_timeout: Duration,

    /// Smallest accepted session timeout.
    pub min_timeout: Duration,

    /// Maximum number of rows accepted per processing call (None = unlimited).
    pub max_batch_size: Option<usize>,

    /// Whether `SessionCache::spawn_sweeper` starts the background task.
    /// If false, expired sessions are only reclaimed on access or by an
    /// explicit `sweep_now`.
    pub enable_sweeper: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            default_timeout: DEFAULT_SESSION_TIMEOUT,
            min_timeout: DEFAULT_MIN_TIMEOUT,
            max_batch_size: None,
            enable_sweeper: true,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the timeout used when callers supply none.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the smallest accepted timeout.
    pub fn with_min_timeout(mut self, timeout: Duration) -> Self {
        self.min_timeout = timeout;
        self
    }

    /// Limit the number of rows per processing call.
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = Some(max);
        self
    }

    /// Enable or disable the background sweeper.
    pub fn with_sweeper(mut self, enabled: bool) -> Self {
        self.enable_sweeper = enabled;
        self
    }

    /// Check the relationships between the configured durations.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(Error::InvalidConfiguration(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        if self.min_timeout.is_zero() {
            return Err(Error::InvalidConfiguration(
                "minimum timeout must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval >= self.min_timeout {
            return Err(Error::InvalidConfiguration(format!(
                "sweep interval ({} ms) must be shorter than the minimum timeout ({} ms)",
                self.sweep_interval.as_millis(),
                self.min_timeout.as_millis()
            )));
        }
        if self.default_timeout < self.min_timeout {
            return Err(Error::InvalidConfiguration(format!(
                "default timeout ({} ms) is below the minimum timeout ({} ms)",
                self.default_timeout.as_millis(),
                self.min_timeout.as_millis()
            )));
        }
        if self.max_batch_size == Some(0) {
            return Err(Error::InvalidConfiguration(
                "max batch size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        CacheConfig::default().validate().unwrap();
    }

    #[test]
    fn test_sweep_interval_must_be_shorter_than_min_timeout() {
        let config = CacheConfig::new()
            .with_min_timeout(Duration::from_millis(100))
            .with_sweep_interval(Duration::from_millis(100));
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = CacheConfig::new().with_max_batch_size(0);
        assert!(config.validate().is_err());
    }
}

//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]                 # HTTP listener
//! [session]                # component session cache
//! [logging]                # console and file logging
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default request body limit (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    /// HTTP server configuration.
    pub server: Option<ServerConfig>,

    /// Session cache configuration.
    pub session: Option<SessionConfig>,

    /// Logging configuration.
    pub logging: Option<LoggingConfig>,
}

impl SiftConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: SiftConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: SiftConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }

        if other.session.is_some() {
            self.session = other.session;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Server section, or defaults when absent.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Session section, or defaults when absent.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// Logging section, or defaults when absent.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Reject values that can never work, independent of other layers.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref session) = self.session {
            session.validate()?;
        }
        if let Some(ref server) = self.server
            && server.max_body_bytes == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "server.max_body_bytes".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Enable request logging.
    pub request_logging: bool,
    /// Maximum accepted request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            request_logging: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session cache configuration.
///
/// ```toml
/// [session]
/// default_timeout_ms = 86400000
/// min_timeout_ms = 50
/// sweep_interval_ms = 25
/// max_batch_size = 10000
/// sweeper = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Timeout for sessions created without an explicit `timeout`.
    pub default_timeout_ms: u64,
    /// Smallest timeout a client may request.
    pub min_timeout_ms: u64,
    /// Interval between eviction sweeps.
    pub sweep_interval_ms: u64,
    /// Maximum rows per processing request. Unlimited when absent.
    pub max_batch_size: Option<usize>,
    /// Run the background sweeper.
    pub sweeper: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 86_400_000,
            min_timeout_ms: 50,
            sweep_interval_ms: 25,
            max_batch_size: None,
            sweeper: true,
        }
    }
}

impl SessionConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn min_timeout(&self) -> Duration {
        Duration::from_millis(self.min_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        let checks = [
            ("session.default_timeout_ms", self.default_timeout_ms),
            ("session.min_timeout_ms", self.min_timeout_ms),
            ("session.sweep_interval_ms", self.sweep_interval_ms),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.max_batch_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "session.max_batch_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Write JSON logs to a daily rolling file.
    pub file: bool,
    /// Directory for log files. Defaults to the platform data dir.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
            dir: None,
        }
    }
}

impl LoggingConfig {
    /// Resolve the log directory, falling back to `<data dir>/sift/logs`.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|d| d.join("sift").join("logs")))
    }
}

//! Configuration system for the Sift component server.
//!
//! Provides TOML-based configuration with:
//! - `[server]` bind address, port and HTTP limits
//! - `[session]` session timeouts, sweep interval and batch limits
//! - `[logging]` log level and rolling log file location
//! - Config file layering (user config dir + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;

//! CLI command handlers.

pub mod components;
pub mod config;
pub mod start;

use std::path::Path;

use anyhow::Result;
use sift_config::{ConfigSource, LoadedConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Load configuration from an explicit file, or by discovery.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    match explicit {
        Some(path) => {
            let config = sift_config::load_config_file(path)?;
            Ok(LoadedConfig {
                config,
                sources: vec![ConfigSource {
                    path: path.to_path_buf(),
                    loaded: true,
                }],
                warnings: Vec::new(),
            })
        }
        None => Ok(sift_config::load_config(None)?),
    }
}

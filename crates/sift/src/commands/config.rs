//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use sift_config::{LoadedConfig, SiftConfig};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./sift.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub fn run(args: ConfigArgs, loaded: &LoadedConfig, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(loaded, ctx),
        ConfigCommand::Which => cmd_which(loaded),
        ConfigCommand::Init { local } => cmd_init(local),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(loaded: &LoadedConfig, ctx: &Context) -> Result<()> {
    let config = &loaded.config;

    if ctx.json_output {
        let resolved = serde_json::json!({
            "server": config.server(),
            "session": config.session(),
            "logging": config.logging(),
        });
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    println!("# Sift Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    let server = config.server();
    println!("Server:");
    println!("  bind: {}:{}", server.bind, server.port);
    println!("  request logging: {}", server.request_logging);
    println!("  max body: {} bytes", server.max_body_bytes);
    println!();

    let session = config.session();
    println!("Sessions:");
    println!("  default timeout: {} ms", session.default_timeout_ms);
    println!("  min timeout: {} ms", session.min_timeout_ms);
    println!("  sweep interval: {} ms", session.sweep_interval_ms);
    match session.max_batch_size {
        Some(max) => println!("  max batch: {} rows", max),
        None => println!("  max batch: unlimited"),
    }
    println!("  sweeper: {}", if session.sweeper { "on" } else { "off" });
    println!();

    let logging = config.logging();
    println!("Logging:");
    println!("  level: {}", logging.level);
    match logging.file.then(|| logging.log_dir()).flatten() {
        Some(dir) => println!("  file: {}", dir.display()),
        None => println!("  file: off"),
    }
    println!();

    if !loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &loaded.warnings {
            println!("  ⚠ {}", w);
        }
        println!();
    }

    if ctx.verbose {
        println!("---\nRaw config:\n");
        if let Ok(toml_str) = config.to_toml() {
            println!("{}", toml_str);
        }
    }

    Ok(())
}

fn cmd_which(loaded: &LoadedConfig) -> Result<()> {
    println!("Config file search order (later overrides earlier):\n");

    for source in &loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found. Run 'sift config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("sift.toml")
    } else {
        sift_config::user_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    let defaults = SiftConfig {
        server: Some(Default::default()),
        session: Some(Default::default()),
        logging: Some(Default::default()),
    };
    sift_config::save_config(&defaults, &path)?;

    println!("Created config file: {}", path.display());
    Ok(())
}

fn cmd_path() -> Result<()> {
    match sift_config::user_config_path() {
        Some(path) => {
            println!("{}", path.display());
            if !path.exists() {
                println!("(file does not exist yet - run 'sift config init')");
            }
        }
        None => {
            println!("Could not determine config directory");
        }
    }
    Ok(())
}

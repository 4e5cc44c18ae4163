//! Sift - ephemeral component sessions over HTTP
//!
//! Main entry point for the Sift CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

mod commands;

use commands::{components, config, start};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Sift - ephemeral component sessions over HTTP
#[derive(Parser)]
#[command(name = "sift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to config file (overrides default discovery)
    #[arg(long, global = true, env = "SIFT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Sift server
    Start(start::StartArgs),

    /// List the components sessions can be created for
    Components(components::ComponentsArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = commands::load(cli.config.as_deref())?;
    let _guard = init_tracing(&loaded.config.logging(), cli.verbose);

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &loaded, &ctx).await,
        Commands::Components(args) => components::run(args, &ctx),
        Commands::Config(args) => config::run(args, &loaded, &ctx),
    }
}

/// Install the console layer and, if enabled, a rotating JSON file layer.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(logging: &sift_config::LoggingConfig, verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let console_filter = if verbose {
        EnvFilter::new("sift=debug,sift_session=debug,sift_components=debug,sift_server=debug,sift_config=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let file_appender = logging
        .file
        .then(|| logging.log_dir())
        .flatten()
        .and_then(|log_dir| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("sift")
                .filename_suffix("log")
                .build(&log_dir)
                .inspect_err(|e| eprintln!("warning: file logging disabled: {}", e))
                .ok()
        });

    let (file_layer, guard) = match file_appender {
        Some(file_appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(
                    "sift=trace,sift_session=trace,sift_components=trace,sift_server=trace,sift_config=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}

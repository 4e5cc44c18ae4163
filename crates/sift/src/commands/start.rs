//! Start command - launches the Sift server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::info;

use sift_components::ComponentRegistry;
use sift_config::{LoadedConfig, SiftConfig};
use sift_server::{Server, ServerConfig};
use sift_session::{CacheConfig, SessionCache};

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Timeout in milliseconds for sessions created without one (overrides config)
    #[arg(long)]
    pub default_timeout: Option<u64>,

    /// Maximum rows per processing call (overrides config)
    #[arg(long)]
    pub max_batch_size: Option<usize>,

    /// Disable per-request logging
    #[arg(long)]
    pub no_request_logging: bool,

    /// Allowed CORS origin, "*" for any (can be specified multiple times)
    #[arg(long)]
    pub cors_origin: Vec<String>,
}

/// Run the start command.
pub async fn run(args: StartArgs, loaded: &LoadedConfig, ctx: &Context) -> Result<()> {
    if ctx.verbose {
        let sources = loaded.loaded_from();
        if sources.is_empty() {
            println!("No config files found, using defaults + CLI args");
        } else {
            for source in sources {
                println!("Loaded config: {}", source.display());
            }
        }
    }

    let (server_config, cache_config) = resolve(&args, &loaded.config)?;

    if ctx.verbose {
        println!("Bind address: {}", server_config.bind_address);
        println!(
            "Sessions: default timeout {} ms, sweep every {} ms",
            cache_config.default_timeout.as_millis(),
            cache_config.sweep_interval.as_millis()
        );
    }

    let registry = Arc::new(ComponentRegistry::builtin());
    info!(components = registry.len(), "Component registry loaded");

    let cache = SessionCache::new(cache_config, registry.clone(), registry)?;
    let server = Server::new(cache, server_config);

    server
        .run_with_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
        })
        .await?;

    Ok(())
}

/// Merge CLI overrides onto the file configuration.
fn resolve(args: &StartArgs, config: &SiftConfig) -> Result<(ServerConfig, CacheConfig)> {
    let server = config.server();
    let session = config.session();

    let port = args.port.unwrap_or(server.port);
    let bind = args.bind.clone().unwrap_or(server.bind);
    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;

    let server_config = ServerConfig::new()
        .with_bind_address(addr)
        .with_request_logging(server.request_logging && !args.no_request_logging)
        .with_max_body_size(server.max_body_bytes)
        .with_cors_origins(args.cors_origin.clone());

    let default_timeout = args
        .default_timeout
        .map(Duration::from_millis)
        .unwrap_or_else(|| session.default_timeout());

    let mut cache_config = CacheConfig::new()
        .with_sweep_interval(session.sweep_interval())
        .with_min_timeout(session.min_timeout())
        .with_default_timeout(default_timeout)
        .with_sweeper(session.sweeper);
    if let Some(max) = args.max_batch_size.or(session.max_batch_size) {
        cache_config = cache_config.with_max_batch_size(max);
    }
    cache_config.validate()?;

    Ok((server_config, cache_config))
}

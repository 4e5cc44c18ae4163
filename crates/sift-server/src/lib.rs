//! HTTP API for Sift component sessions.
//!
//! This crate exposes a [`SessionCache`] over HTTP. Each route is scoped by
//! a tenant path segment:
//!
//! - `POST /{tenant}/components/{name}?timeout=ms` creates a session
//! - `PUT /{tenant}/components/{id}` pushes a batch of rows through it
//! - `DELETE /{tenant}/components/{id}` closes it and returns its result
//! - `PUT /{tenant}/components` runs a component once without a session
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sift_components::ComponentRegistry;
//! use sift_server::{Server, ServerConfig};
//! use sift_session::{CacheConfig, SessionCache};
//!
//! let registry = Arc::new(ComponentRegistry::builtin());
//! let cache = SessionCache::new(CacheConfig::default(), registry.clone(), registry)?;
//! let config = ServerConfig::new().with_bind_address("127.0.0.1:8080".parse()?);
//!
//! Server::new(cache, config).run().await?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use logging::request_logging_middleware;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, extract::DefaultBodyLimit, http::HeaderValue, middleware};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use sift_session::SessionCache;

/// The Sift HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server over the given cache and configuration.
    pub fn new(cache: SessionCache, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(cache, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(routes::health_routes())
            .merge(routes::component_routes())
            .layer(DefaultBodyLimit::max(self.state.config.max_body_size))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ));

        if let Some(cors) = self.cors_layer() {
            router = router.layer(cors);
        }

        router
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    fn cors_layer(&self) -> Option<CorsLayer> {
        let origins = &self.state.config.cors_origins;
        if origins.is_empty() {
            return None;
        }

        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        if origins.iter().any(|o| o == "*") {
            return Some(layer.allow_origin(Any));
        }

        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        Some(layer.allow_origin(AllowOrigin::list(values)))
    }

    /// Run the server until the process is stopped.
    pub async fn run(self) -> Result<()> {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(mut self, addr: SocketAddr) -> Result<()> {
        let mut config = (*self.state.config).clone();
        config.bind_address = addr;
        self.state = AppState::new(self.state.cache.clone(), config);
        self.run().await
    }

    /// Run the server until `shutdown` resolves, then close every session.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.bind_address;
        let router = self.router();
        let cache = self.state.cache.clone();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        cache.spawn_sweeper();
        info!("Starting server on {}", addr);

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)));

        let closed = cache.shutdown().await;
        info!(closed, "Server stopped");

        served
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

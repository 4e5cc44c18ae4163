//! Application state shared across handlers.

use std::sync::Arc;

use sift_session::SessionCache;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The component session cache.
    pub cache: SessionCache,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(cache: SessionCache, config: ServerConfig) -> Self {
        Self {
            cache,
            config: Arc::new(config),
        }
    }

    /// Run a cache operation on the blocking pool.
    ///
    /// Cache calls may wait on a session's lock or on a component for as
    /// long as a batch takes, so they never run on the async workers.
    pub async fn with_cache<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&SessionCache) -> sift_session::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || op(&cache))
            .await
            .map_err(|e| ServerError::Internal(format!("Task join error: {e}")))?
            .map_err(ServerError::from)
    }
}

//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use sift_components::ComponentRegistry;
use sift_server::{Server, ServerConfig};
use sift_session::{CacheConfig, SessionCache};

/// Largest batch the test server accepts.
pub const MAX_BATCH: usize = 100;

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client configured for this server.
    pub client: Client,
    /// The cache behind the server.
    pub cache: SessionCache,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server backed by the built-in components.
    pub async fn start() -> Result<Self> {
        let addr = find_available_port().await?;

        let registry = Arc::new(ComponentRegistry::builtin());
        let cache_config = CacheConfig::new()
            .with_min_timeout(Duration::from_millis(20))
            .with_sweep_interval(Duration::from_millis(10))
            .with_max_batch_size(MAX_BATCH);
        let cache = SessionCache::new(cache_config, registry.clone(), registry)?;

        let config = ServerConfig::new()
            .with_bind_address(addr)
            .with_request_logging(false);

        let server = Server::new(cache.clone(), config);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            cache,
            _handle: handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get a GET request builder.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    /// Get a POST request builder.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }

    /// Get a PUT request builder.
    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.put(format!("{}{}", self.base_url(), path))
    }

    /// Get a DELETE request builder.
    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(format!("{}{}", self.base_url(), path))
    }

    /// Create a session and return its id.
    pub async fn create_session(
        &self,
        tenant: &str,
        component: &str,
        configuration: serde_json::Value,
        timeout_ms: u64,
    ) -> Result<String> {
        let resp = self
            .post(&format!(
                "/{tenant}/components/{component}?timeout={timeout_ms}"
            ))
            .json(&serde_json::json!({ "configuration": configuration }))
            .send()
            .await?;
        anyhow::ensure!(
            resp.status() == reqwest::StatusCode::CREATED,
            "create failed with {}",
            resp.status()
        );
        Ok(resp.text().await?)
    }
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}

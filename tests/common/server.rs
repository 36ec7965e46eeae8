//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own catalog.

use super::constants::*;
use super::fixtures::populate_test_catalog;
use metadata_catalog_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use metadata_catalog_server::LocalCatalog;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::TcpListener;

fn test_config(port: u16) -> ServerConfig {
    ServerConfig {
        requests_logging_level: RequestsLoggingLevel::None,
        port,
        metrics_port: None,
    }
}

/// Test server instance running on the test's tokio runtime
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// The catalog served, for direct access in tests
    pub catalog: Arc<LocalCatalog>,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server over an in-memory catalog holding the fixture documents
    pub async fn spawn() -> Self {
        let catalog = LocalCatalog::in_memory();
        populate_test_catalog(&catalog);
        Self::spawn_with_catalog(catalog).await
    }

    /// Spawns a server over an empty in-memory catalog
    pub async fn spawn_empty() -> Self {
        Self::spawn_with_catalog(LocalCatalog::in_memory()).await
    }

    /// Spawns a server over a catalog journaled to `db_path`
    pub async fn spawn_with_journal(db_path: &Path) -> Self {
        let catalog = LocalCatalog::open(db_path).expect("Failed to open catalog journal");
        Self::spawn_with_catalog(catalog).await
    }

    async fn spawn_with_catalog(catalog: LocalCatalog) -> Self {
        let catalog = Arc::new(catalog);

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let app = make_app(test_config(port), catalog.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            catalog,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the status endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Test server running on its own thread and runtime
///
/// Blocking clients such as `RemoteCatalog` cannot be used from inside a tokio
/// runtime, so tests using them run as plain `#[test]` functions against this
/// server instead of [`TestServer`].
pub struct BlockingTestServer {
    pub base_url: String,

    pub catalog: Arc<LocalCatalog>,

    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl BlockingTestServer {
    /// Spawns a server over an in-memory catalog holding the fixture documents
    pub fn spawn() -> Self {
        let catalog = LocalCatalog::in_memory();
        populate_test_catalog(&catalog);
        Self::spawn_with_catalog(catalog)
    }

    /// Spawns a server over an empty in-memory catalog
    pub fn spawn_empty() -> Self {
        Self::spawn_with_catalog(LocalCatalog::in_memory())
    }

    fn spawn_with_catalog(catalog: LocalCatalog) -> Self {
        let catalog = Arc::new(catalog);
        let (port_tx, port_rx) = std::sync::mpsc::channel::<u16>();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let served = catalog.clone();
        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("Failed to build test runtime");

            runtime.block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("Failed to bind to random port");
                let port = listener
                    .local_addr()
                    .expect("Failed to get local address")
                    .port();
                port_tx.send(port).expect("Test thread went away");

                axum::serve(listener, make_app(test_config(port), served))
                    .with_graceful_shutdown(async {
                        shutdown_rx.await.ok();
                    })
                    .await
                    .expect("Server failed");
            });
        });

        let port = port_rx
            .recv_timeout(Duration::from_millis(SERVER_READY_TIMEOUT_MS))
            .expect("Server did not report its port");

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            catalog,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        };

        server.wait_for_ready();

        server
    }

    fn wait_for_ready(&self) {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send() {
                Ok(response) if response.status().is_success() => return,
                _ => std::thread::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)),
            }
        }
    }
}

impl Drop for BlockingTestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

//! Test utilities for kata-client
//!
//! Runs an in-process axum server standing in for the scanner, with a
//! [`KataClient`] already pointed at it.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::{KataClient, KataConfig, Result};

/// Self-signed client certificate for tests
pub const TEST_CLIENT_CERT: &str = include_str!("../testdata/client.crt");
/// Private key matching [`TEST_CLIENT_CERT`]
pub const TEST_CLIENT_KEY: &str = include_str!("../testdata/client.key");
/// Sensor id the test client is configured with
pub const TEST_SENSOR_ID: &str = "test-sensor";

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: KataClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Create a new test server from an axum Router
    ///
    /// # Example
    ///
    /// ```ignore
    /// use axum::{routing::get, Router};
    /// use kata_client::testing::TestServer;
    ///
    /// let router = Router::new().route(
    ///     "/kata/scanner/v1/sensors/{sensor}/scans/state",
    ///     get(|| async { axum::Json(serde_json::json!([])) }),
    /// );
    /// let server = TestServer::start(router).await?;
    /// let scans = server.client.get_scans(&Default::default()).await?;
    /// ```
    pub async fn start<S>(router: axum::Router<S>) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        Self::start_with_config(router, |config| config).await
    }

    /// Create a new test server with a custom request timeout
    pub async fn start_with_timeout<S>(router: axum::Router<S>, timeout: Duration) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
    {
        Self::start_with_config(router, move |mut config| {
            config.timeouts.request_ms = timeout.as_millis() as u64;
            config
        })
        .await
    }

    /// Create a new test server, adjusting the client configuration first
    pub async fn start_with_config<S, F>(router: axum::Router<S>, configure: F) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
        axum::Router<S>: Into<axum::Router>,
        F: FnOnce(KataConfig) -> KataConfig,
    {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let router: axum::Router = router.into();

        // Spawn the server
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let config = KataConfig::builder(format!("http://{}/", addr), TEST_SENSOR_ID)
            .identity(TEST_CLIENT_CERT, TEST_CLIENT_KEY)
            .request_timeout_ms(5_000)
            .connect_timeout_ms(2_000)
            .build();
        let client = KataClient::new(configure(config))?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get a reference to the client
    pub fn client(&self) -> &KataClient {
        &self.client
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal if not already done
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Abort the task if still running
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_identity_is_pem() {
        assert!(TEST_CLIENT_CERT.contains("BEGIN CERTIFICATE"));
        assert!(TEST_CLIENT_KEY.contains("BEGIN PRIVATE KEY"));
    }
}

//! KATA Scanner Client Library
//!
//! Submits files to a KATA scanner sensor over mutual TLS, queries scan
//! state, and waits for a scan to reach a verdict.
//!
//! # Example
//!
//! ```rust,no_run
//! use kata_client::{KataClient, KataConfig, SubmitRequest, TlsConfig, WaitOptions};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let tls = TlsConfig::from_files("client.crt", "client.key", Some(Path::new("ca.pem")))?;
//!     let config = KataConfig::builder("https://kata.example:8443", "sensor-1")
//!         .tls(tls)
//!         .build();
//!     let client = KataClient::new(config)?;
//!
//!     // Submit a file; the scan id is generated when not supplied
//!     let submitted = client
//!         .submit_scan(SubmitRequest::new(std::fs::read("sample.exe")?).filename("sample.exe"))
//!         .await?;
//!     if !submitted.ok {
//!         anyhow::bail!("rejected: HTTP {} {:?}", submitted.status, submitted.message);
//!     }
//!
//!     // Poll until a verdict arrives or the wait budget runs out
//!     let options = client.default_wait_options();
//!     match client.wait_for_result(&submitted.scan_id, &options).await? {
//!         Some(item) => println!("verdict: {:?}", item.state),
//!         None => println!("no verdict yet"),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Debug events
//!
//! Set `debug: true` in the configuration, export `KATA_SDK_DEBUG=1` or
//! `DEBUG=kata-sdk`, or pass a sink to [`KataClient::with_debug_sink`].
//!
//! # Testing
//!
//! The `testing` module starts an axum router as a stand-in scanner:
//!
//! ```rust,ignore
//! use kata_client::testing::TestServer;
//!
//! let server = TestServer::start(router).await?;
//! let scans = server.client.get_scans(&Default::default()).await?;
//! ```

mod client;
pub mod config;
pub mod debug;
mod error;
pub mod testing;
mod types;
pub mod wait;

pub use client::KataClient;
pub use config::{ConfigError, KataConfig, KataConfigBuilder, TimeoutsConfig, TlsConfig};
pub use debug::{DebugLog, DebugSink};
pub use error::{KataClientError, Result};
pub use types::*;
pub use wait::{ScanStateSource, WaitOptions};

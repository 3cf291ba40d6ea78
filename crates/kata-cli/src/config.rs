//! Configuration file handling for kata-cli

use anyhow::{Context, Result};
use kata_client::{KataConfig, TlsConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Scanner base URL
    pub base_url: Option<String>,
    /// Sensor identifier
    pub sensor_id: Option<String>,
    /// Client certificate (PEM file)
    pub cert: Option<PathBuf>,
    /// Client private key (PEM file)
    pub key: Option<PathBuf>,
    /// CA bundle (PEM file)
    pub ca: Option<PathBuf>,
    /// Skip scanner certificate verification
    pub insecure: Option<bool>,
    /// Per-request timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
}

/// Connection settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub base_url: Option<String>,
    pub sensor_id: Option<String>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub ca: Option<PathBuf>,
    pub insecure: bool,
    pub timeout_ms: Option<u64>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("kata-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, args: ConnectionArgs) -> Result<MergedConfig> {
        Ok(MergedConfig {
            base_url: args
                .base_url
                .or_else(|| self.base_url.clone())
                .context("No scanner URL given (--base-url, KATA_BASE_URL or config file)")?,
            sensor_id: args
                .sensor_id
                .or_else(|| self.sensor_id.clone())
                .context("No sensor ID given (--sensor-id, KATA_SENSOR_ID or config file)")?,
            cert: args
                .cert
                .or_else(|| self.cert.clone())
                .context("No client certificate given (--cert, KATA_CERT or config file)")?,
            key: args
                .key
                .or_else(|| self.key.clone())
                .context("No client key given (--key, KATA_KEY or config file)")?,
            ca: args.ca.or_else(|| self.ca.clone()),
            insecure: args.insecure || self.insecure.unwrap_or(false),
            timeout_ms: args.timeout_ms.or(self.timeout_ms),
        })
    }
}

/// Fully resolved connection settings after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub base_url: String,
    pub sensor_id: String,
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: Option<PathBuf>,
    pub insecure: bool,
    pub timeout_ms: Option<u64>,
}

impl MergedConfig {
    /// Read the PEM files and build the client configuration
    pub fn to_client_config(&self, debug: bool) -> Result<KataConfig> {
        let tls = TlsConfig::from_files(&self.cert, &self.key, self.ca.as_deref())
            .context("Failed to load TLS material")?;

        let mut builder = KataConfig::builder(&self.base_url, &self.sensor_id)
            .tls(tls)
            .reject_unauthorized(!self.insecure)
            .debug(debug);
        if let Some(ms) = self.timeout_ms {
            builder = builder.request_timeout_ms(ms);
        }

        Ok(builder.build())
    }
}

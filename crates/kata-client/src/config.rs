//! Client configuration with YAML support

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// KATA client configuration
///
/// Can be loaded from YAML or JSON, or constructed programmatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KataConfig {
    /// Base URL of the scanner (trailing slashes are ignored)
    pub base_url: String,

    /// Sensor identifier used in every request path
    pub sensor_id: String,

    /// Client identity and peer verification
    pub tls: TlsConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Emit debug events through `tracing`
    #[serde(default)]
    pub debug: bool,
}

/// Mutual TLS material, PEM encoded
#[derive(Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Client certificate chain
    pub cert_pem: String,

    /// Client private key
    pub key_pem: String,

    /// Extra CA bundle to trust for the scanner certificate
    #[serde(default)]
    pub ca_pem: Option<String>,

    /// Verify the scanner certificate (default: true)
    #[serde(default = "default_reject_unauthorized")]
    pub reject_unauthorized: bool,
}

fn default_reject_unauthorized() -> bool {
    true
}

impl TlsConfig {
    /// Create TLS settings with peer verification enabled
    pub fn new(cert_pem: impl Into<String>, key_pem: impl Into<String>) -> Self {
        Self {
            cert_pem: cert_pem.into(),
            key_pem: key_pem.into(),
            ca_pem: None,
            reject_unauthorized: true,
        }
    }

    /// Load certificate, key and optional CA bundle from PEM files
    pub fn from_files(
        cert: impl AsRef<Path>,
        key: impl AsRef<Path>,
        ca: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let read = |path: &Path| {
            std::fs::read_to_string(path)
                .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))
        };

        Ok(Self {
            cert_pem: read(cert.as_ref())?,
            key_pem: read(key.as_ref())?,
            ca_pem: ca.map(read).transpose()?,
            reject_unauthorized: true,
        })
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("has_cert", &!self.cert_pem.is_empty())
            .field("has_key", &!self.key_pem.is_empty())
            .field("has_ca", &self.ca_pem.is_some())
            .field("reject_unauthorized", &self.reject_unauthorized)
            .finish()
    }
}

/// Timeout configuration
///
/// `request_ms` bounds a single HTTP call, `wait_ms` bounds the whole
/// wait-for-result loop. They are independent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Per-request timeout in milliseconds (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_ms: u64,

    /// Overall wait budget in milliseconds (default: 30s)
    #[serde(default = "default_wait_timeout")]
    pub wait_ms: u64,

    /// Poll interval while waiting in milliseconds (default: 60s)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_timeout(),
            wait_ms: default_wait_timeout(),
            poll_interval_ms: default_poll_interval(),
            connect_ms: default_connect_timeout(),
        }
    }
}

impl TimeoutsConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }
}

fn default_request_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_wait_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_poll_interval() -> u64 {
    60_000 // 1 minute
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

impl KataConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Create a builder for programmatic configuration
    pub fn builder(base_url: impl Into<String>, sensor_id: impl Into<String>) -> KataConfigBuilder {
        KataConfigBuilder::new(base_url, sensor_id)
    }

    /// Base URL with trailing slashes removed
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Builder for [`KataConfig`]
#[derive(Debug, Clone)]
pub struct KataConfigBuilder {
    config: KataConfig,
}

impl KataConfigBuilder {
    /// Create a new builder; the identity starts empty and must be set
    pub fn new(base_url: impl Into<String>, sensor_id: impl Into<String>) -> Self {
        Self {
            config: KataConfig {
                base_url: base_url.into(),
                sensor_id: sensor_id.into(),
                tls: TlsConfig::new(String::new(), String::new()),
                timeouts: TimeoutsConfig::default(),
                debug: false,
            },
        }
    }

    /// Set the client certificate and private key (PEM)
    pub fn identity(mut self, cert_pem: impl Into<String>, key_pem: impl Into<String>) -> Self {
        self.config.tls.cert_pem = cert_pem.into();
        self.config.tls.key_pem = key_pem.into();
        self
    }

    /// Replace all TLS settings
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.config.tls = tls;
        self
    }

    /// Trust an extra CA bundle (PEM)
    pub fn ca(mut self, ca_pem: impl Into<String>) -> Self {
        self.config.tls.ca_pem = Some(ca_pem.into());
        self
    }

    /// Set whether the scanner certificate is verified
    pub fn reject_unauthorized(mut self, reject: bool) -> Self {
        self.config.tls.reject_unauthorized = reject;
        self
    }

    /// Set request timeout in milliseconds
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.request_ms = ms;
        self
    }

    /// Set the overall wait budget in milliseconds
    pub fn wait_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.wait_ms = ms;
        self
    }

    /// Set the wait poll interval in milliseconds
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.poll_interval_ms = ms;
        self
    }

    /// Set connect timeout in milliseconds
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.connect_ms = ms;
        self
    }

    /// Enable debug events
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> KataConfig {
        self.config
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

//! Error types for KATA client operations

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for KATA client operations
pub type Result<T> = std::result::Result<T, KataClientError>;

/// Errors that can occur during KATA client operations
#[derive(Error, Debug)]
pub enum KataClientError {
    /// HTTP request failed at the transport level (connect, TLS, I/O)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The per-request timeout elapsed and the request was aborted
    #[error("Request timed out")]
    Timeout,

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Client identity or CA material could not be loaded
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server answered a state query with a non-success status
    #[error("KATA getScans failed: HTTP {status}")]
    HttpStatus { status: u16 },

    /// Response body could not be parsed as JSON
    #[error(
        "KATA getScans: unexpected content-type {content_type} (HTTP {status}); body starts with: {excerpt}"
    )]
    InvalidBody {
        status: u16,
        content_type: String,
        excerpt: String,
    },

    /// JSON body was neither an array nor a known envelope
    #[error(
        "KATA getScans: unexpected response shape; expected array or {{scans:[]}}, got {found}"
    )]
    UnexpectedShape { found: &'static str },
}

impl KataClientError {
    /// Classify a transport error, separating timeouts from other failures
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }

    /// Create a body error keeping only the first 200 characters of the body
    pub fn invalid_body(status: u16, content_type: impl Into<String>, body: &str) -> Self {
        Self::InvalidBody {
            status,
            content_type: content_type.into(),
            excerpt: body.chars().take(200).collect(),
        }
    }

    /// Whether this error came from the transport rather than the protocol
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_body_excerpt_is_bounded() {
        let body = "x".repeat(500);
        match KataClientError::invalid_body(200, "text/html", &body) {
            KataClientError::InvalidBody {
                status,
                content_type,
                excerpt,
            } => {
                assert_eq!(status, 200);
                assert_eq!(content_type, "text/html");
                assert_eq!(excerpt.chars().count(), 200);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_shape_error_names_runtime_type() {
        let err = KataClientError::UnexpectedShape { found: "string" };
        assert!(err.to_string().ends_with("got string"));
    }
}

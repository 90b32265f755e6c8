//! Error types for the image fetch cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or operating the crate's infrastructure
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML configuration parse error
    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Disk record (de)serialization error
    #[error("Failed to (de)serialize disk record: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[source] reqwest::Error),

    /// Fetch failure surfaced to a caller
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

// =============================================================================
// Fetch Errors
// =============================================================================

/// Failure delivered to fetch waiters.
///
/// Cloned once per waiter when an in-flight fetch fans out, so every variant
/// carries owned, cheaply clonable data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request URL was absent or could not be parsed
    #[error("Invalid request data: {0}")]
    InvalidRequestData(String),

    /// The network returned bytes that did not decode as an image
    #[error("Invalid response data from {url}")]
    InvalidResponseData { url: String },

    /// Transport failure, propagated verbatim from the network layer
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The coordinator's serial worker is no longer running
    #[error("Fetch coordinator has shut down")]
    Shutdown,
}

/// Failures reported by a [`NetworkFetcher`](crate::domain::NetworkFetcher)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Request exceeded the client's timeout
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// Connection could not be established
    #[error("Connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    /// Any other transport-level failure
    #[error("Transport error for {url}: {reason}")]
    Other { url: String, reason: String },
}

/// Bytes could not be decoded into an image
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Image decode failed: {0}")]
pub struct DecodeError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_converts_into_fetch_error() {
        let err: FetchError = TransportError::Status {
            url: "https://cdn.example.com/a.png".to_string(),
            status: 404,
        }
        .into();

        assert_eq!(err.to_string(), "HTTP 404 from https://cdn.example.com/a.png");
    }

    #[test]
    fn test_fetch_error_wraps_into_crate_error() {
        let err: Error = FetchError::Shutdown.into();
        assert!(matches!(err, Error::Fetch(FetchError::Shutdown)));
    }
}

//! HTTP Network Fetcher
//!
//! [`NetworkFetcher`] over a shared `reqwest` client. One attempt per call;
//! non-2xx responses are reported as [`TransportError::Status`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::domain::NetworkFetcher;
use crate::error::{Error, Result, TransportError};

/// Default request timeout
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default `User-Agent` header
pub const DEFAULT_USER_AGENT: &str = concat!("imagefetch/", env!("CARGO_PKG_VERSION"));

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher with the given timeout and user agent
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(Error::Http)?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Classify a reqwest failure
fn transport_error(url: &Url, err: reqwest::Error) -> TransportError {
    let url = url.to_string();
    if err.is_timeout() {
        TransportError::Timeout { url }
    } else if err.is_connect() {
        TransportError::Connect {
            url,
            reason: err.to_string(),
        }
    } else if let Some(status) = err.status() {
        TransportError::Status {
            url,
            status: status.as_u16(),
        }
    } else {
        TransportError::Other {
            url,
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> std::result::Result<Bytes, TransportError> {
        debug!(url = %url, "http fetch");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| transport_error(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client() {
        assert!(HttpFetcher::new(DEFAULT_HTTP_TIMEOUT, DEFAULT_USER_AGENT).is_ok());
    }

    #[test]
    fn test_user_agent_names_crate() {
        assert!(DEFAULT_USER_AGENT.starts_with("imagefetch/"));
    }
}

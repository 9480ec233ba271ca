//! Upstream fetch of the XRay status document.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::trace;
use xray_common::StatusDocument;

/// Request timeout for the upstream GET.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a scrape got no status document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request to {url} timed out")]
    Timeout { url: String },
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("Invalid JSON from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected document from {url}: {source}")]
    Document {
        url: String,
        #[source]
        source: xray_common::Error,
    },
}

/// Fetches and parses the `/debug/vars` page.
///
/// Holds nothing but the URL and a connection-pooling client, so one fetcher
/// can serve any number of concurrent scrapes.
#[derive(Debug, Clone)]
pub struct Fetcher {
    url: String,
    client: reqwest::Client,
}

impl Fetcher {
    /// Create a fetcher with the standard timeout.
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_timeout(url, FETCH_TIMEOUT)
    }

    /// Create a fetcher with a custom request timeout.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// The upstream URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Perform one GET and parse the body.
    pub async fn fetch(&self) -> Result<StatusDocument, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let value: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: self.url.clone(),
                }
            } else {
                FetchError::Body {
                    url: self.url.clone(),
                    source: e,
                }
            }
        })?;

        trace!(url = %self.url, "Fetched status document");

        StatusDocument::from_value(value).map_err(|source| FetchError::Document {
            url: self.url.clone(),
            source,
        })
    }

    fn request_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: self.url.clone(),
            }
        } else {
            FetchError::Request {
                url: self.url.clone(),
                source: e,
            }
        }
    }
}

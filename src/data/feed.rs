//! Upstream SOS feed client
//!
//! Performs conditional retrievals of the published feed, honoring the entity
//! tag from the previous response so unchanged data is never downloaded twice.
//! Retries are not attempted here; the cache coordinator simply tries again on
//! its next refresh cycle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info};

use super::Dataset;

/// Published location of the SOS feed
pub const DEFAULT_FEED_URL: &str = "https://storage.googleapis.com/pple-media/hdy-flood/sos.json";

/// Upper bound for a single upstream request
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur when fetching the feed
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream answered with something other than 200 or 304
    #[error("Upstream API error, Status: {0}")]
    Status(String),

    /// The request did not complete within the configured timeout
    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// The response body was not a valid feed document
    #[error("Failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Whether a later attempt may reasonably succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout(_) | FetchError::Http(_))
    }
}

/// Result of a conditional retrieval
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Upstream sent a new document
    Modified {
        dataset: Dataset,
        /// Entity tag of the new document (empty if upstream sent none)
        etag: String,
    },
    /// Upstream confirmed the caller's copy is current
    NotModified {
        /// The tag the caller sent
        etag: String,
    },
}

/// Capability to retrieve the feed
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the feed, sending `etag` as `If-None-Match` when non-empty
    async fn fetch(&self, etag: &str) -> Result<FetchOutcome, FetchError>;
}

/// Fetcher backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// HTTP client with the request timeout applied
    client: Client,
    /// Feed location (overridable for testing)
    url: String,
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher for `url` with a per-request timeout
    ///
    /// # Returns
    /// * `Ok(HttpFetcher)` on success
    /// * `Err(FetchError::Http)` if the TLS backend cannot be initialized
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sosfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Http)?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    /// Returns the feed location
    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Http(err)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, etag: &str) -> Result<FetchOutcome, FetchError> {
        let mut request = self.client.get(&self.url);
        if !etag.is_empty() {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            debug!(etag, "Upstream not modified");
            return Ok(FetchOutcome::NotModified {
                etag: etag.to_string(),
            });
        }

        if status != StatusCode::OK {
            return Err(FetchError::Status(status.to_string()));
        }

        let new_etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let dataset: Dataset = serde_json::from_slice(&body)?;

        info!(
            records = dataset.records().len(),
            url = %self.url,
            status = %status,
            etag = %new_etag,
            "Fetched upstream dataset"
        );

        Ok(FetchOutcome::Modified {
            dataset,
            etag: new_etag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &str = r#"{"fetched_at":"2025-11-26T08:00:00Z","data":{"data":[{"_id":"a1","location":{"properties":{"province":"Yala"}}}]}}"#;

    async fn fetcher_for(server: &MockServer) -> HttpFetcher {
        HttpFetcher::new(format!("{}/sos.json", server.uri()), FETCH_TIMEOUT)
            .expect("client should build")
    }

    #[tokio::test]
    async fn test_fetch_returns_dataset_and_etag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sos.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_raw(BODY, "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = fetcher_for(&server).await.fetch("").await.unwrap();

        match outcome {
            FetchOutcome::Modified { dataset, etag } => {
                assert_eq!(etag, "\"v1\"");
                assert_eq!(dataset.records().len(), 1);
                assert_eq!(dataset.records()[0].province(), "Yala");
            }
            other => panic!("expected Modified, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_sends_if_none_match_and_honors_304() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sos.json"))
            .and(header("If-None-Match", "\"v1\""))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = fetcher_for(&server).await.fetch("\"v1\"").await.unwrap();

        assert_eq!(
            outcome,
            FetchOutcome::NotModified {
                etag: "\"v1\"".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_reports_status_text_on_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).await.fetch("").await.unwrap_err();

        assert!(matches!(err, FetchError::Status(_)));
        assert!(err.to_string().contains("503"));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_reports_decode_error_for_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).await.fetch("").await.unwrap_err();

        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_times_out_as_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(BODY, "application/json")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(
            format!("{}/sos.json", server.uri()),
            Duration::from_millis(50),
        )
        .unwrap();
        let err = fetcher.fetch("").await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_default_feed_url() {
        let fetcher = HttpFetcher::new(DEFAULT_FEED_URL, FETCH_TIMEOUT).unwrap();
        assert!(fetcher.url().ends_with("sos.json"));
    }
}

//! HTTP text source
//!
//! One GET per poll cycle. Any transport failure or non-success status is a
//! `FetchError`; the body is returned untouched for the decoder.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::trace;

use super::Source;
use crate::error::FetchError;

/// Polls a URL over HTTP
pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    /// Create a source for `url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Source for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<String, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Body {
            url: self.url.clone(),
            source,
        })?;

        trace!(url = %self.url, bytes = body.len(), "Fetched source");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/scoreboard.json")
            .with_status(200)
            .with_body(r#"{"home":"Lions"}"#)
            .create_async()
            .await;

        let source = HttpSource::new(
            format!("{}/scoreboard.json", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();

        let body = source.fetch().await.unwrap();
        assert_eq!(body, r#"{"home":"Lions"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/scoreboard.json")
            .with_status(503)
            .create_async()
            .await;

        let source = HttpSource::new(
            format!("{}/scoreboard.json", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();

        match source.fetch().await {
            Err(FetchError::Status { status, .. }) => assert_eq!(status.as_u16(), 503),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_is_request_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let source = HttpSource::new("http://127.0.0.1:9/", Duration::from_secs(2)).unwrap();
        assert!(matches!(
            source.fetch().await,
            Err(FetchError::Request { .. })
        ));
    }
}

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use crate::{Error, Result};

/// Default per-attempt timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for fetching llms.txt manifests
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    /// Creates a new fetcher with the default 10 second timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Creates a new fetcher whose every request is bounded by `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("llmsx/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client, timeout })
    }

    /// Per-request timeout this fetcher was built with
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` and return its body.
    ///
    /// 4xx and 5xx statuses surface as [`Error::Network`] carrying the
    /// status; an elapsed timeout (connect, headers or body) surfaces as
    /// [`Error::FetchTimeout`].
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        if let Err(err) = response.error_for_status_ref() {
            debug!(status = %response.status(), %url, "candidate returned error status");
            return Err(classify(url, err));
        }

        let content = response.text().await.map_err(|e| classify(url, e))?;
        info!("Fetched {} bytes from {}", content.len(), url);
        Ok(content)
    }

    /// HEAD `url` and return the status code, whatever it is.
    pub async fn head_status(&self, url: &str) -> Result<StatusCode> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;
        Ok(response.status())
    }
}

fn classify(url: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout {
            url: url.to_string(),
        }
    } else {
        Error::Network(err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    #[tokio::test]
    async fn test_fetch_returns_body() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Docs\n"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new()?;
        let body = fetcher.fetch(&format!("{}/llms.txt", server.uri())).await?;
        assert_eq!(body, "# Docs\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_non_success_carries_status() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new()?;
        let err = fetcher
            .fetch(&format!("{}/llms.txt", server.uri()))
            .await
            .unwrap_err();

        match err {
            Error::Network(e) => assert_eq!(e.status(), Some(StatusCode::NOT_FOUND)),
            other => panic!("expected network error, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_classified() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::with_timeout(Duration::from_millis(50))?;
        let err = fetcher
            .fetch(&format!("{}/llms.txt", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FetchTimeout { .. }), "got {err:?}");
        assert!(err.is_recoverable());
        Ok(())
    }

    #[tokio::test]
    async fn test_head_status_reports_any_status() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/llms.txt"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new()?;
        let status = fetcher
            .head_status(&format!("{}/llms.txt", server.uri()))
            .await?;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        Ok(())
    }
}

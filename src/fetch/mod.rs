//! Page retrieval over HTTP(S) or from local files
//!
//! Architecture: Infrastructure Layer - fetchers turn a URL into raw HTML
//! - Network failures, timeouts and non-success statuses all become FetchError
//! - Local files are only reachable through `file` URLs, which the server never accepts

use crate::config::FetchSettings;
use crate::domain::issues::{A11yError, A11yResult};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, instrument};

/// Source of raw page markup
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> A11yResult<String>;
}

/// Fetches pages with reqwest, or reads them from disk for `file` URLs
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with the configured user agent and timeout
    pub fn new(settings: &FetchSettings) -> A11yResult<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| A11yError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn read_file(url: &Url) -> A11yResult<String> {
        let path = url
            .to_file_path()
            .map_err(|_| A11yError::input(format!("Not a local file URL: {url}")))?;

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| A11yError::fetch(url.as_str(), format!("Failed to read {}: {e}", path.display())))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> A11yResult<String> {
        if url.scheme() == "file" {
            return Self::read_file(url).await;
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| A11yError::fetch(url.as_str(), describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(A11yError::fetch(
                url.as_str(),
                format!("Server responded with status {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| A11yError::fetch(url.as_str(), describe(&e)))?;

        debug!(status = %status, bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("Request timed out: {error}")
    } else if error.is_connect() {
        format!("Connection failed: {error}")
    } else {
        error.to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::io::Write;
    use tokio::net::TcpListener;

    /// Fetcher that always returns the same markup
    pub(crate) struct StaticFetcher {
        html: String,
    }

    impl StaticFetcher {
        pub(crate) fn new(html: impl Into<String>) -> Self {
            Self { html: html.into() }
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, _url: &Url) -> A11yResult<String> {
            Ok(self.html.clone())
        }
    }

    /// Serve a small site on an ephemeral port and return its base URL
    pub(crate) async fn serve_fixture_site() -> String {
        let app = Router::new()
            .route(
                "/page",
                get(|| async { axum::response::Html("<title>Fixture</title><img src='a.jpg'>") }),
            )
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "gone") }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}")
    }

    fn fetcher(timeout_ms: u64) -> HttpFetcher {
        HttpFetcher::new(&FetchSettings {
            timeout_ms,
            ..FetchSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let base = serve_fixture_site().await;
        let url = Url::parse(&format!("{base}/page")).unwrap();

        let body = fetcher(5_000).fetch(&url).await.unwrap();
        assert!(body.contains("<img src='a.jpg'>"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let base = serve_fixture_site().await;
        let url = Url::parse(&format!("{base}/missing")).unwrap();

        let err = fetcher(5_000).fetch(&url).await.unwrap_err();
        assert!(matches!(err, A11yError::Fetch { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_timeout_is_fetch_error() {
        let base = serve_fixture_site().await;
        let url = Url::parse(&format!("{base}/slow")).unwrap();

        let err = fetcher(200).fetch(&url).await.unwrap_err();
        assert!(matches!(err, A11yError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        // Bind then drop a listener so the port is very likely closed
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();

        let err = fetcher(2_000).fetch(&url).await.unwrap_err();
        assert!(matches!(err, A11yError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_file_url_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<h1>Local</h1>").unwrap();

        let url = Url::from_file_path(file.path()).unwrap();
        let body = fetcher(1_000).fetch(&url).await.unwrap();
        assert_eq!(body, "<h1>Local</h1>");
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let url = Url::from_file_path(dir.path().join("absent.html")).unwrap();

        let err = fetcher(1_000).fetch(&url).await.unwrap_err();
        assert!(matches!(err, A11yError::Fetch { .. }));
    }
}

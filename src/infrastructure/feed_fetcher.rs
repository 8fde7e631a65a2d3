//! Retailer feed fetching
//!
//! One GET per source per run. Any failure (transport, status, body) is
//! logged and turns into `None`; a failing source never aborts the others.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::domain::FeedRecord;
use crate::infrastructure::http_client::HttpClientConfig;
use crate::infrastructure::source_registry::SourceEntry;

#[derive(Error, Debug)]
pub enum FeedFetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("response body is not JSON: {0}")]
    Body(String),
}

/// Anything that can turn a registry entry into a feed record
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// `None` means the source contributes nothing this run
    async fn fetch(&self, entry: &SourceEntry) -> Option<FeedRecord>;
}

/// Live HTTP implementation
pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new(config: &HttpClientConfig) -> Result<Self, FeedFetchError> {
        let client = config
            .build_client()
            .map_err(|e| FeedFetchError::Request(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn try_fetch(&self, entry: &SourceEntry) -> Result<Value, FeedFetchError> {
        let response = self
            .client
            .get(&entry.url)
            .send()
            .await
            .map_err(|e| FeedFetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedFetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedFetchError::Request(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| FeedFetchError::Body(e.to_string()))
    }
}

#[async_trait]
impl FeedSource for HttpFeedFetcher {
    async fn fetch(&self, entry: &SourceEntry) -> Option<FeedRecord> {
        info!("🌐 Fetching {} feed: {}", entry.name, entry.url);

        match self.try_fetch(entry).await {
            Ok(payload) => Some(FeedRecord::new(entry.name.clone(), payload)),
            Err(e) => {
                error!("❌ Failed to fetch data from {}: {}", entry.name, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers one request with a canned HTTP response; returns the base URL
    async fn serve_once(status_line: &'static str, content_type: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                content_type,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_server_error_yields_none() {
        let base = serve_once("503 Service Unavailable", "application/json", r#"{"stations": []}"#).await;
        let fetcher = HttpFeedFetcher::new(&HttpClientConfig::new("test-agent", 2)).unwrap();

        assert!(fetcher.fetch(&SourceEntry::new("Busy", format!("{}/fuel.json", base))).await.is_none());
    }

    #[tokio::test]
    async fn test_html_body_yields_none() {
        let base = serve_once("200 OK", "text/html", "<html><body>Access denied</body></html>").await;
        let fetcher = HttpFeedFetcher::new(&HttpClientConfig::new("test-agent", 2)).unwrap();

        assert!(fetcher.fetch(&SourceEntry::new("Blocked", format!("{}/fuel.json", base))).await.is_none());
    }

    #[tokio::test]
    async fn test_json_body_is_returned() {
        let base = serve_once("200 OK", "application/json", r#"{"last_updated": "01/06/2024 10:00:00", "stations": []}"#).await;
        let fetcher = HttpFeedFetcher::new(&HttpClientConfig::new("test-agent", 2)).unwrap();

        let record = fetcher.fetch(&SourceEntry::new("Alpha", format!("{}/fuel.json", base))).await.unwrap();
        assert_eq!(record.source, "Alpha");
        assert_eq!(record.payload["last_updated"], "01/06/2024 10:00:00");
    }

    #[tokio::test]
    async fn test_unreachable_source_yields_none() {
        let fetcher = HttpFeedFetcher::new(&HttpClientConfig::new("test-agent", 2)).unwrap();
        // Port 9 (discard) is closed on loopback
        let entry = SourceEntry::new("Nowhere", "http://127.0.0.1:9/fuel.json");

        assert!(fetcher.fetch(&entry).await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_yields_none() {
        let fetcher = HttpFeedFetcher::new(&HttpClientConfig::new("test-agent", 2)).unwrap();
        let entry = SourceEntry::new("Broken", "not a url");

        assert!(fetcher.fetch(&entry).await.is_none());
    }
}

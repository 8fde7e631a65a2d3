//! Detail page fetching

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::CrawlError;
use crate::infrastructure::http_client::HttpClientConfig;

/// Source of raw detail page HTML
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, CrawlError>;
}

/// Live pages over HTTP.
///
/// Every call builds its own client, so no cookies or connections leak from
/// one product to the next.
pub struct HttpPageSource {
    config: HttpClientConfig,
}

impl HttpPageSource {
    pub fn new(config: HttpClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, url: &str) -> Result<String, CrawlError> {
        let parsed_url =
            Url::parse(url).map_err(|e| CrawlError::InvalidInput(format!("Invalid URL '{}': {}", url, e)))?;

        let client = self
            .config
            .build_client()
            .map_err(|e| CrawlError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        debug!("🌐 HTTP GET: {}", parsed_url);
        let response = client
            .get(parsed_url)
            .send()
            .await
            .map_err(|e| CrawlError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::HttpError(status.as_u16(), format!("HTTP {} for {}", status, url)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::NetworkError(format!("Failed to read response body: {}", e)))?;

        if body.trim().is_empty() {
            return Err(CrawlError::NetworkError(format!("Empty response from {}", url)));
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_input_error() {
        let source = HttpPageSource::new(HttpClientConfig::new("test-agent", 2));
        let err = source.fetch_page("/product/relative").await.unwrap_err();
        assert!(matches!(err, CrawlError::InvalidInput(_)));
        assert!(err.is_item_failure());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let source = HttpPageSource::new(HttpClientConfig::new("test-agent", 2));
        let err = source.fetch_page("http://127.0.0.1:9/product/1").await.unwrap_err();
        assert!(matches!(err, CrawlError::NetworkError(_)));
    }
}

//! HTTP client construction
//!
//! Feed fetching and detail-page crawling both issue single, unretried GETs
//! with a browser user agent and a bounded timeout.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

/// Configuration for HTTP client behavior
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
    /// Keep cookies between requests made with the same client
    pub cookie_store: bool,
}

impl HttpClientConfig {
    pub fn new(user_agent: impl Into<String>, timeout_seconds: u64) -> Self {
        Self {
            timeout_seconds,
            user_agent: user_agent.into(),
            cookie_store: true,
        }
    }

    pub fn build_client(&self) -> Result<Client, reqwest::Error> {
        ClientBuilder::new()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .user_agent(&self.user_agent)
            .cookie_store(self.cookie_store)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
    }
}

//! Rendered detail pages through headless Chromium
//!
//! Product pages fill in prices client-side, so the HTML handed to the parser
//! is the DOM after the page has gone network-idle. Each call launches its own
//! browser and closes it afterwards: no cookies, storage or cache survive from
//! one item to the next.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::EventLifecycleEvent;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tracing::{debug, warn};
use url::Url;

use super::{CrawlError, PageSource};

/// CDP lifecycle event fired once no requests have been in flight for 500ms
const NETWORK_IDLE: &str = "networkIdle";

pub struct BrowserPageSource {
    executable: Option<PathBuf>,
    user_agent: String,
    request_timeout: Duration,
    idle_timeout: Duration,
}

impl BrowserPageSource {
    pub fn new(user_agent: impl Into<String>, request_timeout_seconds: u64, idle_timeout_seconds: u64) -> Self {
        Self {
            executable: None,
            user_agent: user_agent.into(),
            request_timeout: Duration::from_secs(request_timeout_seconds),
            idle_timeout: Duration::from_secs(idle_timeout_seconds),
        }
    }

    /// Use a specific Chrome/Chromium binary
    pub fn with_executable(mut self, executable: Option<PathBuf>) -> Self {
        self.executable = executable;
        self
    }

    fn browser_config(&self) -> Result<BrowserConfig, CrawlError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(self.request_timeout)
            .arg(format!("--user-agent={}", self.user_agent));
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|e| CrawlError::NetworkError(format!("Invalid browser configuration: {}", e)))
    }

    async fn render(&self, browser: &Browser, url: &str) -> Result<String, CrawlError> {
        let network = |e: chromiumoxide::error::CdpError| CrawlError::NetworkError(format!("{}: {}", url, e));

        let page: Page = browser.new_page("about:blank").await.map_err(network)?;
        let mut lifecycle = page.event_listener::<EventLifecycleEvent>().await.map_err(network)?;

        page.goto(url).await.map_err(network)?;

        let idle = async {
            while let Some(event) = lifecycle.next().await {
                if event.name == NETWORK_IDLE {
                    break;
                }
            }
        };
        if tokio::time::timeout(self.idle_timeout, idle).await.is_err() {
            debug!("⏳ {} not network-idle after {:?}, using current DOM", url, self.idle_timeout);
        }

        let html = page.content().await.map_err(network)?;
        if html.trim().is_empty() {
            return Err(CrawlError::NetworkError(format!("Empty page from {}", url)));
        }
        Ok(html)
    }
}

#[async_trait]
impl PageSource for BrowserPageSource {
    async fn fetch_page(&self, url: &str) -> Result<String, CrawlError> {
        Url::parse(url).map_err(|e| CrawlError::InvalidInput(format!("Invalid URL '{}': {}", url, e)))?;

        let (mut browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| CrawlError::NetworkError(format!("Failed to launch browser: {}", e)))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!("🧭 Rendering: {}", url);
        let result = self.render(&browser, url).await;

        if let Err(e) = browser.close().await {
            warn!("⚠️ Failed to close browser for {}: {}", url, e);
        }
        let _ = browser.wait().await;
        handler_task.abort();

        result
    }
}

//! Configuration infrastructure
//!
//! Contains configuration loading and management for feed ingestion and the
//! product detail crawler.
//!
//! Configuration is a single JSON document split into sections:
//! 1. `ingest` - feed fetching, snapshot location, run mode
//! 2. `crawl` - item list, output log, progress cursor, workers, page renderer
//! 3. `store` - station database
//! 4. `logging` - log level and outputs
//! 5. `parsing` - CSS selectors for the grocery pages
//!
//! Every section is `#[serde(default)]`, so a partial file only overrides
//! what it mentions.

#![allow(clippy::uninlined_format_args)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::infrastructure::parsing::ParsingConfig;
use crate::infrastructure::source_registry::SourceEntry;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ingest: IngestConfig,
    pub crawl: CrawlConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub parsing: ParsingConfig,
}

/// Feed ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Root directory holding one sub-directory of snapshots per source slug
    pub snapshot_dir: PathBuf,

    /// Rebuild the dataset from stored snapshots instead of fetching live feeds
    pub replay: bool,

    /// User agent sent with every feed request
    pub user_agent: String,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Feed list override; empty means the built-in UK retailer list
    pub sources: Vec<SourceEntry>,
}

/// Product detail crawler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// JSON array of items produced by discovery
    pub items_file: PathBuf,

    /// Append-only JSON Lines output
    pub output_file: PathBuf,

    /// Plain-text cursor file
    pub progress_file: PathBuf,

    /// Number of concurrent workers
    pub workers: usize,

    /// User agent for detail page requests
    pub user_agent: String,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// How detail pages are loaded
    pub renderer: PageRenderer,

    /// Chrome/Chromium binary; `None` searches the usual install locations
    pub browser_executable: Option<PathBuf>,

    /// Longest wait for the rendered page to go network-idle, in seconds
    pub network_idle_timeout_seconds: u64,
}

/// Detail page loader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageRenderer {
    /// Headless Chromium, one browser per item, waiting for network idle
    #[default]
    Headless,
    /// Plain HTTP GET of the server-rendered HTML
    Http,
}

/// Station database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite connection string
    pub database_url: String,

    /// Write ingested rows to the database
    pub enabled: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; defaults to `logs/` next to the executable
    pub log_dir: Option<PathBuf>,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Module-specific log level filters (e.g., "sqlx": "warn", "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from(defaults::SNAPSHOT_DIR),
            replay: false,
            user_agent: uk_fuel::BROWSER_USER_AGENT.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            sources: Vec::new(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            items_file: PathBuf::from(defaults::CRAWL_ITEMS_FILE),
            output_file: PathBuf::from(defaults::CRAWL_OUTPUT_FILE),
            progress_file: PathBuf::from(defaults::CRAWL_PROGRESS_FILE),
            workers: defaults::CRAWL_WORKERS,
            user_agent: groceries::BROWSER_USER_AGENT.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            renderer: PageRenderer::default(),
            browser_executable: None,
            network_idle_timeout_seconds: defaults::NETWORK_IDLE_TIMEOUT_SECONDS,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::DATABASE_URL.to_string(),
            enabled: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            max_files: defaults::LOG_MAX_FILES,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters.insert("selectors".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("petro-ingest");

        Ok(config_dir)
    }

    /// Configuration manager for the per-user default location
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        let config_path = config_dir.join("petro_ingest_config.json");

        Ok(Self { config_path })
    }

    /// Configuration manager for an explicit file
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        if fs::metadata(&self.config_path).await.is_err() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("⚠️  Configuration parse error: {}", parse_error);
                warn!("⚠️  Resetting to default configuration");

                // Keep the broken file around for inspection
                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;

                info!("✅ Reset to default configuration");
                Ok(default_config)
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// UK retailer fuel price feeds (CMA open data scheme)
pub mod uk_fuel {
    /// Browser user agent; several retailers reject non-browser clients
    pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";

    /// (retailer display name, feed URL) in ingestion order
    pub const RETAILER_FEEDS: &[(&str, &str)] = &[
        ("Applegreen UK", "https://applegreenstores.com/fuel-prices/data.json"),
        ("Ascona Group", "https://fuelprices.asconagroup.co.uk/newfuel.json"),
        ("ASDA", "https://storelocator.asda.com/fuel_prices_data.json"),
        ("BP", "https://www.bp.com/en_gb/united-kingdom/home/fuelprices/fuel_prices_data.json"),
        ("Esso", "https://fuelprices.esso.co.uk/latestdata.json"),
        ("JET Retail UK", "https://jetlocal.co.uk/fuel_prices_data.json"),
        ("Morrisons", "https://www.morrisons.com/fuel-prices/fuel.json"),
        ("Moto", "https://moto-way.com/fuel-price/fuel_prices.json"),
        ("Motor Fuel Group", "https://fuel.motorfuelgroup.com/fuel_prices_data.json"),
        ("Rontec", "https://www.rontec-servicestations.co.uk/fuel-prices/data/fuel_prices_data.json"),
        ("Sainsburys", "https://api.sainsburys.co.uk/v1/exports/latest/fuel_prices_data.json"),
        ("SGN", "https://www.sgnretail.uk/files/data/SGN_daily_fuel_prices.json"),
        ("Shell", "https://www.shell.co.uk/fuel-prices-data.html"),
        ("Tesco", "https://www.tesco.com/fuel_prices/fuel_prices_data.json"),
    ];

    /// Postcode of the Gibraltar station some feeds include; excluded from UK summaries
    pub const EXCLUDED_POSTCODE: &str = "GX11 1AA";
}

/// Grocery site constants for discovery and detail crawling
pub mod groceries {
    /// Base URL product links are resolved against
    pub const BASE_URL: &str = "https://groceries.asda.com";

    /// Linux browser user agent used for page fetches
    pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";

    /// Query parameter carrying the listing page number
    pub const PAGE_QUERY_PARAM: &str = "page";
}

/// Default configuration values
pub mod defaults {
    /// Default snapshot root directory
    pub const SNAPSHOT_DIR: &str = "files";

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Default crawl item list
    pub const CRAWL_ITEMS_FILE: &str = "offer_products.json";

    /// Default crawl output log
    pub const CRAWL_OUTPUT_FILE: &str = "offer_products_details.json";

    /// Default crawl progress cursor file
    pub const CRAWL_PROGRESS_FILE: &str = "progress.txt";

    /// Default number of crawl workers
    pub const CRAWL_WORKERS: usize = 5;

    /// Default network-idle wait for rendered pages
    pub const NETWORK_IDLE_TIMEOUT_SECONDS: u64 = 10;

    /// Default station database
    pub const DATABASE_URL: &str = "sqlite:data/petro.db";

    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    /// Default JSON format setting
    pub const LOG_JSON_FORMAT: bool = false;

    /// Default console output setting
    pub const LOG_CONSOLE_OUTPUT: bool = true;

    /// Default file output setting
    pub const LOG_FILE_OUTPUT: bool = true;

    /// Default maximum log files to keep
    pub const LOG_MAX_FILES: u32 = 5;
}

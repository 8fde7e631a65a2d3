//! Infrastructure layer
//!
//! Configuration, logging, HTTP, feed fetching, snapshot files, HTML parsing
//! and the station database.

pub mod config;
pub mod feed_fetcher;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod snapshot_writer;
pub mod source_registry;
pub mod station_store;

pub use config::{AppConfig, ConfigManager};
pub use feed_fetcher::{FeedFetchError, FeedSource, HttpFeedFetcher};
pub use http_client::HttpClientConfig;
pub use parsing::{ParsingConfig, ParsingError, ParsingResult, ProductDetailParser, ProductListParser};
pub use snapshot_writer::{SnapshotError, SnapshotWriter};
pub use source_registry::{SourceEntry, SourceRegistry};
pub use station_store::{StationStore, StoreError};

//! petro-ingest - UK fuel price ingestion and grocery detail crawling
//!
//! Two independent pipelines share one configuration and logging stack:
//!
//! - **Ingestion**: fetch every retailer fuel-price feed, keep a raw
//!   timestamped snapshot per source, normalize stations into one dataset and
//!   store it. Snapshots can be replayed to rebuild the dataset offline.
//! - **Crawling**: discover product links from grocery aisle pages, then
//!   scrape each product detail page with a bounded worker pool that resumes
//!   from a persisted cursor after a crash.

pub mod application;
pub mod commands;
pub mod crawling;
pub mod domain;
pub mod infrastructure;

//! # Domain Module
//!
//! Plain data structures shared by the ingestion and crawl pipelines.
//! - Explicit module files, no `mod.rs`
//! - No I/O here: fetching, persistence and parsing live in `infrastructure`

pub mod crawl;
pub mod snapshot;
pub mod station;
pub mod timestamp;

pub use crawl::{Classifications, CrawlItem, DetailRecord, Provenance};
pub use snapshot::{slugify, SnapshotName, SnapshotNameError, CANONICAL_TIMESTAMP_FORMAT};
pub use station::{CombinedDataset, FeedRecord, FuelGrade, StationRow};
pub use timestamp::{TimestampError, TimestampPolicy};

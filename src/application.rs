//! Application layer module
//!
//! Turns raw feed records into the combined station dataset.

pub mod aggregator;
pub mod normalizer;

pub use aggregator::{AggregationReport, Aggregator, IngestMode, SourceOutcome, SourceStatus};
pub use normalizer::normalize;

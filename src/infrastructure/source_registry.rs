//! Retailer feed registry
//!
//! Fixed, ordered list of (display name, feed URL) pairs. Ingestion order is
//! registry order; the slug derived from a name is the snapshot directory.

use serde::{Deserialize, Serialize};

use crate::domain::{TimestampPolicy, slugify};
use crate::infrastructure::config::uk_fuel;

/// One retailer feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Human-readable retailer name, attached to every row from this feed
    pub name: String,
    /// Absolute feed URL
    pub url: String,
    /// Which `last_updated` shapes this feed may publish
    #[serde(default)]
    pub timestamp_policy: TimestampPolicy,
}

impl SourceEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            timestamp_policy: TimestampPolicy::Auto,
        }
    }

    pub fn with_policy(mut self, policy: TimestampPolicy) -> Self {
        self.timestamp_policy = policy;
        self
    }

    /// Snapshot directory / file prefix for this source
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Ordered, read-only list of sources
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    entries: Vec<SourceEntry>,
}

impl SourceRegistry {
    pub fn new(entries: Vec<SourceEntry>) -> Self {
        Self { entries }
    }

    /// The built-in UK retailer feeds
    pub fn uk_retailers() -> Self {
        Self::new(
            uk_fuel::RETAILER_FEEDS
                .iter()
                .map(|(name, url)| SourceEntry::new(*name, *url))
                .collect(),
        )
    }

    /// Configured override when non-empty, built-in list otherwise
    pub fn from_config(sources: &[SourceEntry]) -> Self {
        if sources.is_empty() {
            Self::uk_retailers()
        } else {
            Self::new(sources.to_vec())
        }
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<&SourceEntry> {
        self.entries.iter().find(|entry| entry.slug() == slug)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uk_registry_order_and_slugs() {
        let registry = SourceRegistry::uk_retailers();
        assert_eq!(registry.len(), 14);
        assert_eq!(registry.entries()[0].name, "Applegreen UK");
        assert_eq!(registry.entries()[13].name, "Tesco");

        let slugs: HashSet<String> = registry.entries().iter().map(SourceEntry::slug).collect();
        assert_eq!(slugs.len(), registry.len(), "slugs must be unique");
        assert!(registry.entries().iter().all(|e| e.url.starts_with("https://")));
    }

    #[test]
    fn test_find_by_slug() {
        let registry = SourceRegistry::uk_retailers();
        let entry = registry.find_by_slug("motor-fuel-group").unwrap();
        assert_eq!(entry.name, "Motor Fuel Group");
        assert!(registry.find_by_slug("nope").is_none());
    }

    #[test]
    fn test_config_override() {
        let custom = vec![SourceEntry::new("Local", "http://127.0.0.1/feed.json").with_policy(TimestampPolicy::DayFirst)];
        let registry = SourceRegistry::from_config(&custom);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].timestamp_policy, TimestampPolicy::DayFirst);

        assert_eq!(SourceRegistry::from_config(&[]).len(), 14);
    }
}

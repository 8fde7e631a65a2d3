//! Snapshot file naming
//!
//! A snapshot is stored as `{slug}_{YYYY-MM-DD_HH-MM-SS}.{ext}`. Slugs never
//! contain `_`, so the first underscore always separates slug from timestamp.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// The single timestamp format used in snapshot file names (UTC)
pub const CANONICAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Default snapshot extension
pub const SNAPSHOT_EXTENSION: &str = "json";

/// Turn a retailer display name into a filesystem-safe token.
///
/// Lowercase ASCII alphanumerics are kept, every other run of characters
/// collapses into a single `-`, apostrophes are dropped. Empty results
/// become `unknown`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars() {
        if ch == '\'' || ch == '\u{2019}' {
            continue;
        }
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}

fn is_slug(candidate: &str) -> bool {
    !candidate.is_empty()
        && !candidate.starts_with('-')
        && !candidate.ends_with('-')
        && candidate
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotNameError {
    #[error("'{0}' has no file extension")]
    MissingExtension(String),

    #[error("'{0}' has no slug/timestamp separator")]
    MissingSeparator(String),

    #[error("'{file_name}' has an invalid slug '{slug}'")]
    InvalidSlug { file_name: String, slug: String },

    #[error("'{file_name}' has an invalid timestamp: {reason}")]
    InvalidTimestamp { file_name: String, reason: String },
}

/// Parsed form of a snapshot file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotName {
    pub slug: String,
    pub timestamp: NaiveDateTime,
    pub extension: String,
}

impl SnapshotName {
    pub fn new(source: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            slug: slugify(source),
            timestamp: timestamp.naive_utc(),
            extension: SNAPSHOT_EXTENSION.to_string(),
        }
    }

    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        self.timestamp.and_utc()
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(CANONICAL_TIMESTAMP_FORMAT).to_string()
    }

    pub fn parse(file_name: &str) -> Result<Self, SnapshotNameError> {
        let (stem, extension) = file_name
            .rsplit_once('.')
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .ok_or_else(|| SnapshotNameError::MissingExtension(file_name.to_string()))?;

        let (slug, raw_timestamp) = stem
            .split_once('_')
            .ok_or_else(|| SnapshotNameError::MissingSeparator(file_name.to_string()))?;

        if !is_slug(slug) {
            return Err(SnapshotNameError::InvalidSlug {
                file_name: file_name.to_string(),
                slug: slug.to_string(),
            });
        }

        let timestamp = NaiveDateTime::parse_from_str(raw_timestamp, CANONICAL_TIMESTAMP_FORMAT)
            .map_err(|e| SnapshotNameError::InvalidTimestamp {
                file_name: file_name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            slug: slug.to_string(),
            timestamp,
            extension: extension.to_string(),
        })
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}.{}", self.slug, self.formatted_timestamp(), self.extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_slugify_retailer_names() {
        assert_eq!(slugify("Applegreen UK"), "applegreen-uk");
        assert_eq!(slugify("ASDA"), "asda");
        assert_eq!(slugify("JET Retail UK"), "jet-retail-uk");
        assert_eq!(slugify("  Motor  Fuel_Group! "), "motor-fuel-group");
        assert_eq!(slugify("Sainsbury's"), "sainsburys");
        assert_eq!(slugify("***"), "unknown");
    }

    #[test]
    fn test_snapshot_name_format() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 5, 7).unwrap();
        let name = SnapshotName::new("Motor Fuel Group", at);
        assert_eq!(name.to_string(), "motor-fuel-group_2024-06-01_09-05-07.json");
    }

    #[test]
    fn test_parse_rejects_foreign_files() {
        assert!(SnapshotName::parse("README").is_err());
        assert!(SnapshotName::parse("notes.txt").is_err());
        assert!(SnapshotName::parse("Bad Slug_2024-06-01_09-05-07.json").is_err());
        assert!(SnapshotName::parse("bp_01_06_2024_09_05_07.json").is_err());
    }

    proptest! {
        #[test]
        fn slug_is_always_filesystem_safe(name in ".{0,40}") {
            let slug = slugify(&name);
            prop_assert!(is_slug(&slug));
            prop_assert!(!slug.contains('_'));
            prop_assert!(!slug.contains('/'));
        }
    }
}

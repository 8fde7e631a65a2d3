//! Feed timestamp adaptation
//!
//! Retailers publish `last_updated` either as epoch seconds or as a
//! day-first `dd/mm/YYYY HH:MM:SS` string. Which shapes a source may use is a
//! per-source policy; the result is always a UTC instant.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Day-first format used by the string-valued feeds
pub const DAY_FIRST_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Which timestamp shapes a source is allowed to publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// Accept both epoch seconds and day-first strings
    #[default]
    Auto,
    /// Integer seconds since the Unix epoch only
    EpochSeconds,
    /// `dd/mm/YYYY HH:MM:SS` strings only
    DayFirst,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("malformed timestamp {value}: {reason}")]
    Malformed { value: String, reason: String },

    #[error("timestamp {value} is a {kind}, which the {policy:?} policy does not accept")]
    Unsupported {
        value: String,
        kind: &'static str,
        policy: TimestampPolicy,
    },

    #[error("epoch timestamp {0} is out of range")]
    OutOfRange(i64),
}

impl TimestampPolicy {
    fn accepts_epoch(self) -> bool {
        matches!(self, TimestampPolicy::Auto | TimestampPolicy::EpochSeconds)
    }

    fn accepts_day_first(self) -> bool {
        matches!(self, TimestampPolicy::Auto | TimestampPolicy::DayFirst)
    }

    /// Resolve a raw vendor value; an absent or null value yields `fallback`
    pub fn resolve(
        self,
        raw: Option<&Value>,
        fallback: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, TimestampError> {
        match raw {
            None | Some(Value::Null) => Ok(fallback),
            Some(Value::Number(number)) => {
                if !self.accepts_epoch() {
                    return Err(TimestampError::Unsupported {
                        value: number.to_string(),
                        kind: "number",
                        policy: self,
                    });
                }
                let seconds = number.as_i64().ok_or_else(|| TimestampError::Malformed {
                    value: number.to_string(),
                    reason: "epoch value is not a whole number of seconds".to_string(),
                })?;
                if seconds < 0 {
                    return Err(TimestampError::OutOfRange(seconds));
                }
                DateTime::from_timestamp(seconds, 0).ok_or(TimestampError::OutOfRange(seconds))
            }
            Some(Value::String(text)) => {
                if !self.accepts_day_first() {
                    return Err(TimestampError::Unsupported {
                        value: text.clone(),
                        kind: "string",
                        policy: self,
                    });
                }
                NaiveDateTime::parse_from_str(text.trim(), DAY_FIRST_FORMAT)
                    .map(|naive| naive.and_utc())
                    .map_err(|e| TimestampError::Malformed {
                        value: text.clone(),
                        reason: e.to_string(),
                    })
            }
            Some(other) => Err(TimestampError::Malformed {
                value: other.to_string(),
                reason: "expected a number or a string".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn fallback() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[rstest]
    #[case(json!(1_717_243_200), Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())]
    #[case(json!("01/06/2024 12:00:00"), Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())]
    #[case(json!(" 25/12/2023 08:30:15 "), Utc.with_ymd_and_hms(2023, 12, 25, 8, 30, 15).unwrap())]
    fn test_auto_policy_accepts_both_shapes(#[case] raw: Value, #[case] expected: DateTime<Utc>) {
        assert_eq!(TimestampPolicy::Auto.resolve(Some(&raw), fallback()).unwrap(), expected);
    }

    #[rstest]
    #[case(json!("2024-06-01 12:00:00"))]
    #[case(json!("13/13/2024 12:00:00"))]
    #[case(json!(1_717_243_200.5))]
    #[case(json!(-5))]
    #[case(json!(true))]
    fn test_malformed_values_are_rejected(#[case] raw: Value) {
        assert!(TimestampPolicy::Auto.resolve(Some(&raw), fallback()).is_err());
    }

    #[test]
    fn test_missing_value_uses_fallback() {
        assert_eq!(TimestampPolicy::Auto.resolve(None, fallback()).unwrap(), fallback());
        assert_eq!(
            TimestampPolicy::DayFirst.resolve(Some(&Value::Null), fallback()).unwrap(),
            fallback()
        );
    }

    #[test]
    fn test_source_policy_restricts_shape() {
        let epoch = json!(1_717_243_200);
        let text = json!("01/06/2024 12:00:00");

        assert!(matches!(
            TimestampPolicy::DayFirst.resolve(Some(&epoch), fallback()),
            Err(TimestampError::Unsupported { kind: "number", .. })
        ));
        assert!(matches!(
            TimestampPolicy::EpochSeconds.resolve(Some(&text), fallback()),
            Err(TimestampError::Unsupported { kind: "string", .. })
        ));
    }
}

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch, always finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpochSeconds(f64);

impl EpochSeconds {
    pub fn new(secs: f64) -> Result<Self, TimestampError> {
        if secs.is_finite() {
            Ok(Self(secs))
        } else {
            Err(TimestampError::NonFinite(secs))
        }
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl fmt::Display for EpochSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// A point in time in whatever representation it arrived in.
///
/// Every timestamp that reaches the aggregation core goes through
/// [`TimeValue::to_epoch_seconds`], whether it came from a query string,
/// an ingest payload or the store itself.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeValue {
    EpochSeconds(f64),
    EpochMillis(i64),
    Calendar(DateTime<Utc>),
    /// A float literal, an RFC 3339 timestamp, or `YYYY-MM-DD HH:MM:SS[.f]` (UTC)
    Text(String),
}

impl TimeValue {
    pub fn to_epoch_seconds(&self) -> Result<EpochSeconds, TimestampError> {
        let secs = match self {
            TimeValue::EpochSeconds(s) => *s,
            TimeValue::EpochMillis(ms) => *ms as f64 / 1000.0,
            TimeValue::Calendar(dt) => calendar_seconds(dt),
            TimeValue::Text(raw) => parse_text(raw)?,
        };
        EpochSeconds::new(secs)
    }
}

impl From<f64> for TimeValue {
    fn from(secs: f64) -> Self {
        TimeValue::EpochSeconds(secs)
    }
}

impl From<DateTime<Utc>> for TimeValue {
    fn from(dt: DateTime<Utc>) -> Self {
        TimeValue::Calendar(dt)
    }
}

impl From<&str> for TimeValue {
    fn from(raw: &str) -> Self {
        TimeValue::Text(raw.to_string())
    }
}

fn calendar_seconds(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9
}

fn parse_text(raw: &str) -> Result<f64, TimestampError> {
    let trimmed = raw.trim();

    if let Ok(secs) = trimmed.parse::<f64>() {
        return Ok(secs);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(calendar_seconds(&dt.with_timezone(&Utc)));
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| calendar_seconds(&naive.and_utc()))
        .map_err(|_| TimestampError::Unparseable(raw.to_string()))
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimestampError {
    #[error("Cannot interpret '{0}' as a timestamp")]
    Unparseable(String),

    #[error("Timestamp must be finite, got {0}")]
    NonFinite(f64),
}

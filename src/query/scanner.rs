//! Contract between the downsampling core and whatever holds the raw samples.
//!
//! The core never builds query text. It hands the store an [`AggregateQuery`]
//! carrying the exact `f64` window and bucket width it will later use to build
//! the time axis, so bucket assignment cannot drift between the two steps.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::planner::{BucketPlan, QueryWindow};
use crate::data::{EpochSeconds, SeriesFilter, TimestampError};

/// Series id used for rows that aggregate every matching series together.
pub const COMBINED_SERIES_ID: &str = "*";

/// Aggregate applied to the samples of one `(bucket, series)` group.
///
/// `Mean` is what charts get unless the caller asks otherwise. `Min` and
/// `Max` keep spikes visible and return the same row shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    #[default]
    Mean,
    Min,
    Max,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFunction::Mean => "mean",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        };
        f.write_str(name)
    }
}

impl FromStr for AggregateFunction {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" | "avg" => Ok(AggregateFunction::Mean),
            "min" => Ok(AggregateFunction::Min),
            "max" => Ok(AggregateFunction::Max),
            other => Err(ScanError::UnsupportedAggregate(other.to_string())),
        }
    }
}

/// How rows are keyed on the series axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SeriesGrouping {
    /// One row per `(bucket, series)`
    #[default]
    PerSeries,
    /// One row per bucket over all matching series, labelled [`COMBINED_SERIES_ID`]
    Combined,
}

/// Typed plan for one bucketed aggregate scan.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub window: QueryWindow,
    pub plan: BucketPlan,
    pub filter: SeriesFilter,
    pub function: AggregateFunction,
    pub grouping: SeriesGrouping,
}

impl AggregateQuery {
    /// `floor((t - start) / width)`. Callers must already have checked that
    /// `t` lies inside the window.
    pub fn bucket_index(&self, timestamp: f64) -> i64 {
        ((timestamp - self.window.start) / self.plan.bucket_width).floor() as i64
    }
}

/// One non-empty `(bucket, series)` aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub bucket_index: i64,
    pub series_id: String,
    pub value: f64,
}

impl AggregateRow {
    pub fn new(bucket_index: i64, series_id: impl Into<String>, value: f64) -> Self {
        Self {
            bucket_index,
            series_id: series_id.into(),
            value,
        }
    }
}

/// Read-only access a sample store must provide to the downsampling core.
///
/// Implementations must be safe for many concurrent readers.
pub trait AggregateScanner: Send + Sync {
    /// Smallest and largest sample timestamp among series matching `filter`,
    /// or `None` when nothing matches.
    fn range_extent(
        &self,
        filter: &SeriesFilter,
    ) -> Result<Option<(EpochSeconds, EpochSeconds)>, ScanError>;

    /// Bucketed aggregate over samples with `start <= t <= end`.
    ///
    /// Rows may come back in any order; empty buckets produce no row.
    fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<AggregateRow>, ScanError>;

    /// Every known series id, sorted.
    fn series_ids(&self) -> Result<Vec<String>, ScanError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    #[error("Sample store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Unsupported aggregate '{0}' (expected mean, min or max)")]
    UnsupportedAggregate(String),

    #[error("Store returned an invalid timestamp: {0}")]
    Timestamp(#[from] TimestampError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aggregate_function() {
        assert_eq!("mean".parse::<AggregateFunction>().unwrap(), AggregateFunction::Mean);
        assert_eq!("AVG".parse::<AggregateFunction>().unwrap(), AggregateFunction::Mean);
        assert_eq!(" max ".parse::<AggregateFunction>().unwrap(), AggregateFunction::Max);
        assert!(matches!(
            "median".parse::<AggregateFunction>(),
            Err(ScanError::UnsupportedAggregate(_))
        ));
    }

    #[test]
    fn test_bucket_index() {
        let query = AggregateQuery {
            window: QueryWindow::new(100.0, 200.0),
            plan: BucketPlan {
                bucket_width: 10.0,
                bucket_count: 10,
            },
            filter: SeriesFilter::all(),
            function: AggregateFunction::Mean,
            grouping: SeriesGrouping::PerSeries,
        };

        assert_eq!(query.bucket_index(100.0), 0);
        assert_eq!(query.bucket_index(109.999), 0);
        assert_eq!(query.bucket_index(110.0), 1);
        assert_eq!(query.bucket_index(200.0), 10);
    }
}

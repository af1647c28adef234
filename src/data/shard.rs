use fxhash::{FxHashMap, FxHashSet};
use parking_lot::RwLock;

use crate::query::aggregates::{create_accumulator, Accumulator};
use crate::query::scanner::{AggregateQuery, SeriesGrouping};

/// Series key used for rows aggregated across every series
pub const COMBINED_SERIES_KEY: u32 = u32::MAX;

/// Partial aggregates keyed by `(bucket_index, series key)`
pub type BucketGroups = FxHashMap<(i64, u32), Box<dyn Accumulator>>;

/// Dictionary-encoded series a scan is allowed to read
#[derive(Debug, Clone)]
pub enum SeriesMask {
    All,
    Only(FxHashSet<u32>),
}

impl SeriesMask {
    pub fn contains(&self, series: u32) -> bool {
        match self {
            SeriesMask::All => true,
            SeriesMask::Only(ids) => ids.contains(&series),
        }
    }

    /// True when no series can possibly match
    pub fn is_empty(&self) -> bool {
        matches!(self, SeriesMask::Only(ids) if ids.is_empty())
    }
}

#[derive(Debug)]
struct ShardColumns {
    timestamps: Vec<f64>,
    series: Vec<u32>,
    values: Vec<f64>,
    min_time: f64,
    max_time: f64,
}

impl ShardColumns {
    fn new() -> Self {
        Self {
            timestamps: Vec::new(),
            series: Vec::new(),
            values: Vec::new(),
            min_time: f64::INFINITY,
            max_time: f64::NEG_INFINITY,
        }
    }
}

/// Time-bounded partition of samples.
/// Each shard covers `[start_time, end_time)` in epoch seconds and stores its
/// samples column-wise, with series ids dictionary-encoded.
#[derive(Debug)]
pub struct Shard {
    pub start_time: f64,
    pub end_time: f64,
    columns: RwLock<ShardColumns>,
}

impl Shard {
    pub fn new(start_time: f64, end_time: f64) -> Self {
        Self {
            start_time,
            end_time,
            columns: RwLock::new(ShardColumns::new()),
        }
    }

    /// Check if a timestamp falls within this shard's time range
    pub fn contains_time(&self, timestamp: f64) -> bool {
        timestamp >= self.start_time && timestamp < self.end_time
    }

    pub fn insert(&self, timestamp: f64, series: u32, value: f64) -> Result<(), ShardError> {
        if !self.contains_time(timestamp) {
            return Err(ShardError::TimestampOutOfRange {
                timestamp,
                start: self.start_time,
                end: self.end_time,
            });
        }

        let mut columns = self.columns.write();
        columns.timestamps.push(timestamp);
        columns.series.push(series);
        columns.values.push(value);
        columns.min_time = columns.min_time.min(timestamp);
        columns.max_time = columns.max_time.max(timestamp);
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.columns.read().timestamps.len()
    }

    /// Smallest and largest timestamp of rows whose series passes `mask`
    pub fn time_extent(&self, mask: &SeriesMask) -> Option<(f64, f64)> {
        let columns = self.columns.read();
        if columns.timestamps.is_empty() {
            return None;
        }

        if let SeriesMask::All = mask {
            return Some((columns.min_time, columns.max_time));
        }

        columns
            .timestamps
            .iter()
            .zip(&columns.series)
            .filter(|(_, series)| mask.contains(**series))
            .fold(None, |extent, (&t, _)| match extent {
                None => Some((t, t)),
                Some((lo, hi)) => Some((f64::min(lo, t), f64::max(hi, t))),
            })
    }

    /// Fold this shard's matching rows into per-bucket accumulators
    pub fn aggregate(&self, query: &AggregateQuery, mask: &SeriesMask) -> BucketGroups {
        let mut groups = BucketGroups::default();
        if mask.is_empty() {
            return groups;
        }

        let prototype = create_accumulator(query.function);
        let columns = self.columns.read();

        let rows = columns
            .timestamps
            .iter()
            .zip(&columns.series)
            .zip(&columns.values);

        for ((&timestamp, &series), &value) in rows {
            if !mask.contains(series) || !query.window.contains(timestamp) {
                continue;
            }

            let key = match query.grouping {
                SeriesGrouping::PerSeries => series,
                SeriesGrouping::Combined => COMBINED_SERIES_KEY,
            };

            groups
                .entry((query.bucket_index(timestamp), key))
                .or_insert_with(|| prototype.clone_box())
                .accumulate(value);
        }

        groups
    }

    /// Estimate memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        let columns = self.columns.read();
        columns.timestamps.capacity() * std::mem::size_of::<f64>()
            + columns.series.capacity() * std::mem::size_of::<u32>()
            + columns.values.capacity() * std::mem::size_of::<f64>()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    #[error("Timestamp {timestamp} out of range [{start}, {end})")]
    TimestampOutOfRange { timestamp: f64, start: f64, end: f64 },
}

/// Calculate shard boundaries for a given timestamp and shard duration
pub fn calculate_shard_bounds(timestamp: f64, shard_duration_secs: f64) -> (f64, f64) {
    let start = (timestamp / shard_duration_secs).floor() * shard_duration_secs;
    let end = start + shard_duration_secs;
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SeriesFilter;
    use crate::query::planner::{BucketPlan, QueryWindow};
    use crate::query::scanner::AggregateFunction;

    fn query(start: f64, end: f64, width: f64, grouping: SeriesGrouping) -> AggregateQuery {
        AggregateQuery {
            window: QueryWindow::new(start, end),
            plan: BucketPlan {
                bucket_width: width,
                bucket_count: ((end - start) / width) as usize,
            },
            filter: SeriesFilter::all(),
            function: AggregateFunction::Mean,
            grouping,
        }
    }

    #[test]
    fn test_shard_insert_and_count() {
        let shard = Shard::new(0.0, 100.0);
        shard.insert(1.0, 0, 10.0).unwrap();
        shard.insert(2.0, 1, 20.0).unwrap();

        assert_eq!(shard.row_count(), 2);
        assert!(shard.memory_usage() > 0);
    }

    #[test]
    fn test_shard_timestamp_range() {
        let shard = Shard::new(100.0, 200.0);

        assert!(shard.insert(150.0, 0, 1.0).is_ok());
        assert!(shard.insert(50.0, 0, 1.0).is_err());
        // End is exclusive
        assert!(shard.insert(200.0, 0, 1.0).is_err());
    }

    #[test]
    fn test_time_extent_with_mask() {
        let shard = Shard::new(0.0, 100.0);
        shard.insert(10.0, 0, 1.0).unwrap();
        shard.insert(90.0, 0, 1.0).unwrap();
        shard.insert(40.0, 1, 1.0).unwrap();
        shard.insert(60.0, 1, 1.0).unwrap();

        assert_eq!(shard.time_extent(&SeriesMask::All), Some((10.0, 90.0)));

        let only_one: FxHashSet<u32> = [1].into_iter().collect();
        assert_eq!(
            shard.time_extent(&SeriesMask::Only(only_one)),
            Some((40.0, 60.0))
        );

        let missing: FxHashSet<u32> = [7].into_iter().collect();
        assert_eq!(shard.time_extent(&SeriesMask::Only(missing)), None);
    }

    #[test]
    fn test_aggregate_per_series() {
        let shard = Shard::new(0.0, 100.0);
        shard.insert(0.0, 0, 4.0).unwrap();
        shard.insert(5.0, 0, 6.0).unwrap();
        shard.insert(12.0, 0, 9.0).unwrap();
        shard.insert(3.0, 1, 7.0).unwrap();

        let groups = shard.aggregate(&query(0.0, 30.0, 10.0, SeriesGrouping::PerSeries), &SeriesMask::All);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&(0, 0)].result(), Some(5.0));
        assert_eq!(groups[&(1, 0)].result(), Some(9.0));
        assert_eq!(groups[&(0, 1)].result(), Some(7.0));
    }

    #[test]
    fn test_aggregate_combined() {
        let shard = Shard::new(0.0, 100.0);
        shard.insert(1.0, 0, 2.0).unwrap();
        shard.insert(2.0, 1, 4.0).unwrap();
        shard.insert(3.0, 2, 9.0).unwrap();

        let groups = shard.aggregate(&query(0.0, 10.0, 10.0, SeriesGrouping::Combined), &SeriesMask::All);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[&(0, COMBINED_SERIES_KEY)].result(), Some(5.0));
    }

    #[test]
    fn test_aggregate_window_is_inclusive() {
        let shard = Shard::new(0.0, 100.0);
        shard.insert(10.0, 0, 1.0).unwrap();
        shard.insert(20.0, 0, 2.0).unwrap();
        shard.insert(20.000001, 0, 3.0).unwrap();
        shard.insert(9.999999, 0, 4.0).unwrap();

        let groups = shard.aggregate(&query(10.0, 20.0, 5.0, SeriesGrouping::PerSeries), &SeriesMask::All);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&(0, 0)].result(), Some(1.0));
        assert_eq!(groups[&(2, 0)].result(), Some(2.0));
    }

    #[test]
    fn test_empty_mask_short_circuits() {
        let shard = Shard::new(0.0, 100.0);
        shard.insert(1.0, 0, 1.0).unwrap();

        let mask = SeriesMask::Only(FxHashSet::default());
        assert!(mask.is_empty());
        assert!(shard
            .aggregate(&query(0.0, 10.0, 1.0, SeriesGrouping::PerSeries), &mask)
            .is_empty());
    }

    #[test]
    fn test_calculate_shard_bounds() {
        assert_eq!(calculate_shard_bounds(3700.0, 3600.0), (3600.0, 7200.0));
        assert_eq!(calculate_shard_bounds(0.0, 3600.0), (0.0, 3600.0));
        assert_eq!(calculate_shard_bounds(-1.0, 3600.0), (-3600.0, 0.0));
    }
}

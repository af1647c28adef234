use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

use super::dictionary::SeriesDictionary;
use crate::data::shard::COMBINED_SERIES_KEY;
use crate::data::{
    BucketGroups, EpochSeconds, Sample, SeriesFilter, Table, TableConfig, TableError, TableStats,
};
use crate::query::scanner::{
    AggregateQuery, AggregateRow, AggregateScanner, ScanError, COMBINED_SERIES_ID,
};

/// In-memory sample store.
///
/// Serves any number of concurrent readers through [`AggregateScanner`].
/// Once [`StorageEngine::close`] is called every scan reports
/// [`ScanError::StoreUnavailable`].
pub struct StorageEngine {
    table: Table,
    dictionary: SeriesDictionary,
    open: AtomicBool,
}

impl StorageEngine {
    pub fn new() -> Self {
        Self::with_config(TableConfig::new("sensors"))
    }

    pub fn with_config(config: TableConfig) -> Self {
        Self {
            table: Table::new(config),
            dictionary: SeriesDictionary::new(),
            open: AtomicBool::new(true),
        }
    }

    /// Insert one sample
    pub fn insert(&self, sample: &Sample) -> Result<(), StorageError> {
        self.ensure_open()?;

        if !sample.value.is_finite() {
            return Err(StorageError::InvalidValue {
                series_id: sample.series_id.clone(),
                value: sample.value,
            });
        }
        if sample.series_id.is_empty() {
            return Err(StorageError::EmptySeriesId);
        }

        let key = self.dictionary.intern(&sample.series_id);
        self.table.insert(sample.timestamp, key, sample.value)?;
        Ok(())
    }

    /// Insert multiple samples, skipping (and logging) the ones that fail
    pub fn insert_batch(&self, samples: &[Sample]) -> Result<usize, StorageError> {
        self.ensure_open()?;

        let mut inserted = 0;
        for sample in samples {
            match self.insert(sample) {
                Ok(()) => inserted += 1,
                Err(StorageError::Closed) => return Err(StorageError::Closed),
                Err(e) => {
                    tracing::warn!("Failed to insert sample: {}", e);
                }
            }
        }

        Ok(inserted)
    }

    pub fn stats(&self) -> Result<StoreStats, StorageError> {
        self.ensure_open()?;

        Ok(StoreStats {
            series_count: self.dictionary.len(),
            table: self.table.stats(),
        })
    }

    /// Stop serving; subsequent reads and writes fail
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StorageError::Closed)
        }
    }

    fn ensure_readable(&self) -> Result<(), ScanError> {
        self.ensure_open()
            .map_err(|e| ScanError::StoreUnavailable(e.to_string()))
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateScanner for StorageEngine {
    fn range_extent(
        &self,
        filter: &SeriesFilter,
    ) -> Result<Option<(EpochSeconds, EpochSeconds)>, ScanError> {
        self.ensure_readable()?;

        let mask = self.dictionary.mask_for(filter);
        if mask.is_empty() {
            return Ok(None);
        }

        let extent = self
            .table
            .get_shards()
            .iter()
            .filter_map(|shard| shard.time_extent(&mask))
            .reduce(|(lo, hi), (s_lo, s_hi)| (lo.min(s_lo), hi.max(s_hi)));

        match extent {
            Some((lo, hi)) => Ok(Some((EpochSeconds::new(lo)?, EpochSeconds::new(hi)?))),
            None => Ok(None),
        }
    }

    fn aggregate(&self, query: &AggregateQuery) -> Result<Vec<AggregateRow>, ScanError> {
        self.ensure_readable()?;

        let mask = self.dictionary.mask_for(&query.filter);
        if mask.is_empty() {
            return Ok(Vec::new());
        }

        let shards = self
            .table
            .get_shards_in_range(query.window.start, query.window.end);

        let groups = shards
            .par_iter()
            .map(|shard| shard.aggregate(query, &mask))
            .reduce(BucketGroups::default, merge_groups);

        let mut rows = Vec::with_capacity(groups.len());
        for ((bucket_index, key), accumulator) in groups {
            let Some(value) = accumulator.result() else {
                continue;
            };

            let series_id = if key == COMBINED_SERIES_KEY {
                COMBINED_SERIES_ID.to_string()
            } else {
                match self.dictionary.resolve(key) {
                    Some(name) => name,
                    None => {
                        tracing::warn!("Dropping row for unknown series key {}", key);
                        continue;
                    }
                }
            };

            rows.push(AggregateRow {
                bucket_index,
                series_id,
                value,
            });
        }

        tracing::debug!(
            shards = shards.len(),
            rows = rows.len(),
            function = %query.function,
            "aggregate scan complete"
        );

        Ok(rows)
    }

    fn series_ids(&self) -> Result<Vec<String>, ScanError> {
        self.ensure_readable()?;
        Ok(self.dictionary.sorted_names())
    }
}

/// Merge the smaller group map into the larger one
fn merge_groups(left: BucketGroups, right: BucketGroups) -> BucketGroups {
    let (mut into, from) = if left.len() >= right.len() {
        (left, right)
    } else {
        (right, left)
    };

    for (key, accumulator) in from {
        match into.get_mut(&key) {
            Some(existing) => existing.merge(accumulator.as_ref()),
            None => {
                into.insert(key, accumulator);
            }
        }
    }

    into
}

/// Snapshot of store contents
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub series_count: usize,
    pub table: TableStats,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Sample store is closed")]
    Closed,

    #[error("Sample for series '{series_id}' has non-finite value {value}")]
    InvalidValue { series_id: String, value: f64 },

    #[error("Sample has an empty series id")]
    EmptySeriesId,

    #[error("Table error: {0}")]
    TableError(#[from] TableError),
}

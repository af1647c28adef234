use super::shard::{calculate_shard_bounds, Shard, ShardError};
use parking_lot::RwLock;
use std::sync::Arc;

/// Configuration for a sample table
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Table name
    pub name: String,
    /// Duration of each shard in seconds (default: 1 hour)
    pub shard_duration_secs: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            shard_duration_secs: 3600.0,
        }
    }
}

impl TableConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_shard_duration(mut self, duration_secs: f64) -> Self {
        self.shard_duration_secs = duration_secs;
        self
    }
}

/// Samples of every series, partitioned into time shards
#[derive(Debug)]
pub struct Table {
    pub config: TableConfig,
    /// Shards ordered by start time
    shards: RwLock<Vec<Arc<Shard>>>,
}

impl Table {
    pub fn new(config: TableConfig) -> Self {
        Self {
            config,
            shards: RwLock::new(Vec::new()),
        }
    }

    /// Insert one sample into the appropriate shard
    pub fn insert(&self, timestamp: f64, series: u32, value: f64) -> Result<(), TableError> {
        if !timestamp.is_finite() {
            return Err(TableError::InvalidTimestamp(timestamp));
        }

        let shard = self.get_or_create_shard(timestamp);
        shard.insert(timestamp, series, value).map_err(TableError::ShardError)
    }

    /// Get or create a shard for the given timestamp
    fn get_or_create_shard(&self, timestamp: f64) -> Arc<Shard> {
        let (start, end) = calculate_shard_bounds(timestamp, self.config.shard_duration_secs);

        // First, try to find existing shard with read lock
        {
            let shards = self.shards.read();
            if let Some(shard) = shards.iter().find(|s| s.start_time == start) {
                return Arc::clone(shard);
            }
        }

        let mut shards = self.shards.write();

        // Double-check in case another thread created it
        if let Some(shard) = shards.iter().find(|s| s.start_time == start) {
            return Arc::clone(shard);
        }

        let shard = Arc::new(Shard::new(start, end));
        let position = shards.partition_point(|s| s.start_time < start);
        shards.insert(position, Arc::clone(&shard));

        shard
    }

    /// Get all shards (for querying)
    pub fn get_shards(&self) -> Vec<Arc<Shard>> {
        self.shards.read().clone()
    }

    /// Get shards that may hold samples in `[start_time, end_time]`
    pub fn get_shards_in_range(&self, start_time: f64, end_time: f64) -> Vec<Arc<Shard>> {
        self.shards
            .read()
            .iter()
            .filter(|s| s.start_time <= end_time && s.end_time > start_time)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> TableStats {
        let shards = self.shards.read();

        TableStats {
            name: self.config.name.clone(),
            row_count: shards.iter().map(|s| s.row_count()).sum(),
            shard_count: shards.len(),
            memory_bytes: shards.iter().map(|s| s.memory_usage()).sum(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Sample timestamp must be finite, got {0}")]
    InvalidTimestamp(f64),

    #[error("Shard error: {0}")]
    ShardError(#[from] ShardError),
}

/// Statistics about a table
#[derive(Debug, Clone, serde::Serialize)]
pub struct TableStats {
    pub name: String,
    pub row_count: usize,
    pub shard_count: usize,
    pub memory_bytes: usize,
}

pub mod sample;
pub mod shard;
pub mod table;
pub mod timestamp;

pub use sample::{Sample, SeriesFilter};
pub use shard::{BucketGroups, SeriesMask, Shard, ShardError};
pub use table::{Table, TableConfig, TableError, TableStats};
pub use timestamp::{EpochSeconds, TimeValue, TimestampError};

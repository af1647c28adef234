//! Sensorplot: downsampling backend for sensor time-series charts
//!
//! Holds raw `(timestamp, series, value)` samples in memory and serves them
//! to chart clients at a resolution matched to the client's pixel width.
//!
//! # Features
//!
//! - **Time-Based Sharding**: Samples partitioned by time for range pruning
//! - **Series Dictionary**: Series ids interned to compact integer keys
//! - **Bucketed Aggregation**: Mean (default), min or max per bucket and series,
//!   computed across shards in parallel
//! - **Aligned Output**: Every series shares one time axis, gaps are `null`
//! - **Two Wire Shapes**: Legacy `[time, values]` and multi-series objects
//!
//! # Example
//!
//! ```no_run
//! use sensorplot::data::{EpochSeconds, Sample, SeriesFilter};
//! use sensorplot::query::{run_downsample, BucketPlanner, DownsampleRequest};
//! use sensorplot::storage::StorageEngine;
//!
//! let engine = StorageEngine::new();
//! engine
//!     .insert_batch(&[Sample::new(0.0, "temp", 20.5), Sample::new(60.0, "temp", 21.0)])
//!     .unwrap();
//!
//! let request = DownsampleRequest {
//!     start: Some(EpochSeconds::new(0.0).unwrap()),
//!     end: Some(EpochSeconds::new(60.0).unwrap()),
//!     target_width: 6,
//!     filter: SeriesFilter::parse("temp"),
//!     ..Default::default()
//! };
//! let outcome = run_downsample(&engine, &request, &BucketPlanner::default()).unwrap();
//! println!("{}", serde_json::to_string(&outcome.into_payload(request.mode)).unwrap());
//! ```

pub mod api;
pub mod data;
pub mod query;
pub mod storage;

// Re-export commonly used types
pub use data::{Sample, SeriesFilter, TimeValue};
pub use query::{run_downsample, DownsampleRequest, Payload, QueryError};
pub use storage::{StorageEngine, StorageError};

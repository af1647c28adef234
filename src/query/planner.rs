use serde::Serialize;

use crate::data::EpochSeconds;

/// Point budget used when the caller asks for zero or fewer points
pub const DEFAULT_TARGET_WIDTH: usize = 1000;

/// Upper bound on buckets per request unless configured otherwise
pub const MAX_BUCKETS: usize = 100_000;

/// Time window of a query in epoch seconds. Scans include both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryWindow {
    pub start: f64,
    pub end: f64,
}

impl QueryWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn from_epochs(start: EpochSeconds, end: EpochSeconds) -> Self {
        Self::new(start.as_f64(), end.as_f64())
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Width and count of the buckets a window is split into.
///
/// The time axis has `bucket_count + 1` entries so that it includes the
/// closing edge of the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketPlan {
    pub bucket_width: f64,
    pub bucket_count: usize,
}

impl BucketPlan {
    pub fn axis_len(&self) -> usize {
        self.bucket_count + 1
    }

    /// Start time of bucket `index`
    pub fn bucket_start(&self, window: &QueryWindow, index: usize) -> f64 {
        window.start + index as f64 * self.bucket_width
    }
}

/// Turns a window and a requested point budget into a [`BucketPlan`].
#[derive(Debug, Clone, Copy)]
pub struct BucketPlanner {
    max_buckets: usize,
}

impl BucketPlanner {
    pub fn new(max_buckets: usize) -> Self {
        Self {
            max_buckets: max_buckets.max(1),
        }
    }

    /// Validate a caller-supplied width. Zero or negative widths fall back to
    /// [`DEFAULT_TARGET_WIDTH`]; widths above the cap are rejected.
    pub fn target_width(&self, requested: i64) -> Result<usize, PlanError> {
        if requested <= 0 {
            return Ok(DEFAULT_TARGET_WIDTH.min(self.max_buckets));
        }

        let requested = usize::try_from(requested).unwrap_or(usize::MAX);
        if requested > self.max_buckets {
            return Err(PlanError::TooManyBuckets {
                requested,
                max: self.max_buckets,
            });
        }

        Ok(requested)
    }

    pub fn plan(&self, window: QueryWindow, requested_width: i64) -> Result<BucketPlan, PlanError> {
        let target_width = self.target_width(requested_width)?;

        let duration = window.duration();
        if !duration.is_finite() || duration <= 0.0 {
            return Err(PlanError::DegenerateWindow {
                start: window.start,
                end: window.end,
            });
        }

        let bucket_width = duration / target_width as f64;
        if bucket_width <= 0.0 {
            // Window narrower than f64 can split into target_width pieces
            return Err(PlanError::DegenerateWindow {
                start: window.start,
                end: window.end,
            });
        }

        Ok(BucketPlan {
            bucket_width,
            bucket_count: target_width,
        })
    }
}

impl Default for BucketPlanner {
    fn default() -> Self {
        Self::new(MAX_BUCKETS)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("Window [{start}, {end}] has no positive duration")]
    DegenerateWindow { start: f64, end: f64 },

    #[error("Requested {requested} points, at most {max} are allowed")]
    TooManyBuckets { requested: usize, max: usize },
}

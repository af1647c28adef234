pub mod aggregates;
pub mod assembler;
pub mod pivot;
pub mod planner;
pub mod range;
pub mod scanner;

pub use assembler::{assemble, Payload, ResponseMode};
pub use pivot::{pivot, AlignedSeries, PivotTable};
pub use planner::{BucketPlan, BucketPlanner, PlanError, QueryWindow, DEFAULT_TARGET_WIDTH, MAX_BUCKETS};
pub use range::{resolve, Resolution};
pub use scanner::{
    AggregateFunction, AggregateQuery, AggregateRow, AggregateScanner, ScanError, SeriesGrouping,
};

use crate::data::{EpochSeconds, SeriesFilter};

/// One downsampling request after query-string parsing
#[derive(Debug, Clone, PartialEq)]
pub struct DownsampleRequest {
    pub start: Option<EpochSeconds>,
    pub end: Option<EpochSeconds>,
    /// Requested point budget; `<= 0` means the default
    pub target_width: i64,
    pub filter: SeriesFilter,
    pub function: AggregateFunction,
    pub mode: ResponseMode,
}

impl Default for DownsampleRequest {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            target_width: 0,
            filter: SeriesFilter::all(),
            function: AggregateFunction::Mean,
            mode: ResponseMode::MultiSeries,
        }
    }
}

/// Why a request produced no table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// No samples match the filter
    NoData,
    /// Resolved window has `end <= start`
    DegenerateWindow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownsampleOutcome {
    Empty(EmptyReason),
    Table(PivotTable),
}

impl DownsampleOutcome {
    pub fn into_payload(self, mode: ResponseMode) -> Payload {
        match self {
            DownsampleOutcome::Empty(_) => Payload::empty(mode),
            DownsampleOutcome::Table(table) => assemble(table, mode),
        }
    }
}

/// Resolve, plan, scan and pivot one request.
///
/// Empty stores and degenerate windows are outcomes, not errors. Only a
/// failing store or an over-budget width comes back as `Err`.
pub fn run_downsample<S: AggregateScanner + ?Sized>(
    scanner: &S,
    request: &DownsampleRequest,
    planner: &BucketPlanner,
) -> Result<DownsampleOutcome, QueryError> {
    // Reject oversized widths before touching the store
    planner.target_width(request.target_width)?;

    let window = match resolve(scanner, request.start, request.end, &request.filter)? {
        Resolution::Window(window) => window,
        Resolution::EmptyResult => return Ok(DownsampleOutcome::Empty(EmptyReason::NoData)),
    };

    let plan = match planner.plan(window, request.target_width) {
        Ok(plan) => plan,
        Err(PlanError::DegenerateWindow { start, end }) => {
            tracing::debug!(start, end, "degenerate window, returning empty result");
            return Ok(DownsampleOutcome::Empty(EmptyReason::DegenerateWindow));
        }
        Err(e) => return Err(e.into()),
    };

    let grouping = match request.mode {
        ResponseMode::Legacy => SeriesGrouping::Combined,
        ResponseMode::MultiSeries => SeriesGrouping::PerSeries,
    };

    let query = AggregateQuery {
        window,
        plan,
        filter: request.filter.clone(),
        function: request.function,
        grouping,
    };

    let rows = scanner.aggregate(&query)?;
    let table = pivot(&rows, &plan, &window);

    tracing::debug!(
        start = window.start,
        end = window.end,
        bucket_width = plan.bucket_width,
        buckets = plan.bucket_count,
        rows = rows.len(),
        series = table.series.len(),
        "downsample complete"
    );

    Ok(DownsampleOutcome::Table(table))
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Sample;
    use crate::storage::StorageEngine;
    use serde_json::json;

    fn secs(value: f64) -> Option<EpochSeconds> {
        Some(EpochSeconds::new(value).unwrap())
    }

    fn store(samples: &[(f64, &str, f64)]) -> StorageEngine {
        let engine = StorageEngine::new();
        let samples: Vec<Sample> = samples
            .iter()
            .map(|(t, id, v)| Sample::new(*t, *id, *v))
            .collect();
        engine.insert_batch(&samples).unwrap();
        engine
    }

    fn run(engine: &StorageEngine, request: &DownsampleRequest) -> serde_json::Value {
        let outcome = run_downsample(engine, request, &BucketPlanner::default()).unwrap();
        serde_json::to_value(outcome.into_payload(request.mode)).unwrap()
    }

    #[test]
    fn test_empty_store_both_modes() {
        let engine = StorageEngine::new();

        let legacy = DownsampleRequest {
            mode: ResponseMode::Legacy,
            ..Default::default()
        };
        assert_eq!(run(&engine, &legacy), json!([[], []]));

        let multi = DownsampleRequest::default();
        assert_eq!(run(&engine, &multi), json!({"time": [], "series": []}));
    }

    #[test]
    fn test_degenerate_window_is_empty() {
        let engine = store(&[(5.0, "a", 1.0)]);

        let request = DownsampleRequest {
            start: secs(10.0),
            end: secs(10.0),
            ..Default::default()
        };
        let outcome = run_downsample(&engine, &request, &BucketPlanner::default()).unwrap();
        assert_eq!(outcome, DownsampleOutcome::Empty(EmptyReason::DegenerateWindow));
    }

    #[test]
    fn test_single_sample_store_is_degenerate() {
        // min == max so the implicit window has no duration
        let engine = store(&[(5.0, "a", 1.0)]);
        let outcome =
            run_downsample(&engine, &DownsampleRequest::default(), &BucketPlanner::default()).unwrap();
        assert_eq!(outcome, DownsampleOutcome::Empty(EmptyReason::DegenerateWindow));
    }

    #[test]
    fn test_partial_ids_only_return_matches() {
        let engine = store(&[(0.0, "x", 1.0), (10.0, "x", 3.0), (5.0, "z", 100.0)]);

        let request = DownsampleRequest {
            start: secs(0.0),
            end: secs(10.0),
            target_width: 2,
            filter: SeriesFilter::parse("x,y"),
            ..Default::default()
        };

        assert_eq!(
            run(&engine, &request),
            json!({
                "time": [0.0, 5.0, 10.0],
                "series": [{"id": "x", "data": [1.0, null, 3.0]}]
            })
        );
    }

    #[test]
    fn test_non_matching_ids_give_axis_without_series() {
        let engine = store(&[(0.0, "x", 1.0), (10.0, "x", 3.0)]);

        let request = DownsampleRequest {
            start: secs(0.0),
            end: secs(10.0),
            target_width: 2,
            filter: SeriesFilter::parse("nope"),
            ..Default::default()
        };

        assert_eq!(
            run(&engine, &request),
            json!({"time": [0.0, 5.0, 10.0], "series": []})
        );
    }

    #[test]
    fn test_implicit_window_full_pipeline() {
        let engine = store(&[
            (0.0, "b", 2.0),
            (1.0, "a", 4.0),
            (3.0, "a", 6.0),
            (100.0, "a", 8.0),
        ]);

        let request = DownsampleRequest {
            target_width: 10,
            ..Default::default()
        };
        let value = run(&engine, &request);

        let time = value["time"].as_array().unwrap();
        assert_eq!(time.len(), 11);
        assert_eq!(time[0], json!(0.0));
        assert_eq!(time[10], json!(100.0));

        let series = value["series"].as_array().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0]["id"], "a");
        assert_eq!(series[0]["data"][0], json!(5.0));
        // Sample at exactly the window end lands in the closing slot
        assert_eq!(series[0]["data"][10], json!(8.0));
        assert_eq!(series[1]["id"], "b");
        assert_eq!(series[1]["data"][0], json!(2.0));
        assert!(series[1]["data"][1].is_null());
    }

    #[test]
    fn test_legacy_combines_series() {
        let engine = store(&[(0.0, "a", 2.0), (0.5, "b", 4.0), (10.0, "a", 9.0)]);

        let request = DownsampleRequest {
            start: secs(0.0),
            end: secs(10.0),
            target_width: 2,
            mode: ResponseMode::Legacy,
            ..Default::default()
        };

        assert_eq!(
            run(&engine, &request),
            json!([[0.0, 5.0, 10.0], [3.0, null, 9.0]])
        );
    }

    #[test]
    fn test_max_aggregate_keeps_shape() {
        let engine = store(&[(0.0, "a", 2.0), (1.0, "a", 7.0), (10.0, "a", 1.0)]);

        let request = DownsampleRequest {
            start: secs(0.0),
            end: secs(10.0),
            target_width: 2,
            function: AggregateFunction::Max,
            ..Default::default()
        };

        assert_eq!(
            run(&engine, &request),
            json!({
                "time": [0.0, 5.0, 10.0],
                "series": [{"id": "a", "data": [7.0, null, 1.0]}]
            })
        );
    }

    #[test]
    fn test_oversized_width_rejected() {
        let engine = store(&[(0.0, "a", 1.0), (10.0, "a", 1.0)]);

        let request = DownsampleRequest {
            target_width: 10_000_000,
            ..Default::default()
        };

        assert!(matches!(
            run_downsample(&engine, &request, &BucketPlanner::default()),
            Err(QueryError::Plan(PlanError::TooManyBuckets { .. }))
        ));
    }

    #[test]
    fn test_store_unavailable_is_error() {
        let engine = store(&[(0.0, "a", 1.0)]);
        engine.close();

        let request = DownsampleRequest {
            start: secs(0.0),
            end: secs(10.0),
            ..Default::default()
        };

        assert!(matches!(
            run_downsample(&engine, &request, &BucketPlanner::default()),
            Err(QueryError::Scan(ScanError::StoreUnavailable(_)))
        ));
    }
}

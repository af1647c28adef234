//! Reshape sparse `(bucket, series, value)` rows into a dense table that
//! shares one time axis across all series.

use serde::Serialize;
use std::collections::BTreeMap;

use super::planner::{BucketPlan, QueryWindow};
use super::scanner::AggregateRow;

/// Values of one series aligned to the shared time axis.
///
/// `None` marks a bucket with no samples. It is never conflated with `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedSeries {
    pub series_id: String,
    pub values: Vec<Option<f64>>,
}

/// Time axis plus every series present in the scan, sorted by id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub axis: Vec<f64>,
    pub series: Vec<AlignedSeries>,
}

impl PivotTable {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// `axis[i] = start + i * width` for `i` in `0..=bucket_count`
pub fn build_axis(plan: &BucketPlan, window: &QueryWindow) -> Vec<f64> {
    (0..plan.axis_len())
        .map(|i| plan.bucket_start(window, i))
        .collect()
}

#[derive(Clone, Copy)]
struct Slot {
    value: f64,
    /// False when the row's bucket index had to be clamped onto the axis
    in_range: bool,
}

pub fn pivot(rows: &[AggregateRow], plan: &BucketPlan, window: &QueryWindow) -> PivotTable {
    let axis = build_axis(plan, window);
    let last = plan.bucket_count as i64;

    // BTreeMap keys give the lexicographic series order
    let mut slots: BTreeMap<&str, Vec<Option<Slot>>> = BTreeMap::new();

    for row in rows {
        let in_range = (0..=last).contains(&row.bucket_index);
        let index = row.bucket_index.clamp(0, last) as usize;

        let series = slots
            .entry(row.series_id.as_str())
            .or_insert_with(|| vec![None; axis.len()]);

        // First row wins, unless it was clamped and this one is not
        let replace = match series[index] {
            None => true,
            Some(existing) => !existing.in_range && in_range,
        };
        if replace {
            series[index] = Some(Slot {
                value: row.value,
                in_range,
            });
        }
    }

    let series = slots
        .into_iter()
        .map(|(series_id, values)| AlignedSeries {
            series_id: series_id.to_string(),
            values: values.into_iter().map(|slot| slot.map(|s| s.value)).collect(),
        })
        .collect();

    PivotTable { axis, series }
}

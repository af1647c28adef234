use serde::Serialize;

use super::pivot::PivotTable;

/// Which wire shape the caller expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseMode {
    /// `[timeArray, valueArray]`, one anonymous series
    Legacy,
    /// `{"time": [...], "series": [{"id", "data"}, ...]}`
    MultiSeries,
}

/// `[time, values]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyPayload(pub Vec<f64>, pub Vec<Option<f64>>);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPayload {
    pub id: String,
    pub data: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiSeriesPayload {
    pub time: Vec<f64>,
    pub series: Vec<SeriesPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Legacy(LegacyPayload),
    MultiSeries(MultiSeriesPayload),
}

impl Payload {
    /// The shape returned when there is no window or no data at all
    pub fn empty(mode: ResponseMode) -> Self {
        match mode {
            ResponseMode::Legacy => Payload::Legacy(LegacyPayload(Vec::new(), Vec::new())),
            ResponseMode::MultiSeries => Payload::MultiSeries(MultiSeriesPayload {
                time: Vec::new(),
                series: Vec::new(),
            }),
        }
    }
}

/// Shape a pivot table for the wire. No aggregation happens here.
///
/// In legacy mode the table holds at most one series, the combined aggregate
/// over every matching series (grouped by bucket only), and that becomes the
/// value array. With no series it is all gaps, so both arrays stay the same
/// length.
pub fn assemble(table: PivotTable, mode: ResponseMode) -> Payload {
    let PivotTable { axis, series } = table;

    match mode {
        ResponseMode::Legacy => {
            let values = series
                .into_iter()
                .next()
                .map(|s| s.values)
                .unwrap_or_else(|| vec![None; axis.len()]);
            Payload::Legacy(LegacyPayload(axis, values))
        }
        ResponseMode::MultiSeries => Payload::MultiSeries(MultiSeriesPayload {
            time: axis,
            series: series
                .into_iter()
                .map(|s| SeriesPayload {
                    id: s.series_id,
                    data: s.values,
                })
                .collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::pivot::AlignedSeries;
    use serde_json::json;

    fn table() -> PivotTable {
        PivotTable {
            axis: vec![0.0, 10.0, 20.0],
            series: vec![
                AlignedSeries {
                    series_id: "a".to_string(),
                    values: vec![Some(1.0), None, Some(0.0)],
                },
                AlignedSeries {
                    series_id: "b".to_string(),
                    values: vec![None, Some(2.5), None],
                },
            ],
        }
    }

    #[test]
    fn test_multi_series_shape() {
        let payload = assemble(table(), ResponseMode::MultiSeries);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "time": [0.0, 10.0, 20.0],
                "series": [
                    {"id": "a", "data": [1.0, null, 0.0]},
                    {"id": "b", "data": [null, 2.5, null]}
                ]
            })
        );
    }

    #[test]
    fn test_legacy_shape() {
        let payload = assemble(table(), ResponseMode::Legacy);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!([[0.0, 10.0, 20.0], [1.0, null, 0.0]])
        );
    }

    #[test]
    fn test_legacy_without_series_stays_parallel() {
        let payload = assemble(
            PivotTable {
                axis: vec![0.0, 1.0],
                series: Vec::new(),
            },
            ResponseMode::Legacy,
        );

        assert_eq!(serde_json::to_value(&payload).unwrap(), json!([[0.0, 1.0], [null, null]]));
    }

    #[test]
    fn test_empty_payloads() {
        assert_eq!(
            serde_json::to_value(Payload::empty(ResponseMode::Legacy)).unwrap(),
            json!([[], []])
        );
        assert_eq!(
            serde_json::to_value(Payload::empty(ResponseMode::MultiSeries)).unwrap(),
            json!({"time": [], "series": []})
        );
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One raw reading of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Epoch seconds
    pub timestamp: f64,
    pub series_id: String,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, series_id: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp,
            series_id: series_id.into(),
            value,
        }
    }
}

/// Set of series ids a query is restricted to. Empty means every series.
///
/// Matching is exact and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SeriesFilter {
    ids: BTreeSet<String>,
}

impl SeriesFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a comma-separated id list. Empty tokens and surrounding
    /// whitespace are dropped, so `""`, `","` and `" , "` all mean "no filter".
    pub fn parse(raw: &str) -> Self {
        Self::from_ids(
            raw.split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty()),
        )
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

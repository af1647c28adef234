use super::planner::QueryWindow;
use super::scanner::{AggregateScanner, ScanError};
use crate::data::{EpochSeconds, SeriesFilter};

/// Outcome of resolving the query window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Window(QueryWindow),
    /// Nothing in the store matches the filter, so there is no window to plan
    EmptyResult,
}

/// Work out the effective window for a request.
///
/// Explicit bounds are trusted as given, including their order. Missing bounds
/// are taken from the store's extent for the filtered series; a lone bound the
/// caller did give is kept.
pub fn resolve<S: AggregateScanner + ?Sized>(
    scanner: &S,
    start: Option<EpochSeconds>,
    end: Option<EpochSeconds>,
    filter: &SeriesFilter,
) -> Result<Resolution, ScanError> {
    if let (Some(start), Some(end)) = (start, end) {
        return Ok(Resolution::Window(QueryWindow::from_epochs(start, end)));
    }

    let Some((min_time, max_time)) = scanner.range_extent(filter)? else {
        tracing::debug!(filtered = !filter.is_all(), "no samples to derive a window from");
        return Ok(Resolution::EmptyResult);
    };

    let window = QueryWindow::from_epochs(start.unwrap_or(min_time), end.unwrap_or(max_time));
    tracing::debug!(start = window.start, end = window.end, "resolved implicit window");

    Ok(Resolution::Window(window))
}

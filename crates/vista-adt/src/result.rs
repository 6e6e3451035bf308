//! Result types for windowed retrieval.

use std::time::Duration;

use chrono::NaiveDateTime;

use crate::record::DecodedRecord;
use crate::window::Window;

/// Outcome of a complete windowed fetch.
///
/// # Example
///
/// ```ignore
/// let result = engine.inpatient_moves("20230101", "20230201")?;
///
/// println!("{} movements over {} windows", result.count(), result.stats.windows);
/// for movement in &result {
///     println!("{}", movement.id());
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct WindowedResult {
    /// Records in window order, then response order.
    pub records: Vec<DecodedRecord>,
    /// One summary per window.
    pub windows: Vec<WindowSummary>,
    /// Execution statistics.
    pub stats: FetchStats,
}

impl WindowedResult {
    /// Returns the number of records.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record was found.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, DecodedRecord> {
        self.records.iter()
    }

    /// Records that came from window `number`.
    ///
    /// Empty when no such window was fetched, or when the window summaries
    /// count more records than `records` holds.
    pub fn window_records(&self, number: usize) -> &[DecodedRecord] {
        let mut offset = 0usize;
        for summary in &self.windows {
            if summary.number == number {
                return offset
                    .checked_add(summary.records)
                    .and_then(|end| self.records.get(offset..end))
                    .unwrap_or_default();
            }
            offset = offset.saturating_add(summary.records);
        }
        &[]
    }
}

impl IntoIterator for WindowedResult {
    type Item = DecodedRecord;
    type IntoIter = std::vec::IntoIter<DecodedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a WindowedResult {
    type Item = &'a DecodedRecord;
    type IntoIter = std::slice::Iter<'a, DecodedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// What one window contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSummary {
    /// 1-based window number.
    pub number: usize,
    /// Inclusive start.
    pub start: NaiveDateTime,
    /// Exclusive end.
    pub end: NaiveDateTime,
    /// Records kept from this window.
    pub records: usize,
}

impl From<&Window> for WindowSummary {
    fn from(window: &Window) -> Self {
        Self {
            number: window.number,
            start: window.start,
            end: window.end,
            records: 0,
        }
    }
}

/// Statistics from a windowed fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Total duration.
    pub duration: Duration,
    /// Windows fetched.
    pub windows: usize,
    /// Records kept.
    pub records: usize,
    /// Records dropped because their timestamp fell outside their window.
    pub trimmed: usize,
}

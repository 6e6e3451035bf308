//! Date windows.
//!
//! The backend has no range query. Time-indexed listings are walked one
//! window at a time with a `from`/`part` filter pair, so a requested range is
//! cut into windows that tile it exactly:
//!
//! ```text
//! [from ─────────────────────────────────────── to)
//! [ window 1 )[ window 2 )[ window 3 )[ window 4 )     last one clipped to `to`
//! ```
//!
//! # Boundary quirk
//!
//! The `from` filter is exclusive, and the index skips any instant whose
//! seconds are a multiple of ten. To include an instant `T` the filter is
//! `T - 1s`, and if that still lands on a multiple of ten, `T - 2s`. An
//! instant exactly one second before `T` can therefore leak into a window;
//! records are trimmed to `[start, end)` after decoding.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Months, NaiveDateTime, Timelike};
use vista_text::{format_fixed, format_timestamp};

use crate::error::{AdtError, AdtResult};

/// Step between window starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IntervalSpec {
    /// One hour.
    Hour,
    /// One calendar day.
    #[default]
    Day,
    /// Seven days.
    Week,
    /// One calendar month.
    Month,
}

impl IntervalSpec {
    /// Start of the window following one that starts at `start`.
    pub fn advance(self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            IntervalSpec::Hour => start.checked_add_signed(Duration::hours(1)),
            IntervalSpec::Day => start.checked_add_signed(Duration::days(1)),
            IntervalSpec::Week => start.checked_add_signed(Duration::weeks(1)),
            IntervalSpec::Month => start.checked_add_months(Months::new(1)),
        }
    }

    /// Vocabulary word.
    pub fn name(self) -> &'static str {
        match self {
            IntervalSpec::Hour => "hour",
            IntervalSpec::Day => "day",
            IntervalSpec::Week => "week",
            IntervalSpec::Month => "month",
        }
    }
}

impl fmt::Display for IntervalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IntervalSpec {
    type Err = AdtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(IntervalSpec::Hour),
            "day" => Ok(IntervalSpec::Day),
            "week" => Ok(IntervalSpec::Week),
            "month" => Ok(IntervalSpec::Month),
            _ => Err(AdtError::Configuration(format!("unknown interval: {s}"))),
        }
    }
}

/// Filter strings sent to the backend for one window.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundaryFilter {
    /// Adjusted exclusive lower bound, FileMan form.
    pub from: String,
    /// Index prefix shared by every instant of the window.
    pub part: String,
    /// Exclusive upper bound, FileMan form.
    pub to: String,
}

/// One half-open window `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Window {
    /// 1-based sequence number.
    pub number: usize,
    /// Inclusive start.
    pub start: NaiveDateTime,
    /// Exclusive end.
    pub end: NaiveDateTime,
    /// Backend filter derived from the bounds.
    pub filter: BoundaryFilter,
}

impl Window {
    /// Builds a window and its filter.
    pub fn new(number: usize, start: NaiveDateTime, end: NaiveDateTime) -> AdtResult<Self> {
        let filter = boundary_filter(start, end)?;
        Ok(Self {
            number,
            start,
            end,
            filter,
        })
    }

    /// Returns true if `ts` falls in `[start, end)`.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts < self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window {} [{}, {})", self.number, self.start, self.end)
    }
}

/// Lower-bound filter value that makes instant `ts` visible to the backend.
///
/// ```rust
/// use chrono::NaiveDate;
/// use vista_adt::adjust_from;
///
/// let day = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
/// // 00:00:00 - 1s = 23:59:59, seconds not a multiple of ten
/// assert_eq!(adjust_from(day.and_hms_opt(0, 0, 0).unwrap()), day.pred_opt().unwrap().and_hms_opt(23, 59, 59).unwrap());
/// // 09:30:01 - 1s = 09:30:00, a multiple of ten, so one more second
/// assert_eq!(adjust_from(day.and_hms_opt(9, 30, 1).unwrap()), day.and_hms_opt(9, 29, 59).unwrap());
/// ```
pub fn adjust_from(ts: NaiveDateTime) -> NaiveDateTime {
    let one = Duration::seconds(1);
    let adjusted = ts - one;
    if adjusted.second() % 10 == 0 {
        adjusted - one
    } else {
        adjusted
    }
}

/// Longest common prefix of the fixed forms of `start` and `end - 1s`,
/// without a dangling `.`.
pub fn index_prefix(start: NaiveDateTime, end: NaiveDateTime) -> AdtResult<String> {
    let last = end - Duration::seconds(1);
    let first = format_fixed(&start)?;
    let last = format_fixed(&last.max(start))?;
    let shared = first
        .chars()
        .zip(last.chars())
        .take_while(|(a, b)| a == b)
        .count();
    Ok(first[..shared].trim_end_matches('.').to_string())
}

/// Filter strings for `[start, end)`.
pub fn boundary_filter(start: NaiveDateTime, end: NaiveDateTime) -> AdtResult<BoundaryFilter> {
    Ok(BoundaryFilter {
        from: format_timestamp(&adjust_from(start))?,
        part: index_prefix(start, end)?,
        to: format_timestamp(&end)?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IterState {
    Idle,
    Positioned(NaiveDateTime, usize),
    Done,
}

/// Walks `[from, to)` window by window.
///
/// `Idle` until first polled, then `Positioned` at each window start, then
/// `Done` once no further start lies before `to`.
#[derive(Debug, Clone)]
pub struct WindowIterator {
    from: NaiveDateTime,
    to: NaiveDateTime,
    interval: IntervalSpec,
    state: IterState,
}

impl WindowIterator {
    /// Creates an iterator; fails on an empty or inverted range.
    pub fn new(from: NaiveDateTime, to: NaiveDateTime, interval: IntervalSpec) -> AdtResult<Self> {
        if from >= to {
            return Err(AdtError::Configuration(format!(
                "empty or inverted range: {from} to {to}"
            )));
        }
        Ok(Self {
            from,
            to,
            interval,
            state: IterState::Idle,
        })
    }

    /// Returns true once every window was produced.
    pub fn is_done(&self) -> bool {
        self.state == IterState::Done
    }
}

impl Iterator for WindowIterator {
    type Item = AdtResult<Window>;

    fn next(&mut self) -> Option<Self::Item> {
        let (start, number) = match self.state {
            IterState::Idle => (self.from, 1),
            IterState::Positioned(start, number) => (start, number),
            IterState::Done => return None,
        };

        let end = match self.interval.advance(start) {
            Some(next) if next < self.to => {
                self.state = IterState::Positioned(next, number + 1);
                next
            }
            _ => {
                self.state = IterState::Done;
                self.to
            }
        };

        Some(Window::new(number, start, end))
    }
}

/// Plans every window of `[from, to)` up front.
///
/// Fails with a configuration error on an empty range, a boundary outside
/// the FileMan range, or more than `max_windows` windows.
pub fn plan_windows(
    from: NaiveDateTime,
    to: NaiveDateTime,
    interval: IntervalSpec,
    max_windows: usize,
) -> AdtResult<Vec<Window>> {
    let mut windows = Vec::new();
    for window in WindowIterator::new(from, to, interval)? {
        let window = window.map_err(|err| AdtError::Configuration(err.to_string()))?;
        if windows.len() == max_windows {
            return Err(AdtError::Configuration(format!(
                "range {from} to {to} needs more than {max_windows} {interval} windows"
            )));
        }
        windows.push(window);
    }
    Ok(windows)
}

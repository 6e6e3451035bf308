//! Sequential windowed fetch.

use std::time::Instant;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::config::{CancellationFlag, EngineConfig, DEFAULT_MAX_WINDOWS};
use crate::error::{AdtError, AdtResult};
use crate::record::DecodedRecord;
use crate::result::{FetchStats, WindowSummary, WindowedResult};
use crate::window::{plan_windows, IntervalSpec, Window};

/// Runs a caller-supplied fetch once per window, strictly in order.
///
/// All windows are planned before the first fetch, so configuration errors
/// surface without touching the backend. A failing window aborts the run and
/// discards everything fetched so far; the error it returns reports the
/// window through [`AdtError::window`]. Cancellation is checked before each
/// window and returns the completed windows inside
/// [`AdtError::Cancelled`].
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use vista_adt::{IntervalSpec, WindowedFetcher};
///
/// let from = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let to = NaiveDate::from_ymd_opt(2023, 1, 4).unwrap().and_hms_opt(0, 0, 0).unwrap();
///
/// let mut seen = Vec::new();
/// let result = WindowedFetcher::new(IntervalSpec::Day)
///     .run(from, to, |window| {
///         seen.push(window.filter.part.clone());
///         Ok(Vec::new())
///     })
///     .unwrap();
///
/// assert_eq!(result.stats.windows, 3);
/// assert_eq!(seen, ["3230101", "3230102", "3230103"]);
/// ```
#[derive(Debug, Clone)]
pub struct WindowedFetcher {
    interval: IntervalSpec,
    max_windows: usize,
    cancellation: Option<CancellationFlag>,
}

impl WindowedFetcher {
    /// Creates a fetcher with the default window limit and no cancellation.
    pub fn new(interval: IntervalSpec) -> Self {
        Self {
            interval,
            max_windows: DEFAULT_MAX_WINDOWS,
            cancellation: None,
        }
    }

    /// Creates a fetcher from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            interval: config.interval,
            max_windows: config.max_windows,
            cancellation: config.cancellation.clone(),
        }
    }

    /// Overrides the window step.
    pub fn with_interval(mut self, interval: IntervalSpec) -> Self {
        self.interval = interval;
        self
    }

    /// Overrides the window limit.
    pub fn with_max_windows(mut self, max_windows: usize) -> Self {
        self.max_windows = max_windows;
        self
    }

    /// Attaches a cancellation flag.
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// Window step in use.
    pub fn interval(&self) -> IntervalSpec {
        self.interval
    }

    /// Plans the windows of `[from, to)` without fetching.
    pub fn plan(&self, from: NaiveDateTime, to: NaiveDateTime) -> AdtResult<Vec<Window>> {
        plan_windows(from, to, self.interval, self.max_windows)
    }

    /// Fetches every window of `[from, to)` and concatenates the results.
    ///
    /// A transport error from `fetch_fn` is tagged with the failing window's
    /// number.
    pub fn run<F>(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
        mut fetch_fn: F,
    ) -> AdtResult<WindowedResult>
    where
        F: FnMut(&Window) -> AdtResult<Vec<DecodedRecord>>,
    {
        let started = Instant::now();
        let windows = self.plan(from, to)?;
        let total = windows.len();

        let mut records = Vec::new();
        let mut summaries = Vec::with_capacity(total);

        for window in &windows {
            if self.is_cancelled() {
                info!(
                    completed = summaries.len(),
                    total,
                    records = records.len(),
                    "windowed fetch cancelled"
                );
                return Err(AdtError::Cancelled {
                    completed_windows: summaries.len(),
                    partial: records,
                });
            }

            debug!(
                window = window.number,
                total,
                start = %window.start,
                end = %window.end,
                "fetching window"
            );
            let batch = match fetch_fn(window) {
                Ok(batch) => batch,
                Err(err) => {
                    warn!(
                        window = window.number,
                        total,
                        discarded = records.len(),
                        error = %err,
                        "window failed"
                    );
                    return Err(err.in_window(window.number));
                }
            };

            let mut summary = WindowSummary::from(window);
            summary.records = batch.len();
            debug!(window = window.number, records = batch.len(), "window complete");

            records.extend(batch);
            summaries.push(summary);
        }

        let stats = FetchStats {
            duration: started.elapsed(),
            windows: summaries.len(),
            records: records.len(),
            trimmed: 0,
        };
        info!(
            windows = stats.windows,
            records = stats.records,
            elapsed_ms = stats.duration.as_millis() as u64,
            "windowed fetch complete"
        );

        Ok(WindowedResult {
            records,
            windows: summaries,
            stats,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationFlag::is_cancelled)
    }
}

//! ADT retrieval engine.

use chrono::NaiveDateTime;
use tracing::debug;
use vista_text::{parse_timestamp, RawBatch};

use crate::config::EngineConfig;
use crate::decoder::decode_with;
use crate::entities::{attr, EntityKind};
use crate::error::{AdtError, AdtResult};
use crate::fetcher::WindowedFetcher;
use crate::record::DecodedRecord;
use crate::resolver::ReferenceResolver;
use crate::result::WindowedResult;
use crate::stay::{reconstruct_stays, unique_checkin_ids, StayReport};
use crate::traits::{FetchQuery, LookupSource, PatientLookup, RecordSource};
use crate::window::{IntervalSpec, Window};

/// Main ADT engine.
///
/// Ties a transport, the session's lookup tables and the configuration
/// together: every batch it fetches is decoded, resolved against the tables
/// and, for time-indexed listings, trimmed to its window.
///
/// The engine calls its [`RecordSource`] strictly sequentially.
///
/// # Example
///
/// ```ignore
/// use vista_adt::{AdtEngine, EngineConfig, IntervalSpec};
///
/// let engine = AdtEngine::with_config(
///     &broker,
///     &tables,
///     EngineConfig::builder().with_interval(IntervalSpec::Week).build(),
/// );
///
/// let moves = engine.inpatient_moves("20230101", "20230401")?;
/// println!("{} movements in {} windows", moves.count(), moves.stats.windows);
/// ```
pub struct AdtEngine<'a> {
    /// Transport for remote listings.
    source: &'a dyn RecordSource,
    /// Read-only reference tables.
    lookups: &'a dyn LookupSource,
    /// Engine configuration.
    config: EngineConfig,
}

impl<'a> AdtEngine<'a> {
    /// Creates an engine with default configuration.
    pub fn new(source: &'a dyn RecordSource, lookups: &'a dyn LookupSource) -> Self {
        Self::with_config(source, lookups, EngineConfig::default())
    }

    /// Creates an engine with custom configuration.
    pub fn with_config(
        source: &'a dyn RecordSource,
        lookups: &'a dyn LookupSource,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            lookups,
            config,
        }
    }

    /// Returns a reference to the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Decodes a raw batch against the named schema and resolves its
    /// references.
    ///
    /// # Errors
    ///
    /// [`AdtError::UnknownSchema`] for an unregistered name, otherwise the
    /// decoder's errors under the configured key policy.
    pub fn decode_batch(&self, schema_name: &str, raw: &RawBatch) -> AdtResult<Vec<DecodedRecord>> {
        let kind: EntityKind = schema_name.parse()?;
        self.decode_kind(kind, raw)
    }

    fn decode_kind(&self, kind: EntityKind, raw: &RawBatch) -> AdtResult<Vec<DecodedRecord>> {
        let schema = kind.schema()?;
        let mut records = decode_with(&schema, raw, self.config.key_policy)?;
        ReferenceResolver::new(self.lookups).resolve(&mut records);
        Ok(records)
    }

    /// Runs one query against the transport, then decodes and resolves the
    /// response.
    ///
    /// Transport failures come back as [`AdtError::Transport`] without a
    /// window number.
    pub fn fetch(&self, query: &FetchQuery) -> AdtResult<Vec<DecodedRecord>> {
        debug!(schema = %query.schema, selector = ?query.selector, "fetching");
        let raw = self.source.fetch(query).map_err(AdtError::transport)?;
        self.decode_kind(query.schema, &raw)
    }

    // =========================================================================
    // Windowed retrieval
    // =========================================================================

    /// Runs `fetch_fn` over every window of `[from, to)`.
    ///
    /// Bounds accept FileMan (`3230101`) or external (`20230101`) dates, with
    /// an optional time. `interval` is one of `hour`, `day`, `week`, `month`.
    ///
    /// # Errors
    ///
    /// [`AdtError::Configuration`] for unparseable bounds, an unknown
    /// interval, an empty range or too many windows, all before the first
    /// call to `fetch_fn`. An error from `fetch_fn` aborts the run and comes
    /// back tagged with its window number: [`AdtError::Transport`] carries
    /// it directly, anything else is wrapped in [`AdtError::InWindow`].
    pub fn windowed_fetch<F>(
        &self,
        from: &str,
        to: &str,
        interval: &str,
        fetch_fn: F,
    ) -> AdtResult<WindowedResult>
    where
        F: FnMut(&Window) -> AdtResult<Vec<DecodedRecord>>,
    {
        let (from, to) = parse_range(from, to)?;
        let interval: IntervalSpec = interval.parse()?;
        WindowedFetcher::from_config(&self.config)
            .with_interval(interval)
            .run(from, to, fetch_fn)
    }

    /// Fetches a time-indexed listing window by window.
    ///
    /// Each window's records are trimmed to `[start, end)` by their
    /// timestamp; records without one are dropped with them. The count of
    /// dropped records is reported in [`FetchStats::trimmed`].
    ///
    /// [`FetchStats::trimmed`]: crate::FetchStats::trimmed
    pub fn fetch_windowed(
        &self,
        kind: EntityKind,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AdtResult<WindowedResult> {
        let mut trimmed = 0usize;
        let mut result = WindowedFetcher::from_config(&self.config).run(from, to, |window| {
            let mut records = self.fetch(&FetchQuery::window(kind, window.filter.clone()))?;
            let before = records.len();
            records.retain(|record| {
                record
                    .timestamp(attr::TIMESTAMP)
                    .is_some_and(|ts| window.contains(ts))
            });
            if records.len() < before {
                debug!(
                    window = window.number,
                    dropped = before - records.len(),
                    "trimmed records outside window"
                );
            }
            trimmed += before - records.len();
            Ok(records)
        })?;
        result.stats.trimmed = trimmed;
        Ok(result)
    }

    /// All patient movements timestamped within `[from, to)`, resolved.
    ///
    /// Uses the configured interval.
    pub fn inpatient_moves(&self, from: &str, to: &str) -> AdtResult<WindowedResult> {
        let (from, to) = parse_range(from, to)?;
        self.fetch_windowed(EntityKind::Movement, from, to)
    }

    // =========================================================================
    // Stays
    // =========================================================================

    /// Stays whose check-in falls within `[from, to)`.
    ///
    /// Check-in ids are discovered from the windowed check-in listing, then
    /// each stay's movements are fetched by check-in id and grouped.
    pub fn stay_movements_by_date_range<P>(
        &self,
        from: &str,
        to: &str,
        lookup: &P,
    ) -> AdtResult<StayReport>
    where
        P: PatientLookup + ?Sized,
    {
        let (from, to) = parse_range(from, to)?;
        let checkins = self.fetch_windowed(EntityKind::Checkin, from, to)?;
        let ids = unique_checkin_ids(&checkins.records, from, to);
        debug!(checkins = ids.len(), "fetching stay movements");

        let mut movements = Vec::new();
        for id in &ids {
            movements.extend(self.fetch(&FetchQuery::key(EntityKind::Movement, id.as_str()))?);
        }
        reconstruct_stays(&movements, lookup)
    }

    /// Movements of the single stay with `checkin_id`.
    pub fn stay_movements<P>(&self, checkin_id: &str, lookup: &P) -> AdtResult<StayReport>
    where
        P: PatientLookup + ?Sized,
    {
        let checkin_id = checkin_id.trim();
        if checkin_id.is_empty() {
            return Err(AdtError::Configuration("check-in id is empty".to_string()));
        }
        let movements = self.fetch(&FetchQuery::key(EntityKind::Movement, checkin_id))?;
        reconstruct_stays(&movements, lookup)
    }

    /// Groups already decoded movements into stays.
    pub fn reconstruct_stays<P>(
        &self,
        records: &[DecodedRecord],
        lookup: &P,
    ) -> AdtResult<StayReport>
    where
        P: PatientLookup + ?Sized,
    {
        reconstruct_stays(records, lookup)
    }
}

fn parse_bound(value: &str) -> AdtResult<NaiveDateTime> {
    parse_timestamp(value.trim())
        .map_err(|err| AdtError::Configuration(format!("invalid date {value:?}: {err}")))
}

fn parse_range(from: &str, to: &str) -> AdtResult<(NaiveDateTime, NaiveDateTime)> {
    Ok((parse_bound(from)?, parse_bound(to)?))
}

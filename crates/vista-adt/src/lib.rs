//! # vista-adt
//!
//! Decoding and windowed retrieval of VistA admission, discharge and transfer
//! (ADT) records.
//!
//! This crate turns the flat text tokenized by [`vista_text`] into typed
//! records and assembles them into clinical encounters:
//!
//! - **Entity decoders** - one declared schema table per listing, validated
//!   when built, plus small static code tables
//! - **Reference resolver** - codes resolved against session lookup tables
//!   and, for self-referencing listings, against the batch itself
//! - **Date-window iterator** - a range cut into hour, day, week or month
//!   windows with the backend's boundary quirks applied
//! - **Stay reconstructor** - movements grouped by check-in id, one patient
//!   per stay, conflicts reported rather than merged
//!
//! The crate owns no connection. A host supplies a [`RecordSource`], a
//! [`LookupSource`] and, for stays, a [`PatientLookup`].
//!
//! ## Quick Start
//!
//! ```rust
//! use vista_adt::{decode_batch, KeyPolicy, LookupDomain, LookupTable, LookupTables,
//!     ReferenceResolver};
//! use vista_text::RawBatch;
//!
//! let raw = RawBatch::from_response("123^3230401.093^1^456^^12^^^");
//! let mut records = decode_batch("movement", &raw, KeyPolicy::SkipRecord).unwrap();
//!
//! let tables = LookupTables::new().with_table(LookupTable::from_pairs(
//!     LookupDomain::WardLocations,
//!     [("12", "3 NORTH")],
//! ));
//! ReferenceResolver::new(&tables).resolve(&mut records);
//!
//! assert_eq!(records[0].label("transaction"), Some("ADMISSION"));
//! assert_eq!(records[0].label("ward"), Some("3 NORTH"));
//! ```
//!
//! ## Windowed Retrieval
//!
//! ```ignore
//! use vista_adt::{AdtEngine, EngineConfig, IntervalSpec};
//!
//! let config = EngineConfig::builder()
//!     .with_interval(IntervalSpec::Week)
//!     .with_max_windows(520)
//!     .build();
//! let engine = AdtEngine::with_config(&broker, &tables, config);
//!
//! let moves = engine.inpatient_moves("20230101", "20230401")?;
//! let stays = engine.stay_movements_by_date_range("20230101", "20230401", &patients)?;
//! for conflict in &stays.conflicts {
//!     eprintln!("{conflict}");
//! }
//! ```
//!
//! ## Schemas
//!
//! | Schema | Layout | Key |
//! |--------|--------|-----|
//! | `movement` | simple, at least 4 fields | field 0 |
//! | `checkin` | simple, exactly 3 fields | field 0 |
//! | `appointment` | composite | `A` + timestamp + clinic |
//! | `hospital_location` | simple, exactly 18 fields | field 0 |
//! | `ward` | composite, inactive wards dropped | field 0 |
//! | `site_division` | simple, at least 3 fields | field 0 |
//! | `visit` | simple, `;` pieces in field 0 | field 0 |
//!
//! ## Feature Flags
//!
//! - `serde` - Serialize/Deserialize on the data model
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         vista-adt                            │
//! │                                                              │
//! │  AdtEngine                                                   │
//! │  ├── plan windows (WindowIterator)                           │
//! │  ├── fetch each window (RecordSource)                        │
//! │  ├── tokenize + decode (vista-text, Schema)                  │
//! │  ├── resolve references (LookupSource, same batch)           │
//! │  ├── trim to window                                          │
//! │  └── group into stays (PatientLookup)                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod codes;
mod config;
mod decoder;
mod engine;
mod entities;
mod error;
mod fetcher;
mod lookup;
mod ordered_set;
mod record;
mod resolver;
mod result;
mod schema;
mod stay;
mod traits;
mod window;

// Public re-exports
pub use codes::{
    CodeTable, Fallback, APPOINTMENT_PURPOSE, APPOINTMENT_STATUS, DISPOSITION_ACTION,
    LOCATION_SERVICE, LOCATION_TYPE, MOVEMENT_TRANSACTION,
};
pub use config::{CancellationFlag, EngineConfig, EngineConfigBuilder, DEFAULT_MAX_WINDOWS};
pub use decoder::{decode_batch, decode_line, decode_with, encode_record, KeyPolicy};
pub use engine::AdtEngine;
pub use entities::{attr, EntityKind};
pub use error::{AdtError, AdtResult, DataIntegrityError};
pub use fetcher::WindowedFetcher;
pub use lookup::{LookupDomain, LookupTable, LookupTables};
pub use ordered_set::OrderedKeySet;
pub use record::{Coded, DecodedRecord, Reference, Target, Value};
pub use resolver::{ReferenceIndex, ReferenceResolver, ResolutionStats};
pub use result::{FetchStats, WindowSummary, WindowedResult};
pub use schema::{
    FieldCount, FieldDecode, FieldSpec, KeyRule, Layout, Piece, Position, Schema, SchemaBuilder,
};
pub use stay::{reconstruct_stays, unique_checkin_ids, Stay, StayReport};
pub use traits::{BoxError, FetchQuery, LookupSource, Patient, PatientLookup, RecordSource, Selector};
pub use window::{
    adjust_from, boundary_filter, index_prefix, plan_windows, BoundaryFilter, IntervalSpec, Window,
    WindowIterator,
};

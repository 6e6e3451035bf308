//! Collaborator traits.
//!
//! The engine owns no connection and no reference data. A host hands it a
//! [`RecordSource`] (the RPC session), a [`LookupSource`] (reference tables
//! loaded once per session) and, for stay reconstruction, a
//! [`PatientLookup`].
//!
//! # Example: an in-memory record source
//!
//! ```rust
//! use vista_adt::{BoxError, FetchQuery, RecordSource};
//! use vista_text::RawBatch;
//!
//! struct CannedSource(String);
//!
//! impl RecordSource for CannedSource {
//!     fn fetch(&self, _query: &FetchQuery) -> Result<RawBatch, BoxError> {
//!         Ok(RawBatch::from_response(&self.0))
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use vista_text::RawBatch;

use crate::entities::EntityKind;
use crate::lookup::{LookupDomain, LookupTable};
use crate::window::BoundaryFilter;

/// Opaque collaborator error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Record source
// =============================================================================

/// What a single fetch asks the backend for.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FetchQuery {
    /// Listing whose layout the response follows.
    pub schema: EntityKind,
    /// Which records of that listing to return.
    pub selector: Selector,
}

/// Record selection for a [`FetchQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Selector {
    /// Records indexed inside one time window.
    Window(BoundaryFilter),
    /// Records filed under one key, such as a check-in id.
    Key(String),
    /// The whole listing.
    All,
}

impl FetchQuery {
    /// Query for one window of a time-indexed listing.
    pub fn window(schema: EntityKind, filter: BoundaryFilter) -> Self {
        Self {
            schema,
            selector: Selector::Window(filter),
        }
    }

    /// Query for records filed under `key`.
    pub fn key(schema: EntityKind, key: impl Into<String>) -> Self {
        Self {
            schema,
            selector: Selector::Key(key.into()),
        }
    }

    /// Query for a whole listing.
    pub fn all(schema: EntityKind) -> Self {
        Self {
            schema,
            selector: Selector::All,
        }
    }
}

/// Transport that runs one named remote call and returns its raw text.
///
/// Sessions are stateful, so the engine never calls `fetch` concurrently.
/// Implementations may use interior mutability for session state.
pub trait RecordSource {
    /// Executes one round trip.
    fn fetch(&self, query: &FetchQuery) -> Result<RawBatch, BoxError>;
}

impl<T: RecordSource + ?Sized> RecordSource for &T {
    fn fetch(&self, query: &FetchQuery) -> Result<RawBatch, BoxError> {
        (**self).fetch(query)
    }
}

// =============================================================================
// Lookup source
// =============================================================================

/// Read-only provider of reference tables.
///
/// Returning `None` means the domain was not loaded; every code of that
/// domain then stays unresolved.
pub trait LookupSource: Send + Sync {
    /// Returns the table for `domain`, if loaded.
    fn lookup_table(&self, domain: LookupDomain) -> Option<&LookupTable>;
}

impl<T: LookupSource + ?Sized> LookupSource for &T {
    fn lookup_table(&self, domain: LookupDomain) -> Option<&LookupTable> {
        (**self).lookup_table(domain)
    }
}

impl<T: LookupSource + ?Sized> LookupSource for Arc<T> {
    fn lookup_table(&self, domain: LookupDomain) -> Option<&LookupTable> {
        (**self).lookup_table(domain)
    }
}

// =============================================================================
// Patient lookup
// =============================================================================

/// Patient summary returned by the patient collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Patient {
    /// Site-local patient id (DFN).
    pub local_id: String,
    /// Display name, `LAST,FIRST`.
    pub name: Option<String>,
    /// Additional identifiers keyed by kind, e.g. `"ssn"`, `"icn"`.
    pub identifiers: BTreeMap<String, String>,
}

impl Patient {
    /// Creates a patient with only a local id.
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            ..Default::default()
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds an identifier.
    pub fn with_identifier(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.identifiers.insert(kind.into(), value.into());
        self
    }
}

/// Resolves a patient summary from a local id. May itself be remote.
pub trait PatientLookup {
    /// Looks up one patient.
    fn lookup_patient(&self, local_id: &str) -> Result<Patient, BoxError>;
}

impl<F> PatientLookup for F
where
    F: Fn(&str) -> Result<Patient, BoxError>,
{
    fn lookup_patient(&self, local_id: &str) -> Result<Patient, BoxError> {
        self(local_id)
    }
}

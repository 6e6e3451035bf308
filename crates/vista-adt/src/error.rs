//! Error types for ADT decoding and retrieval.

use thiserror::Error;

use crate::record::DecodedRecord;
use crate::traits::BoxError;

/// Two movements of one stay name different patients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("check-in {checkin_id} has movements for patients {first_patient} and {conflicting_patient}")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataIntegrityError {
    /// Check-in id shared by the conflicting movements.
    pub checkin_id: String,
    /// Patient local id of the first movement in the group.
    pub first_patient: String,
    /// The differing patient local id.
    pub conflicting_patient: String,
}

/// Errors that can occur while decoding or retrieving ADT records.
#[derive(Error, Debug)]
pub enum AdtError {
    /// Malformed raw text.
    #[error("format error: {0}")]
    Format(#[from] vista_text::TextError),

    /// A record's primary key field is absent.
    #[error("missing primary key for {schema} in line: {line}")]
    MissingPrimaryKey {
        /// Schema being decoded.
        schema: String,
        /// The offending raw line.
        line: String,
    },

    /// A schema table failed validation.
    #[error("invalid schema {schema}: {message}")]
    Schema {
        /// Schema name.
        schema: String,
        /// What is wrong with it.
        message: String,
    },

    /// No schema is registered under this name.
    #[error("unknown schema: {0}")]
    UnknownSchema(String),

    /// No lookup domain is registered under this name.
    #[error("unknown lookup domain: {0}")]
    UnknownDomain(String),

    /// Invalid interval, date range or engine setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The record source failed.
    #[error("{}", transport_message(.window))]
    Transport {
        /// 1-based window number, if the call belonged to a window.
        window: Option<usize>,
        /// The collaborator's error, unchanged.
        #[source]
        source: BoxError,
    },

    /// A window's records could not be decoded.
    #[error("window {window} failed: {source}")]
    InWindow {
        /// 1-based window number.
        window: usize,
        /// The decode or resolution error raised for that window.
        #[source]
        source: Box<AdtError>,
    },

    /// Cross-record consistency violation.
    #[error("data integrity error: {0}")]
    DataIntegrity(DataIntegrityError),

    /// The caller cancelled between windows.
    #[error("cancelled after {completed_windows} completed windows")]
    Cancelled {
        /// Number of windows fully fetched before the stop.
        completed_windows: usize,
        /// Records from the completed windows, in window order.
        partial: Vec<DecodedRecord>,
    },

    /// The patient collaborator failed.
    #[error("failed to resolve patient {local_id}")]
    PatientResolution {
        /// Local id that was looked up.
        local_id: String,
        /// The collaborator's error.
        #[source]
        source: BoxError,
    },
}

fn transport_message(window: &Option<usize>) -> String {
    match window {
        Some(n) => format!("transport error in window {n}"),
        None => "transport error".to_string(),
    }
}

impl AdtError {
    /// Wraps a collaborator error that happened outside any window.
    pub fn transport(source: impl Into<BoxError>) -> Self {
        AdtError::Transport {
            window: None,
            source: source.into(),
        }
    }

    /// Attaches a window number to an error raised while fetching that
    /// window.
    ///
    /// Transport errors record the number in place; other errors are wrapped
    /// in [`AdtError::InWindow`]. Errors that already carry a number, and
    /// cancellations, are returned unchanged.
    pub fn in_window(self, number: usize) -> Self {
        match self {
            AdtError::Transport {
                window: None,
                source,
            } => AdtError::Transport {
                window: Some(number),
                source,
            },
            err @ (AdtError::Transport { .. }
            | AdtError::InWindow { .. }
            | AdtError::Cancelled { .. }) => err,
            other => AdtError::InWindow {
                window: number,
                source: Box::new(other),
            },
        }
    }

    /// Window number the error was raised in, if any.
    pub fn window(&self) -> Option<usize> {
        match self {
            AdtError::Transport { window, .. } => *window,
            AdtError::InWindow { window, .. } => Some(*window),
            _ => None,
        }
    }

    /// The error with any window wrapper removed.
    pub fn inner(&self) -> &AdtError {
        match self {
            AdtError::InWindow { source, .. } => source.inner(),
            other => other,
        }
    }
}

/// Result type for ADT operations.
pub type AdtResult<T> = std::result::Result<T, AdtError>;

//! Error types for tokenizing VistA RPC text.

use thiserror::Error;

/// Errors that can occur while tokenizing or decoding raw VistA text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextError {
    /// A line did not carry the number of `^` pieces its layout requires.
    #[error("expected {expected} fields but found {found} in line: {line}")]
    FieldCount {
        /// The offending raw line.
        line: String,
        /// Number of fields required.
        expected: usize,
        /// Number of fields present.
        found: usize,
    },

    /// A composite part opened an escape sequence that never terminates.
    #[error("unterminated escape in part {part} of line: {line}")]
    UnterminatedPart {
        /// The offending raw line.
        line: String,
        /// Zero-based part number within the composite line.
        part: usize,
    },

    /// A timestamp could not be read in FileMan or external date form.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Empty input where a value was required.
    #[error("empty input")]
    EmptyInput,
}

/// Result type for text operations.
pub type TextResult<T> = std::result::Result<T, TextError>;

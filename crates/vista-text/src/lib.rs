//! # vista-text
//!
//! Tokenizer and timestamp codec for the flat delimited text that VistA
//! remote procedures return.
//!
//! This crate provides:
//! - **Tokenizer**: split a response into lines, `^` fields, `;` sub-fields
//!   and `~` composite parts, restoring escaped carets
//! - **FileMan codec**: exact conversion between `YYYMMDD.HHMMSS` and
//!   calendar date-times
//! - **Line encoder**: build response lines for fixtures and round-trip checks
//!
//! It knows nothing about entities; decoding lines into records lives in
//! `vista-adt`.
//!
//! ## Delimiter hierarchy
//!
//! | Level | Separator | Example |
//! |-------|-----------|---------|
//! | Line | `\r\n` or `\n` | one record per line |
//! | Part | `~` | `main~part II~part III` |
//! | Field | `^` | `123^3230401.093^1` |
//! | Sub-field | `;` | `V;3230401.093;12` |
//! | Escape | `&#94;` | a literal `^` inside a composite part |
//!
//! ## Usage
//!
//! ```rust
//! use vista_text::{parse_timestamp, tokenize};
//!
//! let records = tokenize("123^3230401.093^1^456\r\n124^3230402^3^456\r\n");
//! assert_eq!(records.len(), 2);
//!
//! let ts = parse_timestamp(records[0].field(1).unwrap()).unwrap();
//! assert_eq!(ts.to_string(), "2023-04-01 09:30:00");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod encoder;
mod error;
mod fileman;
mod tokenizer;

pub use encoder::{encode_line, escape_field, LineEncoder};
pub use error::{TextError, TextResult};
pub use fileman::{format_fixed, format_timestamp, in_range, parse_timestamp, MAX_YEAR, MIN_YEAR};
pub use tokenizer::{
    restore_escapes, split_lines, tokenize, tokenize_composite, tokenize_line, RawBatch,
    RawRecord, ESCAPED_CARET, FIELD_SEPARATOR, PART_SEPARATOR, SUBFIELD_SEPARATOR,
};

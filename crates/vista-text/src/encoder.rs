//! Line encoder, the inverse of the tokenizer.
//!
//! Used to build response fixtures and to check that decoded records encode
//! back to the line they came from.

use crate::tokenizer::{FIELD_SEPARATOR, PART_SEPARATOR, SUBFIELD_SEPARATOR};

/// Builds one response line field by field.
///
/// # Example
///
/// ```rust
/// use vista_text::{tokenize_composite, LineEncoder};
///
/// let line = LineEncoder::new()
///     .field("42")
///     .field("3 NORTH")
///     .empty()
///     .part()
///     .field("3 NORTH^3N^555-0100")
///     .build_composite();
/// assert_eq!(line, "42^3 NORTH^~3 NORTH&#94;3N&#94;555-0100");
///
/// let record = tokenize_composite(&line).unwrap();
/// assert_eq!(record.part_field(1, 0), Some("3 NORTH^3N^555-0100"));
/// ```
#[derive(Debug, Clone)]
pub struct LineEncoder {
    parts: Vec<Vec<String>>,
}

impl Default for LineEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEncoder {
    /// Creates an encoder positioned on the main part.
    pub fn new() -> Self {
        Self {
            parts: vec![Vec::new()],
        }
    }

    /// Appends a field to the current part.
    pub fn field(mut self, value: impl Into<String>) -> Self {
        self.current().push(value.into());
        self
    }

    /// Appends a field, or an empty one for `None`.
    pub fn opt_field(self, value: Option<&str>) -> Self {
        self.field(value.unwrap_or_default())
    }

    /// Appends an empty field.
    pub fn empty(self) -> Self {
        self.field(String::new())
    }

    /// Appends `count` empty fields.
    pub fn empties(mut self, count: usize) -> Self {
        for _ in 0..count {
            self = self.empty();
        }
        self
    }

    /// Appends one field made of `;`-joined sub-fields.
    pub fn subfields(self, values: &[&str]) -> Self {
        let joined = values.join(SUBFIELD_SEPARATOR.to_string().as_str());
        self.field(joined)
    }

    /// Starts the next supplemental part.
    pub fn part(mut self) -> Self {
        self.parts.push(Vec::new());
        self
    }

    /// Renders a simple line. Supplemental parts are ignored and no escaping
    /// is applied.
    pub fn build(&self) -> String {
        encode_line(&self.parts[0])
    }

    /// Renders a composite line, escaping every field.
    pub fn build_composite(&self) -> String {
        self.parts
            .iter()
            .map(|fields| {
                fields
                    .iter()
                    .map(|field| escape_field(field))
                    .collect::<Vec<_>>()
                    .join(FIELD_SEPARATOR.to_string().as_str())
            })
            .collect::<Vec<_>>()
            .join(PART_SEPARATOR.to_string().as_str())
    }

    fn current(&mut self) -> &mut Vec<String> {
        let last = self.parts.len() - 1;
        &mut self.parts[last]
    }
}

/// Joins fields with `^`.
pub fn encode_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR.to_string().as_str())
}

/// Escapes the delimiters a composite field cannot carry literally.
///
/// `^` becomes `&#94;`, `~` becomes `&#126;`, and an `&` that would open a
/// character reference becomes `&#38;`.
pub fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            FIELD_SEPARATOR => out.push_str("&#94;"),
            PART_SEPARATOR => out.push_str("&#126;"),
            '&' if chars.peek() == Some(&'#') => out.push_str("&#38;"),
            other => out.push(other),
        }
    }
    out
}

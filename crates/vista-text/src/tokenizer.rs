//! Record tokenizer for VistA RPC responses, built on nom.
//!
//! Responses are flat text: one record per line, `^`-delimited pieces, with
//! `;` sub-pieces inside some fields. Lister calls that append identifier
//! output produce composite lines whose parts are separated by `~`; inside
//! those parts a literal caret travels as the character reference `&#94;`.

use nom::{
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1},
    combinator::{all_consuming, map_opt},
    multi::separated_list0,
    sequence::{delimited, preceded},
    IResult,
};

use crate::error::{TextError, TextResult};

/// Piece separator within a line.
pub const FIELD_SEPARATOR: char = '^';

/// Sub-piece separator within a single field.
pub const SUBFIELD_SEPARATOR: char = ';';

/// Separator between the main line and its supplemental parts.
pub const PART_SEPARATOR: char = '~';

/// Escaped form of [`FIELD_SEPARATOR`] inside composite parts.
pub const ESCAPED_CARET: &str = "&#94;";

/// The unparsed text returned by one backend round trip.
///
/// Blank lines are dropped on construction; line order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawBatch {
    lines: Vec<String>,
}

impl RawBatch {
    /// Creates an empty batch.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Splits a single response string on its line separators.
    ///
    /// ```rust
    /// use vista_text::RawBatch;
    ///
    /// let batch = RawBatch::from_response("1^A\r\n\r\n2^B\r\n");
    /// assert_eq!(batch.len(), 2);
    /// ```
    pub fn from_response(text: &str) -> Self {
        Self {
            lines: split_lines(text).into_iter().map(str::to_string).collect(),
        }
    }

    /// Wraps lines that the transport already split.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(Into::into)
                .filter(|line: &String| !is_blank(line))
                .collect(),
        }
    }

    /// Returns the non-blank lines in response order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of non-blank lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if the backend returned nothing.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Tokenizes every line as a simple `^`-delimited record.
    pub fn records(&self) -> Vec<RawRecord> {
        self.lines.iter().map(|line| tokenize_line(line)).collect()
    }

    /// Tokenizes every line as a composite record.
    ///
    /// Fails on the first line carrying an unterminated escape.
    pub fn composite_records(&self) -> TextResult<Vec<RawRecord>> {
        self.lines.iter().map(|line| tokenize_composite(line)).collect()
    }
}

/// One tokenized line.
///
/// Part 0 holds the main `^` pieces; parts 1 and 2 are the supplemental
/// sections of a composite line, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    line: String,
    parts: Vec<Vec<String>>,
}

impl RawRecord {
    /// The original line, before splitting.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Main-part fields, including empty ones.
    pub fn fields(&self) -> &[String] {
        &self.parts[0]
    }

    /// Number of main-part fields.
    pub fn field_count(&self) -> usize {
        self.parts[0].len()
    }

    /// Returns a main-part field, or `None` when it is absent or empty.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.part_field(0, index)
    }

    /// Returns a main-part field as sent, even when empty.
    pub fn raw_field(&self, index: usize) -> Option<&str> {
        self.parts[0].get(index).map(String::as_str)
    }

    /// Number of parts (1 for a simple line).
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Fields of the given part.
    pub fn part(&self, part: usize) -> Option<&[String]> {
        self.parts.get(part).map(Vec::as_slice)
    }

    /// Returns a field of the given part, or `None` when absent or empty.
    pub fn part_field(&self, part: usize, index: usize) -> Option<&str> {
        self.parts
            .get(part)
            .and_then(|fields| fields.get(index))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Splits a main-part field on `separator`.
    ///
    /// Returns an empty Vec when the field is absent or empty.
    pub fn subfields(&self, index: usize, separator: char) -> Vec<&str> {
        self.field(index)
            .map(|value| value.split(separator).collect())
            .unwrap_or_default()
    }

    /// Checks that the main part has exactly `expected` fields.
    pub fn expect_fields(&self, expected: usize) -> TextResult<()> {
        if self.field_count() == expected {
            Ok(())
        } else {
            Err(TextError::FieldCount {
                line: self.line.clone(),
                expected,
                found: self.field_count(),
            })
        }
    }
}

/// Splits raw text into lines, dropping blank ones.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|line| !is_blank(line)).collect()
}

/// Tokenizes a simple line on `^`. No escape processing is applied.
///
/// ```rust
/// use vista_text::tokenize_line;
///
/// let record = tokenize_line("123^3230401.093^^456");
/// assert_eq!(record.field_count(), 4);
/// assert_eq!(record.field(0), Some("123"));
/// assert_eq!(record.field(2), None);
/// ```
pub fn tokenize_line(line: &str) -> RawRecord {
    let line = line.trim_end_matches('\r');
    RawRecord {
        line: line.to_string(),
        parts: vec![split_fields(line)],
    }
}

/// Tokenizes a composite line: `~` parts first, then `^` fields, then
/// restores character references such as `&#94;` inside every field.
pub fn tokenize_composite(line: &str) -> TextResult<RawRecord> {
    let line = line.trim_end_matches('\r');
    let mut parts = Vec::new();

    for (part_no, part) in split_parts(line).into_iter().enumerate() {
        let fields = split_fields(part)
            .into_iter()
            .map(|field| {
                restore_escapes(&field).ok_or_else(|| TextError::UnterminatedPart {
                    line: line.to_string(),
                    part: part_no,
                })
            })
            .collect::<TextResult<Vec<_>>>()?;
        parts.push(fields);
    }

    Ok(RawRecord {
        line: line.to_string(),
        parts,
    })
}

/// Splits raw text into simple records, in input order.
pub fn tokenize(text: &str) -> Vec<RawRecord> {
    split_lines(text).into_iter().map(tokenize_line).collect()
}

/// Replaces `&#NN;` character references with the character they name.
///
/// Any other `&#` is ordinary text and is kept as sent. Returns `None` only
/// when the field ends inside a reference (`&#94` with no `;`).
///
/// ```rust
/// use vista_text::restore_escapes;
///
/// assert_eq!(restore_escapes("3 NORTH&#94;3N").as_deref(), Some("3 NORTH^3N"));
/// assert_eq!(restore_escapes("AT&#T CLINIC").as_deref(), Some("AT&#T CLINIC"));
/// assert_eq!(restore_escapes("3 NORTH&#94"), None);
/// ```
pub fn restore_escapes(field: &str) -> Option<String> {
    if !field.contains("&#") {
        return Some(field.to_string());
    }

    let mut out = String::with_capacity(field.len());
    let mut rest = field;
    while let Some(pos) = rest.find("&#") {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        if let Ok((remaining, ch)) = escape_sequence(candidate) {
            out.push(ch);
            rest = remaining;
        } else if truncated_escape(candidate).is_ok() {
            return None;
        } else {
            out.push_str("&#");
            rest = &candidate[2..];
        }
    }
    out.push_str(rest);
    Some(out)
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

// ============================================================================
// nom parsers
// ============================================================================

fn split_fields(input: &str) -> Vec<String> {
    match all_consuming(fields)(input) {
        Ok((_, pieces)) => pieces.into_iter().map(str::to_string).collect(),
        // `fields` consumes everything it is given; keep the line whole otherwise.
        Err(_) => vec![input.to_string()],
    }
}

fn split_parts(input: &str) -> Vec<&str> {
    match all_consuming(parts)(input) {
        Ok((_, pieces)) => pieces,
        Err(_) => vec![input],
    }
}

fn fields(input: &str) -> IResult<&str, Vec<&str>> {
    separated_list0(char(FIELD_SEPARATOR), take_while(|c| c != FIELD_SEPARATOR))(input)
}

fn parts(input: &str) -> IResult<&str, Vec<&str>> {
    separated_list0(char(PART_SEPARATOR), take_while(|c| c != PART_SEPARATOR))(input)
}

fn escape_sequence(input: &str) -> IResult<&str, char> {
    delimited(
        tag("&#"),
        map_opt(digit1, |digits: &str| {
            digits.parse::<u32>().ok().and_then(char::from_u32)
        }),
        char(';'),
    )(input)
}

/// `&#` and digits running to the end of the field.
fn truncated_escape(input: &str) -> IResult<&str, &str> {
    all_consuming(preceded(tag("&#"), digit1))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines_drops_blank_lines() {
        let lines = split_lines("a^b\r\n\r\n  \nc^d\n");
        assert_eq!(lines, vec!["a^b", "c^d"]);
    }

    #[test]
    fn test_tokenize_line_keeps_empty_fields() {
        let record = tokenize_line("123^20230401.093000^1^456^^^^^");
        assert_eq!(record.field_count(), 9);
        assert_eq!(record.field(0), Some("123"));
        assert_eq!(record.field(3), Some("456"));
        assert_eq!(record.field(4), None);
        assert_eq!(record.raw_field(4), Some(""));
        assert_eq!(record.raw_field(9), None);
    }

    #[test]
    fn test_tokenize_line_empty_line_is_single_empty_field() {
        let record = tokenize_line("");
        assert_eq!(record.field_count(), 1);
        assert_eq!(record.field(0), None);
    }

    #[test]
    fn test_tokenize_line_strips_carriage_return() {
        let record = tokenize_line("1^2\r");
        assert_eq!(record.field(1), Some("2"));
        assert_eq!(record.line(), "1^2");
    }

    #[test]
    fn test_subfields() {
        let record = tokenize_line("V;3230401.0930;12^3230401.0930^CARDIOLOGY");
        assert_eq!(record.subfields(0, SUBFIELD_SEPARATOR), vec!["V", "3230401.0930", "12"]);
        assert!(record.subfields(5, SUBFIELD_SEPARATOR).is_empty());
    }

    #[test]
    fn test_tokenize_composite_three_parts() {
        let record = tokenize_composite("3230401.09^12^I^^^^3^5^FUTURE~CARDIOLOGY&#94;2~555-1234").unwrap();
        assert_eq!(record.part_count(), 3);
        assert_eq!(record.field(0), Some("3230401.09"));
        assert_eq!(record.part_field(1, 0), Some("CARDIOLOGY^2"));
        assert_eq!(record.part_field(1, 1), None);
        assert_eq!(record.part_field(2, 0), Some("555-1234"));
    }

    #[test]
    fn test_tokenize_composite_without_parts() {
        let record = tokenize_composite("1^2^3").unwrap();
        assert_eq!(record.part_count(), 1);
        assert!(record.part(1).is_none());
    }

    #[test]
    fn test_tokenize_composite_unterminated_escape() {
        let err = tokenize_composite("1^2~NAME&#94").unwrap_err();
        assert_eq!(
            err,
            TextError::UnterminatedPart {
                line: "1^2~NAME&#94".to_string(),
                part: 1,
            }
        );
    }

    #[test]
    fn test_restore_escapes() {
        assert_eq!(restore_escapes("A&#94;B&#94;C").as_deref(), Some("A^B^C"));
        assert_eq!(restore_escapes("plain").as_deref(), Some("plain"));
        assert_eq!(restore_escapes("A&B").as_deref(), Some("A&B"));
        assert_eq!(restore_escapes("A&#x;").as_deref(), Some("A&#x;"));
    }

    #[test]
    fn test_restore_escapes_keeps_literal_ampersand_hash() {
        assert_eq!(restore_escapes("AT&#T CLINIC").as_deref(), Some("AT&#T CLINIC"));
        assert_eq!(restore_escapes("ROOM &#").as_deref(), Some("ROOM &#"));
        assert_eq!(restore_escapes("&#&#94;").as_deref(), Some("&#^"));
        assert_eq!(restore_escapes("&#94 WEST").as_deref(), Some("&#94 WEST"));
        assert!(restore_escapes("WEST&#94").is_none());
    }

    #[test]
    fn test_tokenize_composite_literal_ampersand_hash() {
        let record = tokenize_composite("12^AT&#T CLINIC^8^^44^W&#94;X&#94;555").unwrap();
        assert_eq!(record.field(1), Some("AT&#T CLINIC"));
        assert_eq!(record.field(5), Some("W^X^555"));
    }

    #[test]
    fn test_expect_fields() {
        let record = tokenize_line("1^2^3");
        assert!(record.expect_fields(3).is_ok());
        assert!(matches!(
            record.expect_fields(4),
            Err(TextError::FieldCount { expected: 4, found: 3, .. })
        ));
    }

    #[test]
    fn test_raw_batch_from_lines_filters_blank() {
        let batch = RawBatch::from_lines(vec!["1^A", "", "2^B"]);
        assert_eq!(batch.len(), 2);
        let records = batch.records();
        assert_eq!(records[0].field(1), Some("A"));
        assert_eq!(records[1].field(1), Some("B"));
    }

    #[test]
    fn test_raw_batch_empty() {
        let batch = RawBatch::from_response("");
        assert!(batch.is_empty());
        assert!(batch.records().is_empty());
    }
}

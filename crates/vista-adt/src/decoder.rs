//! Entity decoders.
//!
//! Walks a [`Schema`] over tokenized lines and produces [`DecodedRecord`]s.
//! References are left unresolved here; see [`crate::resolver`].

use tracing::{debug, warn};
use vista_text::{
    format_timestamp, parse_timestamp, tokenize_composite, tokenize_line, LineEncoder, RawBatch,
    RawRecord, TextError,
};

use crate::entities::EntityKind;
use crate::error::{AdtError, AdtResult};
use crate::record::{Coded, DecodedRecord, Reference, Value};
use crate::schema::{FieldCount, FieldDecode, FieldSpec, KeyRule, Layout, Position, Schema};

/// What to do with a record whose primary key is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum KeyPolicy {
    /// Drop the record, log it, keep going.
    #[default]
    SkipRecord,
    /// Fail the whole batch.
    AbortBatch,
}

/// Decodes a batch against the schema registered under `schema_name`.
///
/// ```rust
/// use vista_adt::{decode_batch, KeyPolicy};
/// use vista_text::RawBatch;
///
/// let raw = RawBatch::from_response("123^20230401.093000^1^456^^^^^");
/// let records = decode_batch("movement", &raw, KeyPolicy::SkipRecord).unwrap();
///
/// assert_eq!(records[0].id(), "123");
/// assert_eq!(records[0].label("transaction"), Some("ADMISSION"));
/// assert_eq!(records[0].text("patient"), Some("456"));
/// ```
pub fn decode_batch(
    schema_name: &str,
    raw: &RawBatch,
    policy: KeyPolicy,
) -> AdtResult<Vec<DecodedRecord>> {
    let kind: EntityKind = schema_name.parse()?;
    let schema = kind.schema()?;
    decode_with(&schema, raw, policy)
}

/// Decodes a batch against an already built schema.
pub fn decode_with(
    schema: &Schema,
    raw: &RawBatch,
    policy: KeyPolicy,
) -> AdtResult<Vec<DecodedRecord>> {
    let mut records = Vec::with_capacity(raw.len());
    let mut skipped = 0usize;

    for line in raw.lines() {
        match decode_line(schema, line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => skipped += 1,
            Err(err) if policy == KeyPolicy::SkipRecord && is_record_local(&err) => {
                warn!(schema = schema.name(), error = %err, "skipping record");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    debug!(
        schema = schema.name(),
        lines = raw.len(),
        records = records.len(),
        skipped,
        "decoded batch"
    );
    Ok(records)
}

/// Decodes one raw line.
///
/// Returns `Ok(None)` for lines the schema skips: too few fields, or a
/// record excluded by the schema's exclusion flag.
pub fn decode_line(schema: &Schema, line: &str) -> AdtResult<Option<DecodedRecord>> {
    let record = match schema.layout() {
        Layout::Simple => tokenize_line(line),
        Layout::Composite => tokenize_composite(line)?,
    };

    match schema.field_count() {
        FieldCount::AtLeast(min) if record.field_count() < min => {
            warn!(
                schema = schema.name(),
                line,
                found = record.field_count(),
                expected = min,
                "skipping short line"
            );
            return Ok(None);
        }
        FieldCount::Exactly(expected) => record.expect_fields(expected)?,
        FieldCount::AtLeast(_) => {}
    }

    let id = primary_key(schema, &record).ok_or_else(|| AdtError::MissingPrimaryKey {
        schema: schema.name().to_string(),
        line: line.to_string(),
    })?;

    let mut decoded = DecodedRecord::new(schema.kind(), id);
    for spec in schema.fields() {
        let value = match extract(&record, &spec.position) {
            Some(raw) => decode_value(schema, spec, raw),
            None => spec.default.map(|text| Value::Text(text.to_string())),
        };
        if let Some(value) = value {
            decoded.set(spec.attribute, value);
        }
    }

    if let Some(flag) = schema.exclude_flag() {
        if decoded.flag(flag) == Some(true) {
            debug!(schema = schema.name(), id = decoded.id(), flag, "excluding record");
            return Ok(None);
        }
    }

    Ok(Some(decoded))
}

/// Encodes a record back into a line of its schema's layout.
///
/// Attributes equal to what the line decodes to are reproduced; absent
/// attributes become empty fields. Used for fixtures and round-trip checks.
pub fn encode_record(schema: &Schema, record: &DecodedRecord) -> AdtResult<String> {
    let parts = schema
        .fields()
        .iter()
        .map(|spec| spec.position.part)
        .max()
        .unwrap_or(0);

    let mut encoder = LineEncoder::new();
    for part in 0..=parts {
        if part > 0 {
            encoder = encoder.part();
        }
        let width = schema
            .fields()
            .iter()
            .filter(|spec| spec.position.part == part)
            .map(|spec| spec.position.field + 1)
            .max()
            .unwrap_or(0);
        for field in 0..width {
            encoder = encoder.field(encode_field(schema, record, part, field)?);
        }
    }

    Ok(match schema.layout() {
        Layout::Simple => encoder.build(),
        Layout::Composite => encoder.build_composite(),
    })
}

fn encode_field(
    schema: &Schema,
    record: &DecodedRecord,
    part: usize,
    field: usize,
) -> AdtResult<String> {
    let mut pieces: Vec<&FieldSpec> = schema
        .fields()
        .iter()
        .filter(|spec| {
            spec.position.part == part && spec.position.field == field && spec.position.piece.is_some()
        })
        .collect();

    if !pieces.is_empty() {
        pieces.sort_by_key(|spec| spec.position.piece.map(|piece| piece.index));
        let separator = pieces[0]
            .position
            .piece
            .map(|piece| piece.separator.to_string())
            .unwrap_or_default();
        let values = pieces
            .iter()
            .map(|spec| encode_attribute(record, spec))
            .collect::<AdtResult<Vec<_>>>()?;
        return Ok(values.join(separator.as_str()));
    }

    match schema
        .fields()
        .iter()
        .find(|spec| spec.position == Position::part_field(part, field))
    {
        Some(spec) => encode_attribute(record, spec),
        None => Ok(String::new()),
    }
}

fn encode_attribute(record: &DecodedRecord, spec: &FieldSpec) -> AdtResult<String> {
    if spec.decode == FieldDecode::Key {
        return Ok(record.id().to_string());
    }
    Ok(match record.get(spec.attribute) {
        None => String::new(),
        Some(Value::Text(text)) => text.clone(),
        Some(Value::Flag(flag)) => (if *flag { "1" } else { "0" }).to_string(),
        Some(Value::Timestamp(ts)) => format_timestamp(ts)?,
        Some(Value::Label(coded)) => coded.code.clone(),
        Some(Value::Reference(reference)) => reference.code.clone(),
    })
}

fn is_record_local(err: &AdtError) -> bool {
    matches!(
        err,
        AdtError::MissingPrimaryKey { .. } | AdtError::Format(TextError::UnterminatedPart { .. })
    )
}

fn primary_key(schema: &Schema, record: &RawRecord) -> Option<String> {
    match schema.key() {
        KeyRule::Field => schema
            .key_field()
            .and_then(|spec| extract(record, &spec.position))
            .map(str::to_string),
        KeyRule::Composite { prefix, fields } => {
            let mut pieces = vec![prefix];
            for &index in fields {
                pieces.push(record.field(index)?);
            }
            Some(pieces.join(";"))
        }
    }
}

fn extract<'a>(record: &'a RawRecord, position: &Position) -> Option<&'a str> {
    let value = record.part_field(position.part, position.field)?;
    match position.piece {
        None => Some(value),
        Some(piece) => value
            .split(piece.separator)
            .nth(piece.index)
            .filter(|text| !text.is_empty()),
    }
}

fn decode_value(schema: &Schema, spec: &FieldSpec, raw: &str) -> Option<Value> {
    match spec.decode {
        FieldDecode::Key | FieldDecode::Ignored => None,
        FieldDecode::Text => Some(Value::Text(raw.to_string())),
        FieldDecode::Flag => Some(Value::Flag(raw == "1")),
        FieldDecode::Timestamp => match parse_timestamp(raw) {
            Ok(ts) => Some(Value::Timestamp(ts)),
            Err(err) => {
                warn!(
                    schema = schema.name(),
                    attribute = spec.attribute,
                    error = %err,
                    "leaving malformed attribute unset"
                );
                None
            }
        },
        FieldDecode::Static(table) => Some(Value::Label(Coded::new(raw, table.decode(raw)))),
        FieldDecode::Lookup(domain) => Some(Value::Reference(Reference::lookup(domain, raw))),
        FieldDecode::SameBatch => Some(Value::Reference(Reference::same_batch(raw))),
    }
}

//! Declared positional schemas.
//!
//! A [`Schema`] lists, for one entity, which raw position feeds which
//! attribute and how the raw text is decoded. Schemas are validated when
//! built so that a typo in a table (two attributes on one field, a skipped
//! index) fails loudly instead of silently shifting every later field.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::codes::CodeTable;
use crate::entities::EntityKind;
use crate::error::{AdtError, AdtResult};
use crate::lookup::LookupDomain;

/// A sub-piece of a field, split on `separator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Piece {
    /// Separator inside the field.
    pub separator: char,
    /// Zero-based piece number.
    pub index: usize,
}

/// Where an attribute lives in a tokenized line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// Composite part, 0 for the main line.
    pub part: usize,
    /// Zero-based `^` field within the part.
    pub field: usize,
    /// Optional sub-piece of that field.
    pub piece: Option<Piece>,
}

impl Position {
    /// Main-line field.
    pub const fn field(field: usize) -> Self {
        Self {
            part: 0,
            field,
            piece: None,
        }
    }

    /// Field of a supplemental part.
    pub const fn part_field(part: usize, field: usize) -> Self {
        Self {
            part,
            field,
            piece: None,
        }
    }

    /// Sub-piece of a main-line field.
    pub const fn piece(field: usize, separator: char, index: usize) -> Self {
        Self {
            part: 0,
            field,
            piece: Some(Piece { separator, index }),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.part, self.field)?;
        if let Some(piece) = self.piece {
            write!(f, "{}{}", piece.separator, piece.index)?;
        }
        Ok(())
    }
}

/// How a raw field becomes a [`Value`](crate::Value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDecode {
    /// The record's primary key.
    Key,
    /// Free text, kept as sent.
    Text,
    /// `"1"` is true, anything else present is false.
    Flag,
    /// FileMan or external timestamp.
    Timestamp,
    /// Code decoded against a static table.
    Static(CodeTable),
    /// Code resolved later against a lookup domain.
    Lookup(LookupDomain),
    /// Id of another record in the same batch.
    SameBatch,
    /// Position is present on the wire but not decoded.
    Ignored,
}

/// One row of a schema table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Raw position.
    pub position: Position,
    /// Canonical attribute name.
    pub attribute: &'static str,
    /// Decode function.
    pub decode: FieldDecode,
    /// Text used when the field is absent.
    pub default: Option<&'static str>,
}

/// Field-count rule for the main part of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCount {
    /// Shorter lines are skipped.
    AtLeast(usize),
    /// Any other count fails the batch.
    ///
    /// The check runs before the key is read, so the batch fails under
    /// [`KeyPolicy::SkipRecord`] as well as [`KeyPolicy::AbortBatch`].
    ///
    /// [`KeyPolicy::SkipRecord`]: crate::KeyPolicy::SkipRecord
    /// [`KeyPolicy::AbortBatch`]: crate::KeyPolicy::AbortBatch
    Exactly(usize),
}

/// How the primary key is formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRule {
    /// The field declared with [`FieldDecode::Key`].
    Field,
    /// `prefix;f1;f2...` over the listed main-line fields, all required.
    Composite {
        /// Literal first sub-piece.
        prefix: &'static str,
        /// Main-line field indices joined after the prefix.
        fields: &'static [usize],
    },
}

/// Line shape the tokenizer must use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Plain `^` pieces.
    Simple,
    /// `~` parts with `&#94;` escapes.
    Composite,
}

/// A validated schema table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    kind: EntityKind,
    layout: Layout,
    field_count: FieldCount,
    key: KeyRule,
    fields: Vec<FieldSpec>,
    exclude_flag: Option<&'static str>,
}

impl Schema {
    /// Starts a schema table for `kind`.
    pub fn builder(kind: EntityKind) -> SchemaBuilder {
        SchemaBuilder {
            kind,
            layout: Layout::Simple,
            field_count: FieldCount::AtLeast(1),
            key: KeyRule::Field,
            fields: Vec::new(),
            exclude_flag: None,
        }
    }

    /// Entity this schema decodes.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Schema name.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Tokenizer layout.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Field-count rule.
    pub fn field_count(&self) -> FieldCount {
        self.field_count
    }

    /// Primary-key rule.
    pub fn key(&self) -> KeyRule {
        self.key
    }

    /// Rows in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Flag attribute whose `true` value drops the record.
    pub fn exclude_flag(&self) -> Option<&'static str> {
        self.exclude_flag
    }

    /// Row declared for `attribute`.
    pub fn field_for(&self, attribute: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.attribute == attribute)
    }

    /// The key row, under [`KeyRule::Field`].
    pub fn key_field(&self) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|spec| spec.decode == FieldDecode::Key)
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    kind: EntityKind,
    layout: Layout,
    field_count: FieldCount,
    key: KeyRule,
    fields: Vec<FieldSpec>,
    exclude_flag: Option<&'static str>,
}

impl SchemaBuilder {
    /// Sets the tokenizer layout.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the field-count rule.
    pub fn with_field_count(mut self, field_count: FieldCount) -> Self {
        self.field_count = field_count;
        self
    }

    /// Sets the primary-key rule.
    pub fn with_key(mut self, key: KeyRule) -> Self {
        self.key = key;
        self
    }

    /// Drops records whose `attribute` flag decodes to true.
    pub fn excluding_flag(mut self, attribute: &'static str) -> Self {
        self.exclude_flag = Some(attribute);
        self
    }

    /// Declares a main-line field.
    pub fn field(self, index: usize, attribute: &'static str, decode: FieldDecode) -> Self {
        self.at(Position::field(index), attribute, decode)
    }

    /// Declares a row at an arbitrary position.
    pub fn at(mut self, position: Position, attribute: &'static str, decode: FieldDecode) -> Self {
        self.fields.push(FieldSpec {
            position,
            attribute,
            decode,
            default: None,
        });
        self
    }

    /// Declares a text row with a default for absent values.
    pub fn at_or(
        mut self,
        position: Position,
        attribute: &'static str,
        default: &'static str,
    ) -> Self {
        self.fields.push(FieldSpec {
            position,
            attribute,
            decode: FieldDecode::Text,
            default: Some(default),
        });
        self
    }

    /// Validates and builds the schema.
    pub fn build(self) -> AdtResult<Schema> {
        let invalid = |message: String| AdtError::Schema {
            schema: self.kind.name().to_string(),
            message,
        };

        let mut attributes = HashSet::new();
        let mut positions = HashSet::new();
        for spec in &self.fields {
            if !attributes.insert(spec.attribute) {
                return Err(invalid(format!("duplicate attribute {}", spec.attribute)));
            }
            if !positions.insert(spec.position) {
                return Err(invalid(format!("duplicate position {}", spec.position)));
            }
            if spec.default.is_some() && spec.decode != FieldDecode::Text {
                return Err(invalid(format!(
                    "default on non-text attribute {}",
                    spec.attribute
                )));
            }
            if spec.position.part > 0 && self.layout == Layout::Simple {
                return Err(invalid(format!(
                    "attribute {} needs a composite layout",
                    spec.attribute
                )));
            }
        }

        // Field indices per part, and piece indices per (part, field, separator).
        let mut field_indices: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        let mut piece_indices: BTreeMap<(usize, usize, char), BTreeSet<usize>> = BTreeMap::new();
        for spec in &self.fields {
            let Position { part, field, piece } = spec.position;
            field_indices.entry(part).or_default().insert(field);
            if let Some(piece) = piece {
                piece_indices
                    .entry((part, field, piece.separator))
                    .or_default()
                    .insert(piece.index);
            }
        }
        for (part, indices) in &field_indices {
            if let Some(gap) = first_gap(indices) {
                return Err(invalid(format!("gap at field {gap} of part {part}")));
            }
        }
        for ((part, field, separator), indices) in &piece_indices {
            if let Some(gap) = first_gap(indices) {
                return Err(invalid(format!(
                    "gap at piece {gap} of field {part}:{field} split on '{separator}'"
                )));
            }
        }

        let key_rows = self
            .fields
            .iter()
            .filter(|spec| spec.decode == FieldDecode::Key)
            .count();
        match self.key {
            KeyRule::Field if key_rows != 1 => {
                return Err(invalid(format!("expected one key field, found {key_rows}")));
            }
            KeyRule::Composite { fields, .. } => {
                if key_rows != 0 {
                    return Err(invalid("composite key with a key field".to_string()));
                }
                let main = field_indices.get(&0).cloned().unwrap_or_default();
                if fields.is_empty() || fields.iter().any(|index| !main.contains(index)) {
                    return Err(invalid("composite key over undeclared fields".to_string()));
                }
            }
            KeyRule::Field => {}
        }

        if let FieldCount::Exactly(expected) = self.field_count {
            let widest = field_indices
                .get(&0)
                .and_then(|indices| indices.iter().next_back())
                .copied()
                .unwrap_or(0);
            if widest >= expected {
                return Err(invalid(format!(
                    "field {widest} declared beyond exact count {expected}"
                )));
            }
        }

        if let Some(flag) = self.exclude_flag {
            let is_flag = self
                .fields
                .iter()
                .any(|spec| spec.attribute == flag && spec.decode == FieldDecode::Flag);
            if !is_flag {
                return Err(invalid(format!("exclusion attribute {flag} is not a flag")));
            }
        }

        Ok(Schema {
            kind: self.kind,
            layout: self.layout,
            field_count: self.field_count,
            key: self.key,
            fields: self.fields,
            exclude_flag: self.exclude_flag,
        })
    }
}

fn first_gap(indices: &BTreeSet<usize>) -> Option<usize> {
    indices
        .iter()
        .enumerate()
        .find(|(expected, actual)| expected != *actual)
        .map(|(expected, _)| expected)
}

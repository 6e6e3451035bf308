//! Decoded record model.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;

use crate::entities::EntityKind;
use crate::lookup::LookupDomain;

/// A code decoded against a static table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coded {
    /// Raw code as sent.
    pub code: String,
    /// Label, when the table knows the code (or passes it through).
    pub label: Option<String>,
}

impl Coded {
    /// Creates a coded value.
    pub fn new(code: impl Into<String>, label: Option<String>) -> Self {
        Self {
            code: code.into(),
            label,
        }
    }
}

/// What a [`Reference`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Target {
    /// An externally supplied lookup table.
    Lookup(LookupDomain),
    /// Another record of the same batch, by id.
    SameBatch,
}

/// A foreign key, resolved or not.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reference {
    /// Where the code is resolved.
    pub target: Target,
    /// Raw code as sent. Always kept.
    pub code: String,
    /// Resolved label, if any.
    pub label: Option<String>,
}

impl Reference {
    /// Unresolved reference into a lookup domain.
    pub fn lookup(domain: LookupDomain, code: impl Into<String>) -> Self {
        Self {
            target: Target::Lookup(domain),
            code: code.into(),
            label: None,
        }
    }

    /// Unresolved reference to another record of the batch.
    pub fn same_batch(code: impl Into<String>) -> Self {
        Self {
            target: Target::SameBatch,
            code: code.into(),
            label: None,
        }
    }

    /// Returns true once a label was found.
    pub fn is_resolved(&self) -> bool {
        self.label.is_some()
    }
}

/// One decoded attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Free text.
    Text(String),
    /// Boolean flag; `"1"` is true.
    Flag(bool),
    /// Instant decoded from FileMan form.
    Timestamp(NaiveDateTime),
    /// Code decoded against a static table.
    Label(Coded),
    /// Foreign key.
    Reference(Reference),
}

impl Value {
    /// Text, or the raw code of a label or reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            Value::Label(coded) => Some(&coded.code),
            Value::Reference(reference) => Some(&reference.code),
            Value::Flag(_) | Value::Timestamp(_) => None,
        }
    }

    /// Human-readable label, when one exists.
    pub fn label(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            Value::Label(coded) => coded.label.as_deref(),
            Value::Reference(reference) => reference.label.as_deref(),
            Value::Flag(_) | Value::Timestamp(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.write_str(text),
            Value::Flag(flag) => write!(f, "{}", if *flag { "1" } else { "0" }),
            Value::Timestamp(ts) => write!(f, "{ts}"),
            Value::Label(Coded { code, label }) | Value::Reference(Reference { code, label, .. }) => {
                match label {
                    Some(label) => write!(f, "{code} |{label}|"),
                    None => f.write_str(code),
                }
            }
        }
    }
}

/// A structured decode of one raw record.
///
/// Attributes are keyed by their canonical name; an attribute that was empty
/// on the wire is simply absent.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodedRecord {
    kind: EntityKind,
    id: String,
    attributes: BTreeMap<String, Value>,
}

impl DecodedRecord {
    /// Creates a record with no attributes.
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute while building.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    /// Entity kind.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Primary key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All attributes, ordered by name.
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Number of set attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    /// Removes an attribute.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// Raw attribute value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Returns true if the attribute is set.
    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Text, or the raw code of a label or reference.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Label of a text, label or reference attribute.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::label)
    }

    /// Flag value.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(Value::Flag(flag)) => Some(*flag),
            _ => None,
        }
    }

    /// Timestamp value.
    pub fn timestamp(&self, name: &str) -> Option<NaiveDateTime> {
        match self.get(name) {
            Some(Value::Timestamp(ts)) => Some(*ts),
            _ => None,
        }
    }

    /// Static-table value.
    pub fn coded(&self, name: &str) -> Option<&Coded> {
        match self.get(name) {
            Some(Value::Label(coded)) => Some(coded),
            _ => None,
        }
    }

    /// Reference value.
    pub fn reference(&self, name: &str) -> Option<&Reference> {
        match self.get(name) {
            Some(Value::Reference(reference)) => Some(reference),
            _ => None,
        }
    }

    /// Iterates over mutable references, for resolution.
    pub(crate) fn references_mut(&mut self) -> impl Iterator<Item = (&String, &mut Reference)> {
        self.attributes.iter_mut().filter_map(|(name, value)| match value {
            Value::Reference(reference) => Some((name, reference)),
            _ => None,
        })
    }
}

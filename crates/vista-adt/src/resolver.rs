//! Reference resolver.
//!
//! Two passes over a decoded batch:
//!
//! 1. **External**: every [`Target::Lookup`] reference is looked up by code in
//!    its domain's table. Movements also gain `room`/`bed` from a resolved
//!    room-bed and a `service` from a resolved treating specialty.
//! 2. **Same batch**: a [`ReferenceIndex`] of the batch is built by record id,
//!    then every [`Target::SameBatch`] reference takes the referenced
//!    record's `name`.
//!
//! Unknown codes, unloaded domains and dangling self-references all leave the
//! label unset; the raw code is always kept.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::entities::{attr, EntityKind};
use crate::lookup::LookupDomain;
use crate::record::{DecodedRecord, Reference, Target, Value};
use crate::traits::LookupSource;

/// Per-batch index of records by id.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    slots: HashMap<String, usize>,
    names: Vec<Option<String>>,
}

impl ReferenceIndex {
    /// Indexes `records` by id. The first record with a given id wins.
    pub fn build(records: &[DecodedRecord]) -> Self {
        let mut index = ReferenceIndex {
            slots: HashMap::with_capacity(records.len()),
            names: Vec::with_capacity(records.len()),
        };
        for (slot, record) in records.iter().enumerate() {
            index.names.push(record.text(attr::NAME).map(str::to_string));
            if index.slots.contains_key(record.id()) {
                warn!(kind = %record.kind(), id = record.id(), "duplicate id in batch");
                continue;
            }
            index.slots.insert(record.id().to_string(), slot);
        }
        index
    }

    /// Position in the batch of the record with `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Name of the record with `id`.
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.position(id)
            .and_then(|slot| self.names.get(slot))
            .and_then(|name| name.as_deref())
    }

    /// Number of distinct ids.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Counts from one resolution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// References that received a label.
    pub resolved: usize,
    /// References left without a label.
    pub unresolved: usize,
}

/// Resolves references against a [`LookupSource`] and against the batch.
#[derive(Debug)]
pub struct ReferenceResolver<'a, L: LookupSource + ?Sized> {
    lookups: &'a L,
}

impl<'a, L: LookupSource + ?Sized> ReferenceResolver<'a, L> {
    /// Creates a resolver over read-only tables.
    pub fn new(lookups: &'a L) -> Self {
        Self { lookups }
    }

    /// Resolves every reference in `records` in place.
    pub fn resolve(&self, records: &mut [DecodedRecord]) -> ResolutionStats {
        for record in records.iter_mut() {
            self.resolve_external(record);
            if record.kind() == EntityKind::Movement {
                self.derive_movement_attributes(record);
            }
        }

        let index = ReferenceIndex::build(records);
        let mut stats = ResolutionStats::default();
        for record in records.iter_mut() {
            for (_, reference) in record.references_mut() {
                if reference.target == Target::SameBatch {
                    reference.label = index.name_of(&reference.code).map(str::to_string);
                }
                if reference.is_resolved() {
                    stats.resolved += 1;
                } else {
                    stats.unresolved += 1;
                }
            }
        }

        debug!(
            records = records.len(),
            resolved = stats.resolved,
            unresolved = stats.unresolved,
            "resolved references"
        );
        stats
    }

    fn label(&self, domain: LookupDomain, code: &str) -> Option<String> {
        self.lookups
            .lookup_table(domain)
            .and_then(|table| table.get(code))
            .map(str::to_string)
    }

    fn resolve_external(&self, record: &mut DecodedRecord) {
        for (_, reference) in record.references_mut() {
            if let Target::Lookup(domain) = reference.target {
                reference.label = self.label(domain, &reference.code);
            }
        }
    }

    /// Room-bed labels read `ROOM-BED`; a treating specialty carries its
    /// service in a table keyed by the specialty code.
    fn derive_movement_attributes(&self, record: &mut DecodedRecord) {
        let room_bed = record
            .reference(attr::ROOM_BED)
            .and_then(|reference| reference.label.clone());
        if let Some(label) = room_bed {
            let mut pieces = label.split('-');
            if let Some(room) = pieces.next().filter(|room| !room.is_empty()) {
                record.set(attr::ROOM, Value::Text(room.to_string()));
            }
            if let Some(bed) = pieces.next().filter(|bed| !bed.is_empty()) {
                record.set(attr::BED, Value::Text(bed.to_string()));
            }
        }

        let specialty = record
            .reference(attr::TREATING_SPECIALTY)
            .filter(|reference| reference.is_resolved())
            .map(|reference| reference.code.clone());
        if let Some(code) = specialty {
            let mut service = Reference::lookup(LookupDomain::TreatingSpecialtyServices, code);
            service.label = self.label(LookupDomain::TreatingSpecialtyServices, &service.code);
            record.set(attr::SERVICE, Value::Reference(service));
        }
    }
}

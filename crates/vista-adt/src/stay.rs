//! Stay reconstruction.
//!
//! Movements are grouped by check-in id into [`Stay`] aggregates. Groups keep
//! the order in which their check-in id was first seen and movements keep
//! their input order inside a group.
//!
//! A group whose movements name more than one patient is still emitted, with
//! the first patient, and the disagreement is reported in
//! [`StayReport::conflicts`].

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::entities::{attr, EntityKind};
use crate::error::{AdtError, AdtResult, DataIntegrityError};
use crate::ordered_set::OrderedKeySet;
use crate::record::DecodedRecord;
use crate::traits::{Patient, PatientLookup};

/// One inpatient stay: every movement sharing a check-in id.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stay {
    /// Check-in (admission movement) id.
    pub checkin_id: String,
    /// Patient of the first movement that names one.
    pub patient: Patient,
    /// Movements in input order.
    pub movements: Vec<DecodedRecord>,
}

impl Stay {
    /// Earliest movement timestamp.
    pub fn admitted_at(&self) -> Option<NaiveDateTime> {
        self.movements
            .iter()
            .filter_map(|movement| movement.timestamp(attr::TIMESTAMP))
            .min()
    }
}

/// Stays plus any integrity conflicts found while grouping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StayReport {
    /// One stay per check-in id, in first-seen order.
    pub stays: Vec<Stay>,
    /// Groups that named more than one patient.
    pub conflicts: Vec<DataIntegrityError>,
}

impl StayReport {
    /// Number of stays.
    pub fn len(&self) -> usize {
        self.stays.len()
    }

    /// Returns true if no stay was reconstructed.
    pub fn is_empty(&self) -> bool {
        self.stays.is_empty()
    }

    /// Returns true if any group named more than one patient.
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Stay for `checkin_id`.
    pub fn stay(&self, checkin_id: &str) -> Option<&Stay> {
        self.stays.iter().find(|stay| stay.checkin_id == checkin_id)
    }

    /// Iterates stays in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Stay> {
        self.stays.iter()
    }
}

impl<'a> IntoIterator for &'a StayReport {
    type Item = &'a Stay;
    type IntoIter = std::slice::Iter<'a, Stay>;

    fn into_iter(self) -> Self::IntoIter {
        self.stays.iter()
    }
}

/// Groups movements by check-in id and attaches a resolved patient per group.
///
/// Records that are not movements are ignored. Movements without a check-in
/// id are skipped with a warning. A group in which no movement names a
/// patient gets an empty [`Patient`].
///
/// # Errors
///
/// [`AdtError::PatientResolution`] if the patient collaborator fails.
///
/// # Example
///
/// ```rust
/// use vista_adt::{reconstruct_stays, BoxError, DecodedRecord, EntityKind, Patient, Value};
///
/// let movement = |id: &str, checkin: &str, patient: &str| {
///     DecodedRecord::new(EntityKind::Movement, id)
///         .with("checkin_id", Value::Text(checkin.into()))
///         .with("patient", Value::Text(patient.into()))
/// };
/// let records = vec![movement("1", "1", "456"), movement("2", "1", "456")];
///
/// let lookup = |id: &str| -> Result<Patient, BoxError> { Ok(Patient::new(id)) };
/// let report = reconstruct_stays(&records, &lookup).unwrap();
///
/// assert_eq!(report.len(), 1);
/// assert_eq!(report.stays[0].movements.len(), 2);
/// assert!(!report.has_conflicts());
/// ```
pub fn reconstruct_stays<P>(records: &[DecodedRecord], lookup: &P) -> AdtResult<StayReport>
where
    P: PatientLookup + ?Sized,
{
    let mut checkins = OrderedKeySet::new();
    let mut groups: Vec<Vec<&DecodedRecord>> = Vec::new();
    let mut skipped = 0usize;

    for record in records.iter().filter(|r| r.kind() == EntityKind::Movement) {
        let Some(checkin_id) = record.text(attr::CHECKIN_ID) else {
            warn!(movement = record.id(), "movement has no check-in id, skipping");
            skipped += 1;
            continue;
        };
        let (slot, new) = checkins.insert_full(checkin_id);
        if new {
            groups.push(Vec::new());
        }
        groups[slot].push(record);
    }

    let mut report = StayReport::default();
    for (checkin_id, movements) in checkins.iter().zip(groups) {
        let mut first_patient: Option<&str> = None;
        for movement in &movements {
            let Some(patient) = movement.text(attr::PATIENT) else {
                continue;
            };
            match first_patient {
                None => first_patient = Some(patient),
                Some(first) if first != patient => {
                    warn!(
                        checkin = checkin_id.as_str(),
                        first_patient = first,
                        conflicting_patient = patient,
                        "stay names more than one patient"
                    );
                    let conflict = DataIntegrityError {
                        checkin_id: checkin_id.clone(),
                        first_patient: first.to_string(),
                        conflicting_patient: patient.to_string(),
                    };
                    if !report.conflicts.contains(&conflict) {
                        report.conflicts.push(conflict);
                    }
                }
                Some(_) => {}
            }
        }

        let patient = match first_patient {
            Some(local_id) => {
                lookup
                    .lookup_patient(local_id)
                    .map_err(|source| AdtError::PatientResolution {
                        local_id: local_id.to_string(),
                        source,
                    })?
            }
            None => Patient::default(),
        };

        report.stays.push(Stay {
            checkin_id: checkin_id.clone(),
            patient,
            movements: movements.into_iter().cloned().collect(),
        });
    }

    debug!(
        stays = report.stays.len(),
        conflicts = report.conflicts.len(),
        skipped,
        "reconstructed stays"
    );
    Ok(report)
}

/// Distinct check-in ids of records timestamped within `[from, to)`.
///
/// Records without a timestamp or a check-in id are ignored. Ids keep the
/// order in which they were first seen.
pub fn unique_checkin_ids(
    records: &[DecodedRecord],
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Vec<String> {
    records
        .iter()
        .filter(|record| {
            record
                .timestamp(attr::TIMESTAMP)
                .is_some_and(|ts| ts >= from && ts < to)
        })
        .filter_map(|record| record.text(attr::CHECKIN_ID))
        .filter(|id| !id.trim().is_empty())
        .collect::<OrderedKeySet>()
        .into_keys()
}

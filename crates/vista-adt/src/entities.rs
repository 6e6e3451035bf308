//! Entity kinds and their schema tables.

use std::fmt;
use std::str::FromStr;

use crate::codes::{
    APPOINTMENT_PURPOSE, APPOINTMENT_STATUS, DISPOSITION_ACTION, LOCATION_SERVICE, LOCATION_TYPE,
    MOVEMENT_TRANSACTION,
};
use crate::error::{AdtError, AdtResult};
use crate::lookup::LookupDomain;
use crate::schema::{FieldCount, FieldDecode, KeyRule, Layout, Position, Schema};

/// Canonical attribute names shared across modules.
pub mod attr {
    /// Primary key row.
    pub const ID: &str = "id";
    /// Record instant.
    pub const TIMESTAMP: &str = "timestamp";
    /// Display name.
    pub const NAME: &str = "name";
    /// Patient local id of a movement.
    pub const PATIENT: &str = "patient";
    /// Check-in (admission) movement id.
    pub const CHECKIN_ID: &str = "checkin_id";
    /// Room-bed reference of a movement.
    pub const ROOM_BED: &str = "room_bed";
    /// Room, derived from a resolved room-bed.
    pub const ROOM: &str = "room";
    /// Bed, derived from a resolved room-bed.
    pub const BED: &str = "bed";
    /// Treating specialty reference.
    pub const TREATING_SPECIALTY: &str = "treating_specialty";
    /// Service of a movement's treating specialty.
    pub const SERVICE: &str = "service";
    /// Ward inactive flag.
    pub const INACTIVE: &str = "inactive";
}

/// Entities the decoders know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EntityKind {
    /// Patient movement (file 405).
    Movement,
    /// Movement id, timestamp and check-in id, for stay discovery.
    Checkin,
    /// Clinic appointment (file 2.98), composite.
    Appointment,
    /// Hospital location (file 44).
    HospitalLocation,
    /// Ward (file 42) with hospital-location identifiers.
    Ward,
    /// Institution division (file 4).
    SiteDivision,
    /// Visit list entry.
    Visit,
}

impl EntityKind {
    /// Every kind, in declaration order.
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Movement,
        EntityKind::Checkin,
        EntityKind::Appointment,
        EntityKind::HospitalLocation,
        EntityKind::Ward,
        EntityKind::SiteDivision,
        EntityKind::Visit,
    ];

    /// Schema name.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Movement => "movement",
            EntityKind::Checkin => "checkin",
            EntityKind::Appointment => "appointment",
            EntityKind::HospitalLocation => "hospital_location",
            EntityKind::Ward => "ward",
            EntityKind::SiteDivision => "site_division",
            EntityKind::Visit => "visit",
        }
    }

    /// Builds and validates this entity's schema table.
    pub fn schema(self) -> AdtResult<Schema> {
        match self {
            EntityKind::Movement => movement_schema(),
            EntityKind::Checkin => checkin_schema(),
            EntityKind::Appointment => appointment_schema(),
            EntityKind::HospitalLocation => hospital_location_schema(),
            EntityKind::Ward => ward_schema(),
            EntityKind::SiteDivision => site_division_schema(),
            EntityKind::Visit => visit_schema(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = AdtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| AdtError::UnknownSchema(s.to_string()))
    }
}

// =============================================================================
// Schema tables
// =============================================================================

/// File 405 lister, fields
/// `.01;.02;.03;.04;.06;.07;.09;.14;.17;.18;.19;.24;201;202;203;.1;.16;.11;.25`
/// plus the attending's name.
fn movement_schema() -> AdtResult<Schema> {
    use FieldDecode::*;

    Schema::builder(EntityKind::Movement)
        .with_field_count(FieldCount::AtLeast(4))
        .field(0, attr::ID, Key)
        .field(1, attr::TIMESTAMP, Timestamp)
        .field(2, "transaction", Static(MOVEMENT_TRANSACTION))
        .field(3, attr::PATIENT, Text)
        .field(4, "movement_type", Lookup(LookupDomain::FacilityMovementTypes))
        .field(5, "ward", Lookup(LookupDomain::WardLocations))
        .field(6, attr::ROOM_BED, Lookup(LookupDomain::RoomBeds))
        .field(7, attr::TREATING_SPECIALTY, Lookup(LookupDomain::TreatingSpecialties))
        .field(8, attr::CHECKIN_ID, Text)
        .field(9, "checkout_id", Text)
        .field(10, "mas_movement_type", Lookup(LookupDomain::MasMovementTypes))
        .field(11, "attending_id", Text)
        .field(12, "related_physical_movement", Text)
        .field(13, "length_of_stay", Text)
        .field(14, "pass_days", Text)
        .field(15, "days_absent", Text)
        .field(16, "diagnosis", Text)
        .field(17, "ptf_entry", Text)
        .field(18, "sc_condition", Flag)
        .field(19, "scheduled_admission", Flag)
        .field(20, "attending_name", Text)
        .build()
}

/// File 405 `.01;.14` lister: `ien^timestamp^checkinId`.
fn checkin_schema() -> AdtResult<Schema> {
    Schema::builder(EntityKind::Checkin)
        .with_field_count(FieldCount::Exactly(3))
        .field(0, attr::ID, FieldDecode::Key)
        .field(1, attr::TIMESTAMP, FieldDecode::Timestamp)
        .field(2, attr::CHECKIN_ID, FieldDecode::Text)
        .build()
}

/// File 2.98 lister with clinic identifiers:
/// `ts^clinic^status^lab^xray^ekg^purpose^type[^current]~clinicName^division~phone`.
fn appointment_schema() -> AdtResult<Schema> {
    use FieldDecode::*;

    Schema::builder(EntityKind::Appointment)
        .with_layout(Layout::Composite)
        .with_field_count(FieldCount::AtLeast(8))
        .with_key(KeyRule::Composite {
            prefix: "A",
            fields: &[0, 1],
        })
        .field(0, attr::TIMESTAMP, Timestamp)
        .field(1, "clinic_id", Text)
        .field(2, "status", Static(APPOINTMENT_STATUS))
        .field(3, "lab_time", Timestamp)
        .field(4, "xray_time", Timestamp)
        .field(5, "ekg_time", Timestamp)
        .field(6, "purpose", Static(APPOINTMENT_PURPOSE))
        .field(7, "appointment_type", Lookup(LookupDomain::AppointmentTypes))
        .field(8, "current_status", Text)
        .at(Position::part_field(1, 0), "clinic_name", Text)
        .at(
            Position::part_field(1, 1),
            "division",
            Lookup(LookupDomain::MedicalCenterDivisions),
        )
        .at(Position::part_field(2, 0), "clinic_phone", Text)
        .build()
}

/// File 44 lister, 18 fields. Module and principal clinic point at other
/// locations of the same listing.
fn hospital_location_schema() -> AdtResult<Schema> {
    use FieldDecode::*;

    Schema::builder(EntityKind::HospitalLocation)
        .with_field_count(FieldCount::Exactly(18))
        .field(0, attr::ID, Key)
        .field(1, attr::NAME, Text)
        .field(2, "abbreviation", Text)
        .field(3, "location_type", Static(LOCATION_TYPE))
        .field(4, "type_extension", Lookup(LookupDomain::LocationTypes))
        .field(5, "institution_id", Text)
        .field(6, "institution_name", Text)
        .field(7, "division", Lookup(LookupDomain::MedicalCenterDivisions))
        .field(8, "module", SameBatch)
        .field(9, "disposition_action", Static(DISPOSITION_ACTION))
        .field(10, "visit_location", Text)
        .field(11, "stop_code", Lookup(LookupDomain::ClinicStops))
        .field(12, attr::SERVICE, Static(LOCATION_SERVICE))
        .field(13, attr::TREATING_SPECIALTY, Lookup(LookupDomain::TreatingSpecialties))
        .field(14, "physical_location", Text)
        .field(15, "ward_location", Lookup(LookupDomain::WardLocations))
        .field(16, "phone", Text)
        .field(17, "principal_clinic", SameBatch)
        .build()
}

/// File 42 lister with an identifier that appends the ward's hospital
/// location as `name&#94;abbreviation&#94;phone`.
fn ward_schema() -> AdtResult<Schema> {
    use FieldDecode::*;

    Schema::builder(EntityKind::Ward)
        .with_layout(Layout::Composite)
        .with_field_count(FieldCount::AtLeast(4))
        .excluding_flag(attr::INACTIVE)
        .field(0, attr::ID, Key)
        .field(1, attr::NAME, Text)
        .field(2, "ptf_specialty", Lookup(LookupDomain::PtfSpecialties))
        .field(3, attr::INACTIVE, Flag)
        .field(4, "hospital_location_id", Text)
        .at(Position::piece(5, '^', 0), "hospital_location_name", Text)
        .at(Position::piece(5, '^', 1), "abbreviation", Text)
        .at(Position::piece(5, '^', 2), "phone", Text)
        .build()
}

/// File 4 lister: `ien^siteId^name^facilityType^displayName`.
fn site_division_schema() -> AdtResult<Schema> {
    use FieldDecode::*;

    Schema::builder(EntityKind::SiteDivision)
        .with_field_count(FieldCount::AtLeast(3))
        .field(0, attr::ID, Key)
        .field(1, "site_id", Text)
        .field(2, attr::NAME, Text)
        .field(3, "facility_type", Lookup(LookupDomain::FacilityTypes))
        .field(4, "display_name", Text)
        .build()
}

/// Visit list: `type;ts;locationId^ts^locationName[^status]`. The first
/// field is the visit id.
fn visit_schema() -> AdtResult<Schema> {
    use FieldDecode::*;

    Schema::builder(EntityKind::Visit)
        .with_field_count(FieldCount::AtLeast(3))
        .field(0, attr::ID, Key)
        .at(Position::piece(0, ';', 0), "visit_type", Text)
        .at(Position::piece(0, ';', 1), attr::TIMESTAMP, Timestamp)
        .at(Position::piece(0, ';', 2), "location_id", Text)
        .field(1, "visit_time", Ignored)
        .field(2, "location_name", Text)
        .at_or(Position::field(3), "status", "NO STATUS")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_schema_validates() {
        for kind in EntityKind::ALL {
            let schema = kind.schema().unwrap();
            assert_eq!(schema.kind(), kind);
        }
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("movement".parse::<EntityKind>().unwrap(), EntityKind::Movement);
        assert_eq!(
            "Hospital_Location".parse::<EntityKind>().unwrap(),
            EntityKind::HospitalLocation
        );
        for kind in EntityKind::ALL {
            assert_eq!(kind.name().parse::<EntityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_kind_from_str_unknown() {
        let err = "bed_control".parse::<EntityKind>().unwrap_err();
        assert!(matches!(err, AdtError::UnknownSchema(ref name) if name == "bed_control"));
    }

    #[test]
    fn test_movement_schema_shape() {
        let schema = EntityKind::Movement.schema().unwrap();
        assert_eq!(schema.fields().len(), 21);
        assert_eq!(schema.field_count(), FieldCount::AtLeast(4));
        assert_eq!(schema.layout(), Layout::Simple);
    }

    #[test]
    fn test_hospital_location_requires_exact_count() {
        let schema = EntityKind::HospitalLocation.schema().unwrap();
        assert_eq!(schema.field_count(), FieldCount::Exactly(18));
    }

    #[test]
    fn test_ward_excludes_inactive() {
        let schema = EntityKind::Ward.schema().unwrap();
        assert_eq!(schema.exclude_flag(), Some(attr::INACTIVE));
        assert_eq!(schema.layout(), Layout::Composite);
    }
}

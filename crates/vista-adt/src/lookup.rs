//! Reference lookup tables.
//!
//! A [`LookupTable`] maps short codes (usually file IENs) to labels for one
//! [`LookupDomain`]. Tables are loaded by the host once per session and are
//! never mutated by the engine.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AdtError;
use crate::traits::LookupSource;

/// Fixed set of reference domains the decoders resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LookupDomain {
    /// Ward locations (file 42).
    WardLocations,
    /// Room-beds (file 405.4); labels read `ROOM-BED`.
    RoomBeds,
    /// Facility movement types (file 405.1).
    FacilityMovementTypes,
    /// MAS movement types (file 405.2).
    MasMovementTypes,
    /// Treating specialties (file 45.7).
    TreatingSpecialties,
    /// Service of each treating specialty, keyed by specialty code.
    TreatingSpecialtyServices,
    /// Medical center divisions (file 40.8).
    MedicalCenterDivisions,
    /// Appointment types (file 409.1).
    AppointmentTypes,
    /// Hospital location types (file 40.9).
    LocationTypes,
    /// Clinic stop codes (file 40.7).
    ClinicStops,
    /// PTF specialties (file 42.4).
    PtfSpecialties,
    /// Facility types (file 4.1).
    FacilityTypes,
}

impl LookupDomain {
    /// Every domain, in declaration order.
    pub const ALL: [LookupDomain; 12] = [
        LookupDomain::WardLocations,
        LookupDomain::RoomBeds,
        LookupDomain::FacilityMovementTypes,
        LookupDomain::MasMovementTypes,
        LookupDomain::TreatingSpecialties,
        LookupDomain::TreatingSpecialtyServices,
        LookupDomain::MedicalCenterDivisions,
        LookupDomain::AppointmentTypes,
        LookupDomain::LocationTypes,
        LookupDomain::ClinicStops,
        LookupDomain::PtfSpecialties,
        LookupDomain::FacilityTypes,
    ];

    /// Canonical snake_case name.
    pub fn name(self) -> &'static str {
        match self {
            LookupDomain::WardLocations => "ward_locations",
            LookupDomain::RoomBeds => "room_beds",
            LookupDomain::FacilityMovementTypes => "facility_movement_types",
            LookupDomain::MasMovementTypes => "mas_movement_types",
            LookupDomain::TreatingSpecialties => "treating_specialties",
            LookupDomain::TreatingSpecialtyServices => "treating_specialty_services",
            LookupDomain::MedicalCenterDivisions => "medical_center_divisions",
            LookupDomain::AppointmentTypes => "appointment_types",
            LookupDomain::LocationTypes => "location_types",
            LookupDomain::ClinicStops => "clinic_stops",
            LookupDomain::PtfSpecialties => "ptf_specialties",
            LookupDomain::FacilityTypes => "facility_types",
        }
    }
}

impl fmt::Display for LookupDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LookupDomain {
    type Err = AdtError;

    /// Parses a domain name, ignoring case and treating `-` like `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        LookupDomain::ALL
            .into_iter()
            .find(|domain| domain.name() == normalized)
            .ok_or_else(|| AdtError::UnknownDomain(s.to_string()))
    }
}

/// Immutable code to label mapping for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LookupTable {
    domain: LookupDomain,
    entries: HashMap<String, String>,
}

impl LookupTable {
    /// Creates an empty table.
    pub fn new(domain: LookupDomain) -> Self {
        Self {
            domain,
            entries: HashMap::new(),
        }
    }

    /// Builds a table from `(code, label)` pairs. Later duplicates win.
    pub fn from_pairs<I, K, V>(domain: LookupDomain, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            domain,
            entries: pairs
                .into_iter()
                .map(|(code, label)| (code.into(), label.into()))
                .collect(),
        }
    }

    /// Adds one entry while building.
    pub fn with_entry(mut self, code: impl Into<String>, label: impl Into<String>) -> Self {
        self.entries.insert(code.into(), label.into());
        self
    }

    /// Domain the table belongs to.
    pub fn domain(&self) -> LookupDomain {
        self.domain
    }

    /// Label for `code`.
    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    /// Returns true if `code` is present.
    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// In-memory set of lookup tables, one per domain.
///
/// # Example
///
/// ```rust
/// use vista_adt::{LookupDomain, LookupSource, LookupTable, LookupTables};
///
/// let tables = LookupTables::new()
///     .with_table(LookupTable::new(LookupDomain::WardLocations).with_entry("12", "3 NORTH"));
///
/// let wards = tables.lookup_table(LookupDomain::WardLocations).unwrap();
/// assert_eq!(wards.get("12"), Some("3 NORTH"));
/// assert!(tables.lookup_table(LookupDomain::RoomBeds).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    tables: HashMap<LookupDomain, LookupTable>,
}

impl LookupTables {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the table for its domain.
    pub fn with_table(mut self, table: LookupTable) -> Self {
        self.insert(table);
        self
    }

    /// Adds or replaces the table for its domain.
    pub fn insert(&mut self, table: LookupTable) {
        self.tables.insert(table.domain(), table);
    }

    /// Adds a table by domain name, failing fast on an unknown name.
    pub fn insert_named<I, K, V>(&mut self, domain: &str, pairs: I) -> Result<(), AdtError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let domain: LookupDomain = domain.parse()?;
        self.insert(LookupTable::from_pairs(domain, pairs));
        Ok(())
    }

    /// Number of loaded domains.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if no domain is loaded.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl LookupSource for LookupTables {
    fn lookup_table(&self, domain: LookupDomain) -> Option<&LookupTable> {
        self.tables.get(&domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_from_str() {
        assert_eq!(
            "ward_locations".parse::<LookupDomain>().unwrap(),
            LookupDomain::WardLocations
        );
        assert_eq!(
            "Room-Beds".parse::<LookupDomain>().unwrap(),
            LookupDomain::RoomBeds
        );
        for domain in LookupDomain::ALL {
            assert_eq!(domain.name().parse::<LookupDomain>().unwrap(), domain);
        }
    }

    #[test]
    fn test_domain_from_str_unknown() {
        let err = "bed_sections".parse::<LookupDomain>().unwrap_err();
        assert!(matches!(err, AdtError::UnknownDomain(ref name) if name == "bed_sections"));
    }

    #[test]
    fn test_table_lookup() {
        let table = LookupTable::from_pairs(
            LookupDomain::FacilityMovementTypes,
            [("1", "DIRECT"), ("2", "OPT-NSC")],
        );
        assert_eq!(table.get("1"), Some("DIRECT"));
        assert_eq!(table.get("9"), None);
        assert!(table.contains("2"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.domain(), LookupDomain::FacilityMovementTypes);
    }

    #[test]
    fn test_tables_insert_named() {
        let mut tables = LookupTables::new();
        tables.insert_named("clinic_stops", [("301", "GENERAL INTERNAL MEDICINE")]).unwrap();
        assert_eq!(
            tables
                .lookup_table(LookupDomain::ClinicStops)
                .and_then(|t| t.get("301")),
            Some("GENERAL INTERNAL MEDICINE")
        );
        assert!(tables.insert_named("nonsense", [("1", "x")]).is_err());
        assert_eq!(tables.len(), 1);
    }
}

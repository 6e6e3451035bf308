//! Static code tables.
//!
//! Small fixed label sets that VistA stores as set-of-codes fields. Each
//! table names its own fallback for codes it does not know; the tables do
//! not agree with each other, and callers depend on that.

/// What a [`CodeTable`] returns for an unknown code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// No label. The raw code is still kept on the decoded value.
    Empty,
    /// The code itself is used as the label.
    Passthrough,
}

/// A fixed code to label table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeTable {
    name: &'static str,
    entries: &'static [(&'static str, &'static str)],
    fallback: Fallback,
}

impl CodeTable {
    /// Declares a table.
    pub const fn new(
        name: &'static str,
        entries: &'static [(&'static str, &'static str)],
        fallback: Fallback,
    ) -> Self {
        Self {
            name,
            entries,
            fallback,
        }
    }

    /// Table name, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fallback policy for unknown codes.
    pub fn fallback(&self) -> Fallback {
        self.fallback
    }

    /// Known label for `code`, ignoring the fallback.
    pub fn known(&self, code: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, label)| *label)
    }

    /// Decodes `code`, applying the table's fallback.
    pub fn decode(&self, code: &str) -> Option<String> {
        match (self.known(code), self.fallback) {
            (Some(label), _) => Some(label.to_string()),
            (None, Fallback::Passthrough) => Some(code.to_string()),
            (None, Fallback::Empty) => None,
        }
    }
}

/// Patient movement transaction type (file 405, field .02).
pub const MOVEMENT_TRANSACTION: CodeTable = CodeTable::new(
    "movement_transaction",
    &[
        ("1", "ADMISSION"),
        ("2", "TRANSFER"),
        ("3", "DISCHARGE"),
        ("4", "CHECK-IN LODGER"),
        ("5", "CHECK-OUT LODGER"),
        ("6", "SPECIALTY TRANSFER"),
    ],
    Fallback::Empty,
);

/// Hospital location type (file 44, field 2).
pub const LOCATION_TYPE: CodeTable = CodeTable::new(
    "location_type",
    &[
        ("C", "CLINIC"),
        ("M", "MODULE"),
        ("W", "WARD"),
        ("Z", "OTHER LOCATION"),
        ("N", "NON-CLINIC STOP"),
        ("F", "FILE AREA"),
        ("I", "IMAGING"),
        ("OR", "OPERATING ROOM"),
    ],
    Fallback::Empty,
);

/// Hospital location disposition action (file 44, field 6).
pub const DISPOSITION_ACTION: CodeTable = CodeTable::new(
    "disposition_action",
    &[
        ("0", "NONE"),
        ("1", "APPOINTMENT REC REQ"),
        ("2", "SCHEDULING"),
    ],
    Fallback::Empty,
);

/// Hospital location service (file 44, field 9).
pub const LOCATION_SERVICE: CodeTable = CodeTable::new(
    "location_service",
    &[
        ("M", "MEDICINE"),
        ("S", "SURGERY"),
        ("P", "PSYCHIATRY"),
        ("R", "REHAB MEDICINE"),
        ("N", "NEUROLOGY"),
        ("0", "NONE"),
    ],
    Fallback::Empty,
);

/// Appointment purpose of visit (file 2.98, field 9).
pub const APPOINTMENT_PURPOSE: CodeTable = CodeTable::new(
    "appointment_purpose",
    &[
        ("1", "C&P"),
        ("2", "10-10"),
        ("3", "SCHEDULED VISIT"),
        ("4", "UNSCHED. VISIT"),
    ],
    Fallback::Passthrough,
);

/// Appointment status (file 2.98, field 3).
pub const APPOINTMENT_STATUS: CodeTable = CodeTable::new(
    "appointment_status",
    &[
        ("N", "NO-SHOW"),
        ("C", "CANCELLED BY CLINIC"),
        ("NA", "NO-SHOW & AUTO RE-BOOK"),
        ("CA", "CANCELLED BY CLINIC & AUTO RE-BOOK"),
        ("I", "INPATIENT APPOINTMENT"),
        ("PC", "CANCELLED BY PATIENT"),
        ("PCA", "CANCELLED BY PATIENT & AUTO-REBOOK"),
        ("NT", "NO ACTION TAKEN"),
    ],
    Fallback::Passthrough,
);

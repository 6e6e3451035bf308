//! Integration tests for the ADT engine.
//!
//! These tests drive the engine through an in-memory transport that records
//! every query and can be told to fail or cancel on a given call.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use vista_adt::{
    attr, AdtEngine, AdtError, BoxError, CancellationFlag, EngineConfig, EntityKind, FetchQuery,
    IntervalSpec, KeyPolicy, LookupDomain, LookupTable, LookupTables, Patient, RecordSource,
    Selector,
};
use vista_text::{RawBatch, TextError};

/// Mock VistA session.
struct MockBroker {
    responses: HashMap<(EntityKind, String), String>,
    calls: RefCell<Vec<FetchQuery>>,
    fail_on_call: Option<usize>,
    cancel_after_call: Option<(usize, CancellationFlag)>,
    call_count: Cell<usize>,
}

impl MockBroker {
    fn new() -> Self {
        MockBroker {
            responses: HashMap::new(),
            calls: RefCell::new(Vec::new()),
            fail_on_call: None,
            cancel_after_call: None,
            call_count: Cell::new(0),
        }
    }

    fn respond(mut self, kind: EntityKind, key: &str, text: &str) -> Self {
        self.responses.insert((kind, key.to_string()), text.to_string());
        self
    }

    fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    fn cancelling_after(mut self, call: usize, flag: CancellationFlag) -> Self {
        self.cancel_after_call = Some((call, flag));
        self
    }

    fn calls(&self) -> Vec<FetchQuery> {
        self.calls.borrow().clone()
    }
}

impl RecordSource for MockBroker {
    fn fetch(&self, query: &FetchQuery) -> Result<RawBatch, BoxError> {
        let call = self.call_count.get() + 1;
        self.call_count.set(call);
        self.calls.borrow_mut().push(query.clone());

        if self.fail_on_call == Some(call) {
            return Err("broker connection reset".into());
        }
        if let Some((after, flag)) = &self.cancel_after_call {
            if *after == call {
                flag.cancel();
            }
        }

        let key = match &query.selector {
            Selector::Window(filter) => filter.part.clone(),
            Selector::Key(key) => key.clone(),
            Selector::All => String::new(),
        };
        Ok(self
            .responses
            .get(&(query.schema, key))
            .map(|text| RawBatch::from_response(text))
            .unwrap_or_else(RawBatch::empty))
    }
}

/// Set `RUST_LOG=vista_adt=debug` to see window and decode events.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session_tables() -> LookupTables {
    LookupTables::new()
        .with_table(LookupTable::from_pairs(
            LookupDomain::WardLocations,
            [("12", "3 NORTH"), ("14", "5 SOUTH")],
        ))
        .with_table(LookupTable::from_pairs(
            LookupDomain::RoomBeds,
            [("7", "301-A")],
        ))
        .with_table(LookupTable::from_pairs(
            LookupDomain::TreatingSpecialties,
            [("33", "GENERAL MEDICINE")],
        ))
        .with_table(LookupTable::from_pairs(
            LookupDomain::TreatingSpecialtyServices,
            [("33", "MEDICINE")],
        ))
        .with_table(LookupTable::from_pairs(
            LookupDomain::MedicalCenterDivisions,
            [("1", "ALBANY VAMC")],
        ))
}

fn patients(local_id: &str) -> Result<Patient, BoxError> {
    Ok(Patient::new(local_id)
        .with_name(format!("PATIENT,{local_id}"))
        .with_identifier("ssn", "000000000"))
}

// =============================================================================
// Decoding
// =============================================================================

#[test]
fn test_movement_scenario() {
    let broker = MockBroker::new();
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);

    let raw = RawBatch::from_response("123^20230401.093000^1^456^^^^^");
    let records = engine.decode_batch("movement", &raw).unwrap();

    assert_eq!(records.len(), 1);
    let movement = &records[0];
    assert_eq!(movement.id(), "123");
    assert_eq!(
        movement.timestamp(attr::TIMESTAMP).unwrap().to_string(),
        "2023-04-01 09:30:00"
    );
    assert_eq!(movement.text("transaction"), Some("1"));
    assert_eq!(movement.label("transaction"), Some("ADMISSION"));
    assert_eq!(movement.text(attr::PATIENT), Some("456"));
}

#[test]
fn test_full_movement_resolution() {
    let broker = MockBroker::new();
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);

    let raw = RawBatch::from_response("123^3230401.093^1^456^^12^7^33^123^^^^^^^^^^1^0^DOCTOR,A");
    let movement = &engine.decode_batch("movement", &raw).unwrap()[0];

    assert_eq!(movement.label("ward"), Some("3 NORTH"));
    assert_eq!(movement.text(attr::ROOM), Some("301"));
    assert_eq!(movement.text(attr::BED), Some("A"));
    assert_eq!(movement.label(attr::TREATING_SPECIALTY), Some("GENERAL MEDICINE"));
    assert_eq!(movement.label(attr::SERVICE), Some("MEDICINE"));
    assert_eq!(movement.flag("sc_condition"), Some(true));
    assert_eq!(movement.flag("scheduled_admission"), Some(false));
    assert_eq!(movement.text("attending_name"), Some("DOCTOR,A"));
}

#[test]
fn test_unknown_lookup_code_keeps_record() {
    let broker = MockBroker::new();
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);

    let raw = RawBatch::from_response("123^3230401.093^1^456^^99^^^");
    let records = engine.decode_batch("movement", &raw).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text("ward"), Some("99"));
    assert_eq!(records[0].label("ward"), None);
}

#[test]
fn test_missing_key_policy() {
    let broker = MockBroker::new();
    let tables = session_tables();
    let raw = RawBatch::from_response("^3230401.093^1^456\n124^3230401.1^2^456");

    let skipping = AdtEngine::new(&broker, &tables);
    let records = skipping.decode_batch("movement", &raw).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), "124");

    let strict = AdtEngine::with_config(
        &broker,
        &tables,
        EngineConfig::builder()
            .with_key_policy(KeyPolicy::AbortBatch)
            .build(),
    );
    let err = strict.decode_batch("movement", &raw).unwrap_err();
    assert!(matches!(err, AdtError::MissingPrimaryKey { .. }));
}

#[test]
fn test_hospital_location_self_join() {
    let broker = MockBroker::new();
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);

    let raw = RawBatch::from_lines([
        "10^CARDIOLOGY^CARD^C^^500^ALBANY^1^20^^^^M^^^^555-1234^",
        "20^MEDICINE MODULE^MED^M^^500^ALBANY^1^^^^^M^^^^^10",
        "30^ORPHAN CLINIC^ORP^C^^500^ALBANY^^99^^^^^^^^^",
    ]);
    let locations = engine.decode_batch("hospital_location", &raw).unwrap();

    assert_eq!(locations.len(), 3);
    assert_eq!(locations[0].label("module"), Some("MEDICINE MODULE"));
    assert_eq!(locations[0].label("location_type"), Some("CLINIC"));
    assert_eq!(locations[0].label("division"), Some("ALBANY VAMC"));
    assert_eq!(locations[0].label(attr::SERVICE), Some("MEDICINE"));
    assert_eq!(locations[1].label("principal_clinic"), Some("CARDIOLOGY"));
    assert_eq!(locations[2].text("module"), Some("99"));
    assert_eq!(locations[2].label("module"), None);
}

// =============================================================================
// Windowed retrieval
// =============================================================================

#[test]
fn test_month_window_issues_one_fetch() {
    let broker = MockBroker::new().respond(
        EntityKind::Movement,
        "32301",
        "1^3230105.08^1^456\n2^3230120.1415^3^456",
    );
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);

    let result = engine
        .windowed_fetch("20230101", "20230201", "month", |window| {
            engine.fetch(&FetchQuery::window(
                EntityKind::Movement,
                window.filter.clone(),
            ))
        })
        .unwrap();

    assert_eq!(broker.calls().len(), 1);
    assert_eq!(result.count(), 2);
    assert_eq!(result.stats.windows, 1);
    assert_eq!(result.records[1].label("transaction"), Some("DISCHARGE"));
}

#[test]
fn test_window_filters_sent_in_order() {
    let broker = MockBroker::new();
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);

    engine.inpatient_moves("3230401", "3230404").unwrap();

    let filters: Vec<_> = broker
        .calls()
        .into_iter()
        .map(|query| match query.selector {
            Selector::Window(filter) => (filter.from, filter.part),
            other => panic!("unexpected selector {other:?}"),
        })
        .collect();
    assert_eq!(
        filters,
        vec![
            ("3230331.235959".to_string(), "3230401".to_string()),
            ("3230401.235959".to_string(), "3230402".to_string()),
            ("3230402.235959".to_string(), "3230403".to_string()),
        ]
    );
}

#[test]
fn test_failure_on_second_window_discards_everything() {
    init_tracing();
    let broker = MockBroker::new()
        .respond(EntityKind::Movement, "3230401", "1^3230401.09^1^456")
        .respond(EntityKind::Movement, "3230403", "3^3230403.09^3^456")
        .failing_on(2);
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);

    let err = engine.inpatient_moves("20230401", "20230404").unwrap_err();

    assert_eq!(err.window(), Some(2));
    assert_eq!(err.to_string(), "transport error in window 2");
    assert_eq!(broker.calls().len(), 2);
}

#[test]
fn test_malformed_line_in_second_window_names_window() {
    init_tracing();
    let broker = MockBroker::new()
        .respond(EntityKind::Checkin, "3230401", "100^3230401.08^100")
        .respond(EntityKind::Checkin, "3230402", "200^3230402.10")
        .respond(EntityKind::Checkin, "3230403", "300^3230403.09^300");
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);

    let err = engine
        .stay_movements_by_date_range("20230401", "20230404", &patients)
        .unwrap_err();

    assert_eq!(err.window(), Some(2));
    assert!(matches!(
        err.inner(),
        AdtError::Format(TextError::FieldCount { expected: 3, found: 2, ref line })
            if line == "200^3230402.10"
    ));
    assert!(err.to_string().starts_with("window 2 failed: "));
    // No third window, no movement fetches.
    assert_eq!(broker.calls().len(), 2);
}

#[test]
fn test_missing_key_in_window_names_window_when_aborting() {
    let broker = MockBroker::new()
        .respond(EntityKind::Movement, "3230401", "1^3230401.09^1^456")
        .respond(EntityKind::Movement, "3230402", "^3230402.09^2^456");
    let tables = session_tables();
    let engine = AdtEngine::with_config(
        &broker,
        &tables,
        EngineConfig::builder()
            .with_key_policy(KeyPolicy::AbortBatch)
            .build(),
    );

    let err = engine
        .windowed_fetch("20230401", "20230404", "day", |window| {
            engine.fetch(&FetchQuery::window(
                EntityKind::Movement,
                window.filter.clone(),
            ))
        })
        .unwrap_err();

    assert_eq!(err.window(), Some(2));
    assert!(matches!(
        err,
        AdtError::InWindow { window: 2, ref source }
            if matches!(**source, AdtError::MissingPrimaryKey { .. })
    ));
    assert_eq!(broker.calls().len(), 2);
}

#[test]
fn test_cancellation_returns_completed_windows() {
    let cancel = CancellationFlag::new();
    let broker = MockBroker::new()
        .respond(EntityKind::Movement, "3230401", "1^3230401.09^1^456")
        .respond(EntityKind::Movement, "3230402", "2^3230402.09^2^456")
        .cancelling_after(1, cancel.clone());
    let tables = session_tables();
    let config = EngineConfig::builder().with_cancellation(cancel).build();
    let engine = AdtEngine::with_config(&broker, &tables, config);

    let err = engine.inpatient_moves("20230401", "20230405").unwrap_err();

    match err {
        AdtError::Cancelled {
            completed_windows,
            partial,
        } => {
            assert_eq!(completed_windows, 1);
            assert_eq!(partial.len(), 1);
            assert_eq!(partial[0].id(), "1");
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(broker.calls().len(), 1);
}

#[test]
fn test_week_interval_from_config() {
    let broker = MockBroker::new();
    let tables = session_tables();
    let config = EngineConfig::builder()
        .with_interval(IntervalSpec::Week)
        .build();
    let engine = AdtEngine::with_config(&broker, &tables, config);

    let result = engine.inpatient_moves("20230101", "20230201").unwrap();

    assert_eq!(result.stats.windows, 5);
    assert_eq!(broker.calls().len(), 5);
    assert!(result.is_empty());
}

#[test]
fn test_too_many_windows_fails_before_fetching() {
    let broker = MockBroker::new();
    let tables = session_tables();
    let config = EngineConfig::builder()
        .with_interval(IntervalSpec::Hour)
        .with_max_windows(24)
        .build();
    let engine = AdtEngine::with_config(&broker, &tables, config);

    let err = engine.inpatient_moves("20230101", "20230103").unwrap_err();

    assert!(matches!(err, AdtError::Configuration(_)));
    assert!(broker.calls().is_empty());
}

// =============================================================================
// Stays
// =============================================================================

#[test]
fn test_stays_by_date_range() {
    init_tracing();
    let broker = MockBroker::new()
        .respond(
            EntityKind::Checkin,
            "3230401",
            "100^3230401.08^100\n101^3230401.12^100",
        )
        .respond(EntityKind::Checkin, "3230402", "200^3230402.10^200\n201^3230402.11^")
        .respond(
            EntityKind::Movement,
            "100",
            "100^3230401.08^1^456^^12^7^33^100\n101^3230401.12^2^456^^14^^33^100",
        )
        .respond(
            EntityKind::Movement,
            "200",
            "200^3230402.10^1^789^^14^^^200",
        );
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);

    let report = engine
        .stay_movements_by_date_range("20230401", "20230403", &patients)
        .unwrap();

    assert_eq!(report.len(), 2);
    assert!(!report.has_conflicts());

    let first = report.stay("100").unwrap();
    assert_eq!(first.patient.name.as_deref(), Some("PATIENT,456"));
    assert_eq!(first.movements.len(), 2);
    assert_eq!(first.movements[1].label("ward"), Some("5 SOUTH"));

    let second = report.stay("200").unwrap();
    assert_eq!(second.patient.local_id, "789");

    // Two check-in windows, then one movement fetch per stay.
    let calls = broker.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[2], FetchQuery::key(EntityKind::Movement, "100"));
    assert_eq!(calls[3], FetchQuery::key(EntityKind::Movement, "200"));
}

#[test]
fn test_stay_with_conflicting_patients() {
    let broker = MockBroker::new().respond(
        EntityKind::Movement,
        "100",
        "100^3230401.08^1^456^^^^^100\n101^3230401.12^2^457^^^^^100",
    );
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);

    let report = engine.stay_movements("100", &patients).unwrap();

    assert_eq!(report.len(), 1);
    assert_eq!(report.stays[0].patient.local_id, "456");
    assert_eq!(report.stays[0].movements.len(), 2);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].conflicting_patient, "457");
}

#[test]
fn test_patient_lookup_failure() {
    let broker = MockBroker::new().respond(
        EntityKind::Movement,
        "100",
        "100^3230401.08^1^456^^^^^100",
    );
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);

    let unavailable = |_: &str| -> Result<Patient, BoxError> { Err("patient file locked".into()) };
    let err = engine.stay_movements("100", &unavailable).unwrap_err();

    assert!(matches!(err, AdtError::PatientResolution { .. }));
}

#[test]
fn test_transport_failure_outside_window() {
    let broker = MockBroker::new().failing_on(1);
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);

    let err = engine.stay_movements("100", &patients).unwrap_err();

    assert!(matches!(err, AdtError::Transport { window: None, .. }));
    assert_eq!(err.to_string(), "transport error");
}

#[cfg(feature = "serde")]
#[test]
fn test_stay_report_serializes() {
    let broker = MockBroker::new().respond(
        EntityKind::Movement,
        "100",
        "100^3230401.08^1^456^^12^^^100",
    );
    let tables = session_tables();
    let engine = AdtEngine::new(&broker, &tables);
    let report = engine.stay_movements("100", &patients).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["stays"][0]["checkin_id"], "100");
    assert_eq!(json["stays"][0]["patient"]["local_id"], "456");

    let back: vista_adt::StayReport = serde_json::from_value(json).unwrap();
    assert_eq!(back, report);
}

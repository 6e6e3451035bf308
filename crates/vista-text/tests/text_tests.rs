//! Integration tests for tokenizing and timestamp handling of whole
//! responses.

use vista_text::{
    format_fixed, format_timestamp, parse_timestamp, tokenize, LineEncoder, RawBatch, TextError,
};

#[test]
fn test_movement_listing_response() {
    let response = "123^3230401.093^1^456^^12^7^33^123\r\n\
                    124^3230402.1415^2^456^^14^^33^123\r\n\
                    \r\n";
    let records = tokenize(response);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].field_count(), 9);
    assert_eq!(records[1].field(1), Some("3230402.1415"));
    assert_eq!(records[1].field(6), None);

    let ts = parse_timestamp(records[1].field(1).unwrap()).unwrap();
    assert_eq!(ts.to_string(), "2023-04-02 14:15:00");
}

#[test]
fn test_ward_listing_with_escaped_pieces() {
    let batch = RawBatch::from_response(
        "12^3 NORTH^8^^44^3 NORTH&#94;3N&#94;555-0101\n\
         13^OLD WARD^8^1^45^OLD WARD&#94;OW&#94;\n",
    );
    let records = batch.composite_records().unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].field(5), Some("3 NORTH^3N^555-0101"));
    assert_eq!(records[0].subfields(5, '^'), vec!["3 NORTH", "3N", "555-0101"]);
    assert_eq!(records[1].field(3), Some("1"));
}

#[test]
fn test_appointment_parts() {
    let batch = RawBatch::from_response("3230405.09^44^I^^^^3^9~CARDIOLOGY^1~555-0199");
    let record = &batch.composite_records().unwrap()[0];

    assert_eq!(record.part_count(), 3);
    assert_eq!(record.field(1), Some("44"));
    assert_eq!(record.part_field(1, 0), Some("CARDIOLOGY"));
    assert_eq!(record.part_field(2, 0), Some("555-0199"));
    assert_eq!(record.part_field(3, 0), None);
}

#[test]
fn test_unterminated_escape_names_part() {
    let batch = RawBatch::from_response("1^OK~BROKEN&#94");
    let err = batch.composite_records().unwrap_err();
    assert!(matches!(err, TextError::UnterminatedPart { part: 1, .. }));
}

#[test]
fn test_literal_ampersand_hash_in_ward_name() {
    let batch = RawBatch::from_response("12^AT&#T CLINIC^8^^44^W&#94;X&#94;555\n13^AT&#38;#T^8^^45^\n");
    let records = batch.composite_records().unwrap();

    assert_eq!(records[0].field(1), Some("AT&#T CLINIC"));
    assert_eq!(records[0].subfields(5, '^'), vec!["W", "X", "555"]);
    assert_eq!(records[1].field(1), Some("AT&#T"));
}

#[test]
fn test_encoded_composite_line_tokenizes_back() {
    let line = LineEncoder::new()
        .field("12")
        .field("CARDIOLOGY ^ SURGERY")
        .empty()
        .part()
        .field("R&D ~ &#lab")
        .build_composite();

    let batch = RawBatch::from_response(&line);
    let record = &batch.composite_records().unwrap()[0];

    assert_eq!(record.field(1), Some("CARDIOLOGY ^ SURGERY"));
    assert_eq!(record.field(2), None);
    assert_eq!(record.part_field(1, 0), Some("R&D ~ &#lab"));
}

#[test]
fn test_timestamp_forms_agree() {
    let fileman = parse_timestamp("3230401.0930").unwrap();
    let external = parse_timestamp("20230401.093000").unwrap();
    assert_eq!(fileman, external);

    assert_eq!(format_timestamp(&fileman).unwrap(), "3230401.093");
    assert_eq!(format_fixed(&fileman).unwrap(), "3230401.093000");
}

#[test]
fn test_invalid_timestamps() {
    assert!(matches!(parse_timestamp(""), Err(TextError::EmptyInput)));
    assert!(matches!(
        parse_timestamp("3231301"),
        Err(TextError::InvalidTimestamp(_))
    ));
    assert!(matches!(
        parse_timestamp("3230401.25"),
        Err(TextError::InvalidTimestamp(_))
    ));
    assert!(matches!(
        parse_timestamp("TODAY"),
        Err(TextError::InvalidTimestamp(_))
    ));
}

#[cfg(feature = "serde")]
#[test]
fn test_batch_serde() {
    let batch = RawBatch::from_response("1^A\n2^B");
    let json = serde_json::to_string(&batch).unwrap();
    let back: RawBatch = serde_json::from_str(&json).unwrap();
    assert_eq!(back, batch);
}

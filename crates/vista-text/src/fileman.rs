//! FileMan timestamp codec.
//!
//! VistA stores instants as `YYYMMDD.HHMMSS`, where `YYY` is the year minus
//! 1700 and trailing zeros of the time are dropped (`3230401.093` is
//! 2023-04-01 09:30:00; midnight has no fraction at all). Some listings echo
//! the external 8-digit form `YYYYMMDD[.HHMMSS]` instead, so decoding accepts
//! both. Encoding always produces canonical FileMan form.
//!
//! The supported range is years 1700 through 2699 at second precision; every
//! instant in that range survives `format_timestamp` then `parse_timestamp`
//! unchanged.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use nom::{
    character::complete::{char, digit1},
    combinator::{all_consuming, opt},
    sequence::{pair, preceded},
    IResult,
};

use crate::error::{TextError, TextResult};

/// First year representable in FileMan form.
pub const MIN_YEAR: i32 = 1700;

/// Last year representable in FileMan form.
pub const MAX_YEAR: i32 = 2699;

/// Parses a FileMan (`3230401.0930`) or external (`20230401.093000`) timestamp.
///
/// ```rust
/// use chrono::NaiveDate;
/// use vista_text::parse_timestamp;
///
/// let expected = NaiveDate::from_ymd_opt(2023, 4, 1)
///     .unwrap()
///     .and_hms_opt(9, 30, 0)
///     .unwrap();
/// assert_eq!(parse_timestamp("3230401.093").unwrap(), expected);
/// assert_eq!(parse_timestamp("20230401.093000").unwrap(), expected);
/// ```
pub fn parse_timestamp(text: &str) -> TextResult<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TextError::EmptyInput);
    }

    let invalid = || TextError::InvalidTimestamp(text.to_string());

    let (_, (date_digits, time_digits)) = all_consuming(timestamp)(text).map_err(|_| invalid())?;

    let year = match date_digits.len() {
        7 => MIN_YEAR + digits(&date_digits[0..3]),
        8 => digits(&date_digits[0..4]),
        _ => return Err(invalid()),
    };
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(invalid());
    }

    let tail = &date_digits[date_digits.len() - 4..];
    let month = digits(&tail[0..2]) as u32;
    let day = digits(&tail[2..4]) as u32;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;

    let time = match time_digits {
        None => NaiveTime::MIN,
        Some(fraction) if fraction.len() <= 6 => {
            let padded = format!("{fraction:0<6}");
            NaiveTime::from_hms_opt(
                digits(&padded[0..2]) as u32,
                digits(&padded[2..4]) as u32,
                digits(&padded[4..6]) as u32,
            )
            .ok_or_else(invalid)?
        }
        Some(_) => return Err(invalid()),
    };

    Ok(date.and_time(time))
}

/// Formats a timestamp in canonical FileMan form.
///
/// Sub-second precision is discarded. Fails for years outside
/// [`MIN_YEAR`]..=[`MAX_YEAR`].
pub fn format_timestamp(ts: &NaiveDateTime) -> TextResult<String> {
    let mut out = fileman_date(ts)?;
    let time = format!("{:02}{:02}{:02}", ts.hour(), ts.minute(), ts.second());
    let time = time.trim_end_matches('0');
    if !time.is_empty() {
        out.push('.');
        out.push_str(time);
    }
    Ok(out)
}

/// Formats a timestamp in fixed-width FileMan form, `YYYMMDD.HHMMSS`.
///
/// Every instant yields exactly 14 characters, so two fixed forms can be
/// compared or prefixed character by character.
pub fn format_fixed(ts: &NaiveDateTime) -> TextResult<String> {
    let date = fileman_date(ts)?;
    Ok(format!(
        "{date}.{:02}{:02}{:02}",
        ts.hour(),
        ts.minute(),
        ts.second()
    ))
}

/// Returns true if `ts` falls inside the representable year range.
pub fn in_range(ts: &NaiveDateTime) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&ts.year())
}

fn fileman_date(ts: &NaiveDateTime) -> TextResult<String> {
    if !in_range(ts) {
        return Err(TextError::InvalidTimestamp(ts.to_string()));
    }
    Ok(format!(
        "{:03}{:02}{:02}",
        ts.year() - MIN_YEAR,
        ts.month(),
        ts.day()
    ))
}

// Callers pass ASCII digit slices already validated by `digit1`.
fn digits(text: &str) -> i32 {
    text.bytes().fold(0, |acc, b| acc * 10 + i32::from(b - b'0'))
}

fn timestamp(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    pair(digit1, opt(preceded(char('.'), digit1)))(input)
}

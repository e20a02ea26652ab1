use crate::error::{BlearnError, BlearnResult};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;

const HOUR: i32 = 3600;

/// Parse the "Date Submitted" value of an attempt log.
///
/// The LMS writes e.g. `Monday, 16 January 2023 11:56:43 o'clock GMT`: a
/// weekday prefix, a day-month-year wall time, an optional `o'clock` and a
/// timezone that is usually an abbreviation rather than an offset.
pub fn parse_datetime(raw: &str) -> BlearnResult<DateTime<FixedOffset>> {
    let (_, rest) = raw
        .trim()
        .split_once(", ")
        .ok_or_else(|| BlearnError::Parse(format!("Could not parse datetime string: {raw:?}")))?;
    let rest = rest.replace("o'clock ", "");
    let (dt_str, dt_tz) = rest
        .trim()
        .rsplit_once(' ')
        .ok_or_else(|| BlearnError::Parse(format!("Missing timezone in datetime: {raw:?}")))?;

    let invalid = || {
        BlearnError::Parse(format!(
            "Could not parse datetime string: dt_str={dt_str:?}, dt_tz={dt_tz:?}"
        ))
    };

    let naive = NaiveDateTime::parse_from_str(dt_str, "%d %B %Y %H:%M:%S").map_err(|_| invalid())?;
    let offset = resolve_offset(dt_tz, &naive).ok_or_else(invalid)?;
    offset.from_local_datetime(&naive).single().ok_or_else(invalid)
}

/// Offset for a timezone abbreviation, a numeric offset (`+01:00` /
/// `+0100`) or an IANA zone name, evaluated at local wall time `at`.
///
/// Abbreviations are checked before IANA names: `CET` in a log means
/// standard time even in summer.
pub fn resolve_offset(tz: &str, at: &NaiveDateTime) -> Option<FixedOffset> {
    let hours = match tz {
        "GMT" | "UTC" | "Z" => 0,
        "BST" | "CET" => 1,
        "CEST" => 2,
        "EST" => -5,
        "EDT" | "AST" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        other if other.starts_with(['+', '-']) => return parse_numeric_offset(other),
        other => return iana_offset(other, at),
    };
    FixedOffset::east_opt(hours * HOUR)
}

/// Offset of an IANA zone at a wall time; `None` inside a DST gap.
/// An ambiguous wall time (clocks going back) takes the earlier offset.
fn iana_offset(name: &str, at: &NaiveDateTime) -> Option<FixedOffset> {
    let zone: Tz = name.parse().ok()?;
    zone.offset_from_local_datetime(at)
        .earliest()
        .map(|offset| offset.fix())
}

fn parse_numeric_offset(tz: &str) -> Option<FixedOffset> {
    let (sign, digits) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * HOUR + minutes * 60))
}

use crate::error::{BlearnError, BlearnResult};
use crate::types::LogFilename;
use chrono::NaiveDate;
use regex::Regex;

/// Attempt-log name matcher, compiled once and reused across a listing
pub struct LogNameParser {
    re: Regex,
}

impl LogNameParser {
    pub fn new() -> BlearnResult<Self> {
        // The id never contains '_', so the assignment may.
        let re = Regex::new(
            r"^(?P<assignment>.+)_(?P<id>[^_]+)_attempt_(?P<year>\d{4})-(?P<month>\d{1,2})-(?P<day>\d{1,2})-(?P<hour>\d{1,2})-(?P<minute>\d{1,2})-(?P<second>\d{1,2})\.txt$",
        )
        .map_err(|e| BlearnError::Parse(format!("Regex error: {}", e)))?;
        Ok(Self { re })
    }

    /// Returns `None` when the name does not follow the LMS pattern or the
    /// embedded timestamp is not a valid date.
    pub fn parse(&self, name: &str) -> Option<LogFilename> {
        let caps = self.re.captures(name)?;
        let num = |key: &str| caps.name(key).and_then(|m| m.as_str().parse::<u32>().ok());

        let year = caps.name("year")?.as_str().parse::<i32>().ok()?;
        let submitted_at = NaiveDate::from_ymd_opt(year, num("month")?, num("day")?)?
            .and_hms_opt(num("hour")?, num("minute")?, num("second")?)?;

        Some(LogFilename {
            assignment: caps["assignment"].to_string(),
            id: caps["id"].to_string(),
            submitted_at,
        })
    }

    pub fn is_log(&self, name: &str) -> bool {
        self.parse(name).is_some()
    }
}

/// Parse one attempt-log file name.
///
/// # Example
/// ```
/// use blearn::parser::parse_log_filename;
///
/// let meta = parse_log_filename("Essay 1_s1234567_attempt_2023-01-16-11-56-43.txt").unwrap();
/// assert_eq!(meta.assignment, "Essay 1");
/// assert_eq!(meta.id, "s1234567");
/// ```
pub fn parse_log_filename(name: &str) -> Option<LogFilename> {
    LogNameParser::new().ok()?.parse(name)
}

pub fn is_log_filename(name: &str) -> bool {
    parse_log_filename(name).is_some()
}

/// Files stored for the same attempt as `log`: every candidate whose name
/// starts with the log's stem, except the log itself.
pub fn similar_files(log: &str, candidates: &[String]) -> Vec<String> {
    let stem = log.rsplit_once('.').map_or(log, |(stem, _)| stem);
    candidates
        .iter()
        .filter(|c| c.starts_with(stem) && c.as_str() != log)
        .cloned()
        .collect()
}

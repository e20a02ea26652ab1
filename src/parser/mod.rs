//! Parsers for the loosely structured metadata an LMS bundle carries
//!
//! - `filename`: attempt-log file names (`{assignment}_{id}_attempt_{timestamp}.txt`)
//! - `datetime`: the LMS "Date Submitted" format, with timezone abbreviations or IANA zone names
//! - `log`: the attempt-log text itself

pub mod datetime;
pub mod filename;
pub mod log;

pub use datetime::parse_datetime;
pub use filename::{is_log_filename, parse_log_filename, similar_files, LogNameParser};
pub use log::{parse_log, parse_log_file};

use crate::error::{BlearnError, BlearnResult};
use crate::parser::datetime::parse_datetime;
use crate::types::{SubmissionLog, SubmittedFile};
use regex::Regex;
use std::path::Path;

/// Layout of an attempt log, quoted in parse errors
pub const LOG_TEMPLATE: &str = "\
Name: {name} ({id})
Assignment: {assignment}
Date Submitted: {datetime_raw}
Current Mark: {current_mark}

Submission Field:
{submission_field}

Comments:
{submission_comment}

Files:
{files}
";

/// Layout of one entry of the `Files:` section
pub const FILE_TEMPLATE: &str = "\tOriginal filename: {fname_original}\n\tFilename: {fname_blearn}";

pub const NO_COMMENT: &str = "There are no student comments for this assignment.";
pub const NO_SUBMISSION_FIELD: &str =
    "There is no student submission text data for this assignment.";
pub const NO_FILES: &str = "No files were attached to this submission.";

fn log_regex() -> BlearnResult<Regex> {
    Regex::new(concat!(
        r"(?s)^Name: (?P<name>[^\n]+) \((?P<id>[^()\n]+)\)\n",
        r"Assignment: (?P<assignment>[^\n]+)\n",
        r"Date Submitted: (?P<datetime_raw>[^\n]+)\n",
        r"Current Mark: ?(?P<current_mark>[^\n]*)\n",
        r"\nSubmission Field:\n(?P<submission_field>.*?)\n",
        r"\nComments:\n(?P<submission_comment>.*?)\n",
        r"\nFiles:\n(?P<files>.*?)\s*\z",
    ))
    .map_err(|e| BlearnError::Parse(format!("Regex error: {}", e)))
}

fn file_regex() -> BlearnResult<Regex> {
    Regex::new(r"^\s*Original filename: (?P<original>[^\n]*)\n\s*Filename: (?P<stored>[^\n]*)\s*$")
        .map_err(|e| BlearnError::Parse(format!("Regex error: {}", e)))
}

/// Parse the text of an attempt log.
///
/// With `remove_empty`, the LMS placeholder sentences for a missing
/// submission field, comment or file list are replaced by empty strings.
pub fn parse_log(text: &str, file_name: Option<&str>, remove_empty: bool) -> BlearnResult<SubmissionLog> {
    let text = text.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let caps = log_regex()?
        .captures(&text)
        .ok_or_else(|| BlearnError::no_match(&text, LOG_TEMPLATE))?;

    let field = |key: &str| caps.name(key).map_or("", |m| m.as_str()).to_string();
    let mut submission_field = field("submission_field");
    let mut submission_comment = field("submission_comment");
    let mut files_block = field("files");

    if remove_empty {
        if submission_field == NO_SUBMISSION_FIELD {
            submission_field.clear();
        }
        if submission_comment == NO_COMMENT {
            submission_comment.clear();
        }
        if files_block.trim() == NO_FILES {
            files_block.clear();
        }
    }

    Ok(SubmissionLog {
        id: field("id").trim().to_string(),
        name: field("name").trim().to_string(),
        assignment: field("assignment").trim().to_string(),
        submitted_at: parse_datetime(&field("datetime_raw"))?,
        current_mark: field("current_mark").trim().to_string(),
        submission_field,
        submission_comment,
        files: parse_files(&files_block)?,
        log: file_name.map(str::to_string),
    })
}

fn parse_files(block: &str) -> BlearnResult<Vec<SubmittedFile>> {
    let re = file_regex()?;
    let mut files = Vec::new();
    for part in block.split("\n\n") {
        if part.trim().is_empty() {
            continue;
        }
        let caps = re
            .captures(part)
            .ok_or_else(|| BlearnError::no_match(part, FILE_TEMPLATE))?;
        files.push(SubmittedFile {
            original: caps["original"].trim().to_string(),
            stored: caps["stored"].trim().to_string(),
        });
    }
    Ok(files)
}

/// Read and parse an attempt log from disk, recording its file name
pub fn parse_log_file(path: &Path) -> BlearnResult<SubmissionLog> {
    let text = std::fs::read_to_string(path)?;
    let name = path.file_name().and_then(|n| n.to_str());
    parse_log(&text, name, true)
}

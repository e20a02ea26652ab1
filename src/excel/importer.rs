//! Grading sheet importer - LMS export (.xls tab-separated text, or a workbook) → GradeSheet

use crate::error::{BlearnError, BlearnResult};
use crate::types::{Cell, GradeSheet, StudentRow};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const COL_LAST_NAME: &str = "Last Name";
pub const COL_FIRST_NAME: &str = "First Name";
pub const COL_USERNAME: &str = "Username";
pub const COL_STUDENT_ID: &str = "Student ID";
pub const COL_LAST_ACCESS: &str = "Last Access";
pub const COL_AVAILABILITY: &str = "Availability";
pub const COL_MARKING_NOTES: &str = "Marking Notes";
pub const COL_NOTES_FORMAT: &str = "Notes Format";
pub const COL_FEEDBACK: &str = "Feedback to Learner";
pub const COL_FEEDBACK_FORMAT: &str = "Feedback Format";

const REQUIRED_COLUMNS: [&str; 4] = [COL_LAST_NAME, COL_FIRST_NAME, COL_USERNAME, COL_STUDENT_ID];

const KNOWN_COLUMNS: [&str; 10] = [
    COL_LAST_NAME,
    COL_FIRST_NAME,
    COL_USERNAME,
    COL_STUDENT_ID,
    COL_LAST_ACCESS,
    COL_AVAILABILITY,
    COL_MARKING_NOTES,
    COL_NOTES_FORMAT,
    COL_FEEDBACK,
    COL_FEEDBACK_FORMAT,
];

/// Username marker of the LMS preview accounts
pub const DEFAULT_AUTO_DROP: &str = "previewuser";

const LAST_ACCESS_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d %B %Y %H:%M:%S",
];

/// Importer for the grading sheet the LMS exports for offline marking
pub struct GradeSheetImporter {
    path: PathBuf,
    drop_usernames: Vec<String>,
    auto_drop: Option<String>,
}

impl GradeSheetImporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            drop_usernames: Vec::new(),
            auto_drop: Some(DEFAULT_AUTO_DROP.to_string()),
        }
    }

    /// Usernames to remove before validation
    pub fn with_drop_usernames(mut self, usernames: Vec<String>) -> Self {
        self.drop_usernames = usernames;
        self
    }

    /// Remove every row whose username contains this marker (`None` disables)
    pub fn with_auto_drop(mut self, marker: Option<String>) -> Self {
        self.auto_drop = marker.filter(|m| !m.is_empty());
        self
    }

    pub fn import(&self) -> BlearnResult<GradeSheet> {
        if !self.path.is_file() {
            return Err(BlearnError::GradeSheet(format!(
                "Grading sheet not found: {}",
                self.path.display()
            )));
        }
        let (headers, records) = if self.is_workbook() {
            self.read_workbook()?
        } else {
            self.read_delimited()?
        };
        debug!(
            path = %self.path.display(),
            columns = headers.len(),
            rows = records.len(),
            "read grading sheet"
        );
        self.build_sheet(headers, records)
    }

    fn is_workbook(&self) -> bool {
        let ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        matches!(ext.as_deref(), Some("xlsx" | "xlsm" | "xlsb" | "ods"))
    }

    /// The LMS "xls" download is tab-separated text, normally UTF-16LE
    fn read_delimited(&self) -> BlearnResult<(Vec<String>, Vec<Vec<String>>)> {
        let bytes = std::fs::read(&self.path)?;
        let text = decode_text(&bytes)?;

        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = rdr.headers()?.iter().map(clean_header).collect();
        let mut records = Vec::new();
        for record in rdr.records() {
            let record = record?;
            records.push(record.iter().map(str::to_string).collect());
        }
        Ok((headers, records))
    }

    fn read_workbook(&self) -> BlearnResult<(Vec<String>, Vec<Vec<String>>)> {
        let mut workbook = open_workbook_auto(&self.path)
            .map_err(|e| BlearnError::GradeSheet(format!("Failed to open workbook: {}", e)))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| BlearnError::GradeSheet("Workbook has no worksheet".to_string()))?
            .map_err(|e| BlearnError::GradeSheet(format!("Failed to read worksheet: {}", e)))?;

        let mut rows = range.rows();
        let headers = rows
            .next()
            .map(|row| row.iter().map(|c| clean_header(&cell_to_string(c))).collect())
            .unwrap_or_default();
        let records = rows
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();
        Ok((headers, records))
    }

    fn build_sheet(
        &self,
        headers: Vec<String>,
        records: Vec<Vec<String>>,
    ) -> BlearnResult<GradeSheet> {
        for required in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == required) {
                return Err(BlearnError::GradeSheet(format!(
                    "Missing required column '{}' (available: {})",
                    required,
                    headers.join(", ")
                )));
            }
        }

        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();
        let extra_columns: Vec<String> = headers
            .iter()
            .filter(|h| !KNOWN_COLUMNS.contains(&h.as_str()))
            .cloned()
            .collect();

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            if record.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            let get = |col: &str| {
                positions
                    .get(col)
                    .and_then(|&i| record.get(i))
                    .cloned()
                    .unwrap_or_default()
            };
            let username = get(COL_USERNAME);
            let last_access = get(COL_LAST_ACCESS);
            rows.push(StudentRow {
                id: username.clone(),
                last_name: get(COL_LAST_NAME),
                first_name: get(COL_FIRST_NAME),
                username,
                student_id: get(COL_STUDENT_ID),
                last_access: parse_last_access(&last_access),
                availability: get(COL_AVAILABILITY),
                marking_notes: get(COL_MARKING_NOTES),
                notes_format: get(COL_NOTES_FORMAT),
                feedback: get(COL_FEEDBACK),
                feedback_format: get(COL_FEEDBACK_FORMAT),
                extra: extra_columns
                    .iter()
                    .map(|c| (c.clone(), get(c)))
                    .collect(),
            });
        }

        rows.retain(|r| !self.drop_usernames.contains(&r.username));

        if let Some(marker) = &self.auto_drop {
            let (dropped, kept): (Vec<_>, Vec<_>) =
                rows.into_iter().partition(|r| r.username.contains(marker.as_str()));
            if !dropped.is_empty() {
                let names: Vec<String> = dropped
                    .iter()
                    .map(|r| format!("{} ({}, {})", r.id, r.last_name, r.first_name))
                    .collect();
                info!(auto_drop = %marker, "dropping rows: {}", names.join("; "));
            }
            rows = kept;
        }

        let unexpected: Vec<String> = rows
            .iter()
            .filter(|r| format!("s{}", r.student_id) != r.username)
            .map(|r| {
                format!(
                    "  {}: Student ID {:?} does not match Username {:?}",
                    r.last_name, r.student_id, r.username
                )
            })
            .collect();
        if !unexpected.is_empty() {
            return Err(BlearnError::GradeSheet(format!(
                "Unexpected entries\n{}",
                unexpected.join("\n")
            )));
        }

        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(GradeSheet {
            extra_columns,
            rows,
        })
    }
}

/// Decode an LMS text export: UTF-16 (either byte order, with or without
/// BOM) or UTF-8.
pub fn decode_text(bytes: &[u8]) -> BlearnResult<String> {
    let utf16 = |body: &[u8], little: bool| -> BlearnResult<String> {
        if body.len() % 2 != 0 {
            return Err(BlearnError::GradeSheet(format!(
                "Invalid UTF-16 text: odd byte count ({})",
                body.len()
            )));
        }
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| {
                if little {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            })
            .collect();
        String::from_utf16(&units)
            .map_err(|e| BlearnError::GradeSheet(format!("Invalid UTF-16 text: {}", e)))
    };

    match bytes {
        [0xFF, 0xFE, body @ ..] => utf16(body, true),
        [0xFE, 0xFF, body @ ..] => utf16(body, false),
        [0xEF, 0xBB, 0xBF, body @ ..] => String::from_utf8(body.to_vec())
            .map_err(|e| BlearnError::GradeSheet(format!("Invalid UTF-8 text: {}", e))),
        [a, 0, ..] if *a != 0 => utf16(bytes, true),
        [0, b, ..] if *b != 0 => utf16(bytes, false),
        _ => String::from_utf8(bytes.to_vec())
            .map_err(|e| BlearnError::GradeSheet(format!("Invalid UTF-8 text: {}", e))),
    }
}

fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        other => other.to_string(),
    }
}

/// Excel serial date (1900 system) → wall time
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

/// `Last Access` as a datetime cell when it parses, raw text otherwise
pub fn parse_last_access(raw: &str) -> Cell {
    let raw = raw.trim();
    LAST_ACCESS_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map_or_else(|| Cell::text(raw), Cell::DateTime)
}

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;

//==============================================================================
// Cells and Tables (spreadsheet I/O)
//==============================================================================

/// A single spreadsheet cell value
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    DateTime(NaiveDateTime),
    /// Excel formula including the leading `=`
    Formula(String),
}

impl Cell {
    /// Text cell, or `Empty` when the text is empty
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) | Cell::Formula(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// A rectangular table with a named index column, written as one worksheet
#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    pub index_name: String,
    pub columns: Vec<String>,
    /// `(index value, cells)`; each row has one cell per column
    pub rows: Vec<(String, Vec<Cell>)>,
}

impl SheetTable {
    pub fn new(index_name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            index_name: index_name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, index: impl Into<String>, cells: Vec<Cell>) {
        debug_assert_eq!(cells.len(), self.columns.len());
        self.rows.push((index.into(), cells));
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

//==============================================================================
// Submission Metadata
//==============================================================================

/// One file attached to a submission attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedFile {
    /// Name the student uploaded
    pub original: String,
    /// Name the LMS stored it under inside the bundle
    pub stored: String,
}

/// An attempt log, parsed from its text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionLog {
    pub id: String,
    pub name: String,
    pub assignment: String,
    pub submitted_at: DateTime<FixedOffset>,
    pub current_mark: String,
    pub submission_field: String,
    pub submission_comment: String,
    pub files: Vec<SubmittedFile>,
    /// File name of the log inside the bundle
    pub log: Option<String>,
}

impl SubmissionLog {
    pub fn stored_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.stored.clone()).collect()
    }

    /// Wall-clock submission time as shown by the LMS
    pub fn submitted_local(&self) -> NaiveDateTime {
        self.submitted_at.naive_local()
    }
}

/// Metadata carried by an attempt-log file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFilename {
    pub assignment: String,
    pub id: String,
    pub submitted_at: NaiveDateTime,
}

/// Attempt-log file name plus the submitted files found next to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilenameRecord {
    pub id: String,
    pub assignment: String,
    pub log: String,
    pub submitted_at: NaiveDateTime,
    pub submission: Vec<String>,
}

/// Which attempt survives when a student submitted more than once
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Keep {
    First,
    #[default]
    Last,
}

//==============================================================================
// Grading Sheet
//==============================================================================

/// One student row of the LMS grading sheet
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StudentRow {
    /// Row id, equal to the username
    pub id: String,
    pub last_name: String,
    pub first_name: String,
    pub username: String,
    pub student_id: String,
    /// Datetime when parseable, raw text otherwise
    pub last_access: Cell,
    pub availability: String,
    pub marking_notes: String,
    pub notes_format: String,
    pub feedback: String,
    pub feedback_format: String,
    /// Remaining columns in sheet order
    pub extra: Vec<(String, String)>,
}

impl StudentRow {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Parsed grading sheet
#[derive(Debug, Clone, Default, Serialize)]
pub struct GradeSheet {
    /// Names of the columns stored in [`StudentRow::extra`]
    pub extra_columns: Vec<String>,
    pub rows: Vec<StudentRow>,
}

impl GradeSheet {
    pub fn get(&self, id: &str) -> Option<&StudentRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

//==============================================================================
// Marking Template
//==============================================================================

/// One row of the marking template
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TemplateRow {
    pub id: String,
    pub last_name: String,
    pub full_name: String,
    pub datetime_lastaccess: Cell,
    pub datetime_log: Option<NaiveDateTime>,
    /// Folder relative to the project output root
    pub submission: Option<String>,
    pub current_mark: String,
    pub submission_field: String,
    pub submission_comment: String,
    pub extra: Vec<(String, String)>,
    pub marking_notes: String,
    pub feedback: String,
}

impl TemplateRow {
    /// True when nothing but the name columns carries a value
    pub fn is_empty_beyond_name(&self) -> bool {
        self.datetime_lastaccess.is_empty()
            && self.datetime_log.is_none()
            && self.submission.as_deref().map_or(true, str::is_empty)
            && self.current_mark.is_empty()
            && self.submission_field.is_empty()
            && self.submission_comment.is_empty()
            && self.extra.iter().all(|(_, v)| v.is_empty())
            && self.marking_notes.is_empty()
            && self.feedback.is_empty()
    }

    pub fn submission_dir(&self, root: &Path) -> Option<std::path::PathBuf> {
        self.submission.as_ref().map(|s| root.join(s))
    }
}

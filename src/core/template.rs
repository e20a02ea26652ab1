//! Marking-template rows: merging grading rows with attempt metadata

use crate::error::{BlearnError, BlearnResult};
use crate::types::{Cell, FilenameRecord, GradeSheet, SheetTable, SubmissionLog, TemplateRow};
use std::collections::HashMap;

/// Columns before the grading sheet's own columns
pub const LEADING_COLUMNS: [&str; 8] = [
    "Last Name",
    "full_name",
    "datetime_lastaccess",
    "datetime_log",
    "submission",
    "current_mark",
    "submission_field",
    "submission_comment",
];

/// Columns after the grading sheet's own columns
pub const TRAILING_COLUMNS: [&str; 2] = ["Marking Notes", "Feedback to Learner"];

/// Worksheet columns of the two datetime fields (the id index sits in column 0)
pub const DATETIME_GROUP: [u16; 2] = [3, 4];

/// Excel formula linking to `path` relative to the workbook's own folder.
///
/// `CELL("filename")` yields `C:\dir\[book.xlsx]sheet`; everything before the
/// `[` is the folder.
pub fn hyperlink_formula(path: &str) -> String {
    format!(
        "=HYPERLINK(LEFT(CELL(\"filename\",A1),FIND(\"[\",CELL(\"filename\",A1))-1)&\"{}\", \"link\")",
        path
    )
}

/// `template-{assignment}.xlsx`, lowercased with spaces as underscores
pub fn template_file_name(assignment: &str) -> String {
    format!("template-{}.xlsx", assignment.to_lowercase().replace(' ', "_"))
}

/// Fail when a submission belongs to a student missing from the grading sheet
pub fn check_known_students(sheet: &GradeSheet, logs: &[SubmissionLog]) -> BlearnResult<()> {
    let unknown: Vec<&str> = logs
        .iter()
        .filter(|l| sheet.get(&l.id).is_none())
        .map(|l| l.id.as_str())
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(BlearnError::Validation(format!(
            "Submissions from students missing in the grading sheet: {}",
            unknown.join(", ")
        )))
    }
}

/// One template row per grading row, with the kept attempt (if any) attached.
///
/// `folders` maps student id to the normalized folder, relative to the
/// project root. Rows come out sorted by last name, then full name.
pub fn merge_rows(
    sheet: &GradeSheet,
    logs: &[SubmissionLog],
    folders: &HashMap<String, String>,
) -> BlearnResult<Vec<TemplateRow>> {
    check_known_students(sheet, logs)?;
    let by_id: HashMap<&str, &SubmissionLog> = logs.iter().map(|l| (l.id.as_str(), l)).collect();

    let mut rows: Vec<TemplateRow> = sheet
        .rows
        .iter()
        .map(|student| {
            let log = by_id.get(student.id.as_str());
            TemplateRow {
                id: student.id.clone(),
                last_name: student.last_name.clone(),
                full_name: student.full_name(),
                datetime_lastaccess: student.last_access.clone(),
                datetime_log: log.map(|l| l.submitted_local()),
                submission: folders.get(&student.id).cloned(),
                current_mark: log.map(|l| l.current_mark.clone()).unwrap_or_default(),
                submission_field: log.map(|l| l.submission_field.clone()).unwrap_or_default(),
                submission_comment: log.map(|l| l.submission_comment.clone()).unwrap_or_default(),
                extra: student.extra.clone(),
                marking_notes: student.marking_notes.clone(),
                feedback: student.feedback.clone(),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        a.last_name
            .cmp(&b.last_name)
            .then_with(|| a.full_name.cmp(&b.full_name))
    });
    Ok(rows)
}

/// Lay the template rows out as a worksheet table
pub fn template_table(rows: &[TemplateRow], extra_columns: &[String]) -> SheetTable {
    let columns = LEADING_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(extra_columns.iter().cloned())
        .chain(TRAILING_COLUMNS.iter().map(|c| c.to_string()))
        .collect();
    let mut table = SheetTable::new("id", columns);

    for row in rows {
        let mut cells = vec![
            Cell::text(&row.last_name),
            Cell::text(&row.full_name),
            row.datetime_lastaccess.clone(),
            row.datetime_log.map_or(Cell::Empty, Cell::DateTime),
            row.submission
                .as_deref()
                .map_or(Cell::Empty, |p| Cell::Formula(hyperlink_formula(p))),
            Cell::text(&row.current_mark),
            Cell::text(&row.submission_field),
            Cell::text(&row.submission_comment),
        ];
        for name in extra_columns {
            let value = row
                .extra
                .iter()
                .find(|(col, _)| col == name)
                .map(|(_, v)| v.as_str())
                .unwrap_or_default();
            cells.push(Cell::text(value));
        }
        cells.push(Cell::text(&row.marking_notes));
        cells.push(Cell::text(&row.feedback));
        table.push_row(row.id.clone(), cells);
    }
    table
}

//==============================================================================
// Intermediate tables (written in verbose mode)
//==============================================================================

pub fn grades_table(sheet: &GradeSheet) -> SheetTable {
    let columns = [
        "Last Name",
        "First Name",
        "Username",
        "Student ID",
        "Last Access",
        "Availability",
    ]
    .iter()
    .map(|c| c.to_string())
    .chain(sheet.extra_columns.iter().cloned())
    .chain(
        ["Marking Notes", "Notes Format", "Feedback to Learner", "Feedback Format"]
            .iter()
            .map(|c| c.to_string()),
    )
    .collect();
    let mut table = SheetTable::new("id", columns);
    for row in &sheet.rows {
        let mut cells = vec![
            Cell::text(&row.last_name),
            Cell::text(&row.first_name),
            Cell::text(&row.username),
            Cell::text(&row.student_id),
            row.last_access.clone(),
            Cell::text(&row.availability),
        ];
        cells.extend(row.extra.iter().map(|(_, v)| Cell::text(v)));
        cells.extend([
            Cell::text(&row.marking_notes),
            Cell::text(&row.notes_format),
            Cell::text(&row.feedback),
            Cell::text(&row.feedback_format),
        ]);
        table.push_row(row.id.clone(), cells);
    }
    table
}

/// Attempt logs, optionally with the pack chosen for each student
pub fn logs_table(logs: &[SubmissionLog], packs: Option<&HashMap<String, String>>) -> SheetTable {
    let mut columns: Vec<String> = [
        "name",
        "assignment",
        "datetime",
        "current_mark",
        "submission_field",
        "submission_comment",
        "fnames_original",
        "fnames_blearn",
        "log",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    if packs.is_some() {
        columns.push("pack".to_string());
    }
    let mut table = SheetTable::new("id", columns);
    for log in logs {
        let originals: Vec<&str> = log.files.iter().map(|f| f.original.as_str()).collect();
        let mut cells = vec![
            Cell::text(&log.name),
            Cell::text(&log.assignment),
            Cell::DateTime(log.submitted_local()),
            Cell::text(&log.current_mark),
            Cell::text(&log.submission_field),
            Cell::text(&log.submission_comment),
            Cell::text(originals.join("\n")),
            Cell::text(log.stored_names().join("\n")),
            Cell::text(log.log.clone().unwrap_or_default()),
        ];
        if let Some(packs) = packs {
            cells.push(Cell::text(packs.get(&log.id).cloned().unwrap_or_default()));
        }
        table.push_row(log.id.clone(), cells);
    }
    table
}

pub fn files_table(records: &[FilenameRecord]) -> SheetTable {
    let columns = ["assignment", "log", "datetime", "submission"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let mut table = SheetTable::new("id", columns);
    for record in records {
        table.push_row(
            record.id.clone(),
            vec![
                Cell::text(&record.assignment),
                Cell::text(&record.log),
                Cell::DateTime(record.submitted_at),
                Cell::text(record.submission.join("\n")),
            ],
        );
    }
    table
}

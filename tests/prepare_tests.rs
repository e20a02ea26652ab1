//! End-to-end tests of `prepare_project` on generated LMS downloads

mod common;

use blearn::core::{prepare_project, PrepareOptions, CORRUPT_MARKER};
use blearn::excel::{MAX_CELL_CHARS, SHEET_NAME};
use blearn::types::Keep;
use calamine::{open_workbook, Data, Reader, Xlsx};
use common::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    sheet: PathBuf,
    bundle: PathBuf,
    out: PathBuf,
}

fn fixture(as_folder: bool) -> Fixture {
    let dir = TempDir::new().unwrap();
    write_project(dir.path());
    let input = dir.path().join("blearn-1_ini");
    let bundle = if as_folder {
        let folder = input.join("a");
        write_folder(&folder, &bundle_entries());
        folder
    } else {
        input.join("a.zip")
    };
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    Fixture {
        sheet: input.join("a.xls"),
        bundle,
        out,
        _dir: dir,
    }
}

fn run(fx: &Fixture, options: &PrepareOptions) -> blearn::core::PreparedProject {
    prepare_project(&fx.sheet, &fx.bundle, &fx.out, options).unwrap()
}

fn files_under(dir: &Path) -> Vec<String> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path.strip_prefix(dir).unwrap();
                found.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    found.sort();
    found
}

// ═══════════════════════════════════════════════════════════════════════════
// FOLDER LAYOUT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_prepare_keeps_last_attempt_per_student() {
    let fx = fixture(false);
    let project = run(&fx, &PrepareOptions::default());

    let s1 = files_under(&fx.out.join("submission_files").join("s1"));
    let stem = stem("s1", "2023-01-17-09-05-00");
    assert_eq!(s1, vec![format!("{stem}-generated/{stem}_essay.docx")]);
    assert_eq!(project.assignment, ASSIGNMENT);
}

#[test]
fn test_prepare_keep_first() {
    let fx = fixture(false);
    run(
        &fx,
        &PrepareOptions {
            keep: Keep::First,
            ..PrepareOptions::default()
        },
    );

    let s1 = files_under(&fx.out.join("submission_files").join("s1"));
    let stem = stem("s1", "2023-01-16-11-56-43");
    assert_eq!(s1, vec![format!("{stem}-generated/{stem}_essay.pdf")]);
}

#[test]
fn test_prepare_lone_zip_placeholder_and_corrupt() {
    let fx = fixture(false);
    let project = run(&fx, &PrepareOptions::default());
    let files = fx.out.join("submission_files");

    assert_eq!(files_under(&files.join("s2")), vec!["inner.txt".to_string()]);

    let stem3 = stem("s3", "2023-01-16-12-00-00");
    assert_eq!(
        files_under(&files.join("s3")),
        vec![format!(
            "{stem3}-generated/{stem3}-generated-missing_submission_s3.txt"
        )]
    );

    assert_eq!(files_under(&files.join("s4")), vec![CORRUPT_MARKER.to_string()]);
    assert_eq!(project.errors, 1);
}

#[test]
fn test_prepare_leaves_only_student_folders() {
    let fx = fixture(false);
    run(&fx, &PrepareOptions::default());

    let mut top: Vec<String> = fs::read_dir(fx.out.join("submission_files"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    top.sort();
    assert_eq!(top, vec!["s1", "s2", "s3", "s4"]);

    let mut root: Vec<String> = fs::read_dir(&fx.out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    root.sort();
    assert_eq!(root, vec!["submission_files", "template-essay_1.xlsx"]);
}

#[test]
fn test_prepare_folder_bundle_matches_zip_bundle() {
    let from_zip = fixture(false);
    let from_folder = fixture(true);
    let a = run(&from_zip, &PrepareOptions::default());
    let b = run(&from_folder, &PrepareOptions::default());

    assert_eq!(a.rows, b.rows);
    for id in ["s1", "s2", "s3", "s4"] {
        assert_eq!(
            files_under(&from_zip.out.join("submission_files").join(id)),
            files_under(&from_folder.out.join("submission_files").join(id)),
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TEMPLATE ROWS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_prepare_rows_sorted_and_empty_dropped() {
    let fx = fixture(false);
    let project = run(&fx, &PrepareOptions::default());

    let names: Vec<&str> = project.rows.iter().map(|r| r.full_name.as_str()).collect();
    // Noether has nothing to mark; the preview account is dropped on import
    assert_eq!(
        names,
        vec!["Charles Babbage", "Grace Hopper", "Ada Lovelace", "Alan Turing"]
    );
    let ada = &project.rows[2];
    assert_eq!(ada.submission.as_deref(), Some("submission_files/s1"));
    assert_eq!(ada.current_mark, "Needs Marking");
    assert_eq!(ada.submission_comment, "");
}

#[test]
fn test_prepare_keep_empty_and_row_filter() {
    let fx = fixture(false);
    let keep_all = PrepareOptions {
        drop_empty: false,
        ..PrepareOptions::default()
    };
    assert_eq!(run(&fx, &keep_all).rows.len(), 5);

    let fx = fixture(false);
    let only_s2 = PrepareOptions::default().with_row_filter(|r| r.id == "s2");
    let rows = run(&fx, &only_s2).rows;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "s2");
}

#[test]
fn test_prepare_template_workbook() {
    let fx = fixture(false);
    let project = run(&fx, &PrepareOptions::default());

    let mut workbook: Xlsx<_> = open_workbook(&project.template).unwrap();
    let range = workbook.worksheet_range(SHEET_NAME).unwrap();

    let header: Vec<String> = range
        .rows()
        .next()
        .unwrap()
        .iter()
        .map(|c| c.to_string())
        .collect();
    assert_eq!(
        header,
        vec![
            "id",
            "Last Name",
            "full_name",
            "datetime_lastaccess",
            "datetime_log",
            "submission",
            "current_mark",
            "submission_field",
            "submission_comment",
            "Grade <Numeric MaxPoints:100>",
            "Marking Notes",
            "Feedback to Learner",
        ]
    );
    assert_eq!(range.get((1, 0)), Some(&Data::String("s2".to_string())));
    assert!(matches!(range.get((1, 4)), Some(Data::DateTime(_))));

    let formulas = workbook.worksheet_formula(SHEET_NAME).unwrap();
    let link = formulas
        .rows()
        .flat_map(|r| r.iter())
        .find(|f| f.contains("submission_files/s2"))
        .cloned()
        .unwrap_or_default();
    assert!(link.starts_with("HYPERLINK(") || link.starts_with("=HYPERLINK("), "{link}");
}

#[test]
fn test_prepare_overlong_submission_field_is_truncated_in_template() {
    let fx = fixture(false);
    let long = "x".repeat(40_000);
    let entries: Vec<(String, Vec<u8>)> = bundle_entries()
        .into_iter()
        .map(|(name, bytes)| {
            if name.starts_with("Essay 1_s2_attempt") && name.ends_with(".txt") {
                let text = String::from_utf8(bytes).unwrap().replace(
                    "There is no student submission text data for this assignment.",
                    &long,
                );
                (name, text.into_bytes())
            } else {
                (name, bytes)
            }
        })
        .collect();
    write_zip(&fx.bundle, &entries);

    let project = run(&fx, &PrepareOptions::default());
    assert!(project.template.is_file());
    let s2 = project.rows.iter().find(|r| r.id == "s2").unwrap();
    assert_eq!(s2.submission_field.len(), 40_000);

    let mut workbook: Xlsx<_> = open_workbook(&project.template).unwrap();
    let range = workbook.worksheet_range(SHEET_NAME).unwrap();
    // s2 (Babbage) is the first row; submission_field is column 7
    match range.get((1, 7)) {
        Some(Data::String(s)) => assert_eq!(s.chars().count(), MAX_CELL_CHARS),
        other => panic!("unexpected cell: {other:?}"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FAILURES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_prepare_safe_mode_refuses_non_empty_output() {
    let fx = fixture(false);
    fs::write(fx.out.join("notes.txt"), "mine").unwrap();
    let err = prepare_project(&fx.sheet, &fx.bundle, &fx.out, &PrepareOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("Operation aborted"));
    assert!(!fx.out.join("submission_files").exists());
}

#[test]
fn test_prepare_unknown_student_fails() {
    let fx = fixture(false);
    let rows: Vec<_> = STUDENTS
        .iter()
        .filter(|s| s.2 != "s4")
        .copied()
        .collect();
    fs::write(&fx.sheet, sheet_utf16(&rows)).unwrap();

    let err = prepare_project(&fx.sheet, &fx.bundle, &fx.out, &PrepareOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("s4"), "{err}");
}

#[test]
fn test_prepare_two_assignments_fail() {
    let fx = fixture(false);
    let mut entries = bundle_entries();
    let stem = "Essay 2_s5_attempt_2023-01-16-10-00-00";
    entries.push((
        format!("{stem}.txt"),
        log_text("s5", "Emmy Noether", "2023-01-16-10-00-00", &[])
            .replace("Assignment: Essay 1", "Assignment: Essay 2")
            .into_bytes(),
    ));
    write_zip(&fx.bundle, &entries);

    let err = prepare_project(&fx.sheet, &fx.bundle, &fx.out, &PrepareOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("more than one assignment"), "{err}");
}

#[test]
fn test_prepare_verbose_dumps() {
    let fx = fixture(false);
    run(
        &fx,
        &PrepareOptions {
            verbose: true,
            ..PrepareOptions::default()
        },
    );
    for name in [
        "debug-df_grades_tpl.xlsx",
        "debug-df_logs.xlsx",
        "debug-df_logs_pack.xlsx",
        "debug-df_files.xlsx",
    ] {
        assert!(fx.out.join(name).is_file(), "missing {name}");
    }
}

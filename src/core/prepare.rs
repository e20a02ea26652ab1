//! `prepare_project`: grading sheet + submission bundle → marking project

use super::template::{
    check_known_students, files_table, grades_table, logs_table, merge_rows, template_file_name,
    template_table, DATETIME_GROUP,
};
use crate::bundle::pack::{extract_all, pack_files, write_missing_placeholder, GENERATED_SUFFIX};
use crate::bundle::{metadata_from_filenames, metadata_from_logs, SubmissionBundle};
use crate::error::{BlearnError, BlearnResult};
use crate::excel::{write_table, ExportOptions, GradeSheetImporter, DEFAULT_AUTO_DROP};
use crate::types::{GradeSheet, Keep, SheetTable, SubmissionLog, TemplateRow};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Folder (under the output root) holding one sub-folder per student
pub const SUBMISSION_DIR: &str = "submission_files";

/// Written in place of the content of a pack that could not be extracted
pub const CORRUPT_MARKER: &str = "corrupt_submission.txt";

pub type RowFilter = Box<dyn Fn(&TemplateRow) -> bool>;

pub struct PrepareOptions {
    pub keep: Keep,
    pub drop_usernames: Vec<String>,
    /// Rows whose username contains this marker are dropped (`None` disables)
    pub auto_drop: Option<String>,
    pub drop_empty: bool,
    /// Applied after `drop_empty`; rows for which it returns false are removed
    pub row_filter: Option<RowFilter>,
    /// Refuse to write into a non-empty output root
    pub safe: bool,
    /// Write the intermediate tables as `debug-*.xlsx` next to the template
    pub verbose: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            keep: Keep::Last,
            drop_usernames: Vec::new(),
            auto_drop: Some(DEFAULT_AUTO_DROP.to_string()),
            drop_empty: true,
            row_filter: None,
            safe: true,
            verbose: false,
        }
    }
}

impl PrepareOptions {
    pub fn with_row_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&TemplateRow) -> bool + 'static,
    {
        self.row_filter = Some(Box::new(filter));
        self
    }
}

impl fmt::Debug for PrepareOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrepareOptions")
            .field("keep", &self.keep)
            .field("drop_usernames", &self.drop_usernames)
            .field("auto_drop", &self.auto_drop)
            .field("drop_empty", &self.drop_empty)
            .field("row_filter", &self.row_filter.is_some())
            .field("safe", &self.safe)
            .field("verbose", &self.verbose)
            .finish()
    }
}

/// Result of a successful [`prepare_project`] run
#[derive(Debug, Clone)]
pub struct PreparedProject {
    pub template: PathBuf,
    pub assignment: String,
    pub rows: Vec<TemplateRow>,
    /// Packs that could not be extracted
    pub errors: usize,
}

/// Build the marking project under `root`.
///
/// After a successful run `root` holds `submission_files/{id}/` for every
/// student with a kept attempt, plus `template-{assignment}.xlsx` listing every
/// remaining grading row with a link to that folder.
pub fn prepare_project(
    sheet_path: &Path,
    bundle_path: &Path,
    root: &Path,
    options: &PrepareOptions,
) -> BlearnResult<PreparedProject> {
    validate_inputs(sheet_path, bundle_path, root, options.safe)?;
    info!(sheet = %sheet_path.display(), bundle = %bundle_path.display(), root = %root.display(), "preparing project");

    let sheet = read_grade_sheet(sheet_path, options)?;
    info!(students = sheet.len(), "read grading sheet");
    if options.verbose {
        dump(root, "debug-df_grades_tpl.xlsx", &grades_table(&sheet))?;
    }

    let files_dir = root.join(SUBMISSION_DIR);
    if files_dir.exists() {
        fs::remove_dir_all(&files_dir)?;
    }
    let bundle = SubmissionBundle::open(bundle_path)?;
    let unpacked = bundle.unpack_into(&files_dir)?;
    debug!(entries = unpacked, dir = %files_dir.display(), "unpacked bundle");

    let folder = SubmissionBundle::Folder(files_dir.clone());
    let logs = metadata_from_logs(&folder)?;
    let assignment = single_assignment(&logs)?;
    info!(attempts = logs.len(), assignment = %assignment, "parsed attempt logs");
    if options.verbose {
        dump(root, "debug-df_logs.xlsx", &logs_table(&logs, None))?;
    }
    check_known_students(&sheet, &logs)?;

    let logs = drop_duplicate_attempts(&files_dir, logs, options.keep)?;
    let packs = pack_attempts(&files_dir, &logs)?;
    if options.verbose {
        dump(root, "debug-df_logs_pack.xlsx", &logs_table(&logs, Some(&packs)))?;
    }

    verify_packs(&folder, &logs, &packs, root, options.verbose)?;

    let (folders, errors) = unpack_student_folders(&files_dir, &logs, &packs)?;
    let rows = select_rows(merge_rows(&sheet, &logs, &folders)?, options);

    let template = root.join(template_file_name(&assignment));
    write_table(
        &template,
        &template_table(&rows, &sheet.extra_columns),
        ExportOptions {
            group_columns: DATETIME_GROUP.to_vec(),
            ..ExportOptions::default()
        },
    )?;
    info!(template = %template.display(), rows = rows.len(), "wrote marking template");

    if errors > 0 {
        warn!(errors, "some submissions could not be extracted; check the `{CORRUPT_MARKER}` files");
    }

    Ok(PreparedProject {
        template,
        assignment,
        rows,
        errors,
    })
}

fn validate_inputs(sheet: &Path, bundle: &Path, root: &Path, safe: bool) -> BlearnResult<()> {
    for (what, path) in [("Grading sheet", sheet), ("Submission bundle", bundle)] {
        if !path.exists() {
            return Err(BlearnError::Validation(format!(
                "{} not found: {}",
                what,
                path.display()
            )));
        }
    }
    if !root.is_dir() {
        return Err(BlearnError::Validation(format!(
            "Project output path is not a folder: {}",
            root.display()
        )));
    }
    if safe && fs::read_dir(root)?.next().is_some() {
        return Err(BlearnError::Validation(
            "Project output path is not empty. Operation aborted.".to_string(),
        ));
    }
    Ok(())
}

fn single_assignment(logs: &[SubmissionLog]) -> BlearnResult<String> {
    let names: BTreeSet<&str> = logs.iter().map(|l| l.assignment.as_str()).collect();
    match names.len() {
        1 => Ok(names.into_iter().next().map(str::to_string).unwrap_or_default()),
        0 => Err(BlearnError::Validation(
            "No attempt logs found in the submission bundle".to_string(),
        )),
        _ => Err(BlearnError::Validation(format!(
            "Data seems to host more than one assignment: {:?}",
            names
        ))),
    }
}

fn log_name(log: &SubmissionLog) -> BlearnResult<&str> {
    log.log
        .as_deref()
        .ok_or_else(|| BlearnError::Internal(format!("attempt of `{}` has no log file name", log.id)))
}

fn log_stem(name: &str) -> &str {
    name.strip_suffix(".txt").unwrap_or(name)
}

/// Keep one attempt per student and delete the files of the others.
///
/// Attempts are ordered by log file name, which embeds the attempt time.
fn drop_duplicate_attempts(
    dir: &Path,
    mut logs: Vec<SubmissionLog>,
    keep: Keep,
) -> BlearnResult<Vec<SubmissionLog>> {
    logs.sort_by(|a, b| a.log.cmp(&b.log));

    let mut kept: HashMap<String, SubmissionLog> = HashMap::new();
    let mut discarded = Vec::new();
    for log in logs {
        if keep == Keep::First && kept.contains_key(&log.id) {
            discarded.push(log);
        } else if let Some(previous) = kept.insert(log.id.clone(), log) {
            discarded.push(previous);
        }
    }

    for log in &discarded {
        let name = log_name(log)?;
        info!(id = %log.id, log = %name, "discarding attempt");
        for file in log.stored_names().iter().map(String::as_str).chain([name]) {
            remove_if_present(&dir.join(file))?;
        }
    }

    let mut kept: Vec<SubmissionLog> = kept.into_values().collect();
    kept.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(kept)
}

fn remove_if_present(path: &Path) -> BlearnResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(file = %path.display(), "listed file is missing from the bundle");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Reduce every attempt to a single zip. Returns student id → pack file name.
fn pack_attempts(dir: &Path, logs: &[SubmissionLog]) -> BlearnResult<HashMap<String, String>> {
    let mut packs = HashMap::with_capacity(logs.len());
    for log in logs {
        let stem = log_stem(log_name(log)?);
        let mut files = log.stored_names();

        let lone_zip = files.len() == 1 && files[0].to_ascii_lowercase().ends_with(".zip");
        let pack = if lone_zip {
            files.remove(0)
        } else {
            if files.is_empty() {
                warn!(id = %log.id, "attempt has no file; packing a placeholder");
                files.push(write_missing_placeholder(dir, stem, &log.id)?);
            }
            let pack_name = format!("{stem}{GENERATED_SUFFIX}");
            pack_files(dir, &pack_name, &files)?;
            format!("{pack_name}.zip")
        };
        debug!(id = %log.id, pack = %pack, "attempt packed");
        packs.insert(log.id.clone(), pack);
    }
    Ok(packs)
}

/// Re-read the folder by file name and check it agrees with the packed logs
fn verify_packs(
    folder: &SubmissionBundle,
    logs: &[SubmissionLog],
    packs: &HashMap<String, String>,
    root: &Path,
    verbose: bool,
) -> BlearnResult<()> {
    let records = metadata_from_filenames(folder, true)?;
    if verbose {
        dump(root, "debug-df_files.xlsx", &files_table(&records))?;
    }

    if records.len() != logs.len() {
        return Err(BlearnError::Internal(format!(
            "{} attempt logs on disk, {} expected",
            records.len(),
            logs.len()
        )));
    }
    let by_id: HashMap<&str, &SubmissionLog> = logs.iter().map(|l| (l.id.as_str(), l)).collect();
    for record in &records {
        let log = by_id.get(record.id.as_str()).ok_or_else(|| {
            BlearnError::Internal(format!("attempt log of unknown student `{}`", record.id))
        })?;
        let expected = packs.get(&record.id).map(String::as_str);
        if record.submission.len() != 1 || expected != Some(record.submission[0].as_str()) {
            return Err(BlearnError::Internal(format!(
                "`{}` should sit next to exactly `{}`, found {:?}",
                record.log,
                expected.unwrap_or_default(),
                record.submission
            )));
        }
        if log.log.as_deref() != Some(record.log.as_str()) || log.assignment != record.assignment {
            return Err(BlearnError::Internal(format!(
                "log file name `{}` disagrees with its content",
                record.log
            )));
        }
        if log.submitted_local() != record.submitted_at {
            warn!(
                id = %record.id,
                from_log = %log.submitted_local(),
                from_name = %record.submitted_at,
                "submission time differs between log text and file name"
            );
        }
    }
    Ok(())
}

/// Extract each pack into `{dir}/{id}`, removing the pack and its log.
///
/// Returns id → folder relative to the output root, and the number of packs
/// that could not be extracted.
fn unpack_student_folders(
    dir: &Path,
    logs: &[SubmissionLog],
    packs: &HashMap<String, String>,
) -> BlearnResult<(HashMap<String, String>, usize)> {
    let mut folders = HashMap::with_capacity(logs.len());
    let mut errors = 0;
    for log in logs {
        let pack = packs
            .get(&log.id)
            .ok_or_else(|| BlearnError::Internal(format!("no pack for `{}`", log.id)))?;
        fs::remove_file(dir.join(log_name(log)?))?;

        let target = dir.join(&log.id);
        fs::create_dir_all(&target)?;
        match extract_all(&dir.join(pack), &target) {
            Ok(_) => {}
            Err(BlearnError::Zip(e)) => {
                warn!(id = %log.id, pack = %pack, error = %e, "corrupt submission archive");
                fs::write(target.join(CORRUPT_MARKER), "")?;
                errors += 1;
            }
            Err(e) => return Err(e),
        }
        fs::remove_file(dir.join(pack))?;
        folders.insert(log.id.clone(), format!("{SUBMISSION_DIR}/{}", log.id));
    }
    Ok((folders, errors))
}

fn select_rows(mut rows: Vec<TemplateRow>, options: &PrepareOptions) -> Vec<TemplateRow> {
    if options.drop_empty {
        let before = rows.len();
        rows.retain(|r| !r.is_empty_beyond_name());
        debug!(dropped = before - rows.len(), "dropped empty rows");
    }
    if let Some(filter) = &options.row_filter {
        rows.retain(|r| filter(r));
    }
    rows
}

fn dump(root: &Path, name: &str, table: &SheetTable) -> BlearnResult<()> {
    let path = root.join(name);
    write_table(&path, table, ExportOptions::default())?;
    debug!(path = %path.display(), "wrote intermediate table");
    Ok(())
}

/// Load the grading sheet the way [`prepare_project`] does
pub fn read_grade_sheet(path: &Path, options: &PrepareOptions) -> BlearnResult<GradeSheet> {
    GradeSheetImporter::new(path)
        .with_drop_usernames(options.drop_usernames.clone())
        .with_auto_drop(options.auto_drop.clone())
        .import()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::log::NO_FILES;
    use crate::parser::parse_log;
    use tempfile::TempDir;

    fn log_text(id: &str, day: u32, files: &[&str]) -> String {
        let mut text = format!(
            "Name: Student {id} ({id})\n\
             Assignment: Essay 1\n\
             Date Submitted: Monday, {day} January 2023 11:56:43 o'clock GMT\n\
             Current Mark: Needs Marking\n\
             \n\
             Submission Field:\n\
             There is no student submission text data for this assignment.\n\
             \n\
             Comments:\n\
             There are no student comments for this assignment.\n\
             \n\
             Files:\n"
        );
        if files.is_empty() {
            text.push_str(NO_FILES);
        }
        for stored in files {
            text.push_str(&format!("\tOriginal filename: orig-{stored}\n\tFilename: {stored}\n\n"));
        }
        text
    }

    /// Write one attempt into `dir` and return its parsed log
    fn attempt(dir: &Path, id: &str, day: u32, suffixes: &[&str]) -> SubmissionLog {
        let stem = format!("Essay 1_{id}_attempt_2023-01-{day:02}-11-56-43");
        let stored: Vec<String> = suffixes.iter().map(|s| format!("{stem}_{s}")).collect();
        for name in &stored {
            fs::write(dir.join(name), format!("content of {name}")).unwrap();
        }
        let refs: Vec<&str> = stored.iter().map(String::as_str).collect();
        let text = log_text(id, day, &refs);
        let log_name = format!("{stem}.txt");
        fs::write(dir.join(&log_name), &text).unwrap();
        parse_log(&text, Some(&log_name), true).unwrap()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // INPUT VALIDATION
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_validate_inputs_requires_both_files() {
        let dir = TempDir::new().unwrap();
        let sheet = dir.path().join("a.xls");
        fs::write(&sheet, "").unwrap();
        let out = TempDir::new().unwrap();
        let err = validate_inputs(&sheet, &dir.path().join("a.zip"), out.path(), true).unwrap_err();
        assert!(err.to_string().contains("Submission bundle not found"));
    }

    #[test]
    fn test_validate_inputs_safe_mode_rejects_non_empty_root() {
        let dir = TempDir::new().unwrap();
        let sheet = dir.path().join("a.xls");
        fs::write(&sheet, "").unwrap();
        let err = validate_inputs(&sheet, &sheet, dir.path(), true).unwrap_err();
        assert!(err
            .to_string()
            .contains("Project output path is not empty. Operation aborted."));
        assert!(validate_inputs(&sheet, &sheet, dir.path(), false).is_ok());
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ATTEMPTS AND PACKS
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_single_assignment() {
        let dir = TempDir::new().unwrap();
        let mut logs = vec![attempt(dir.path(), "s1", 16, &["a.pdf"])];
        assert_eq!(single_assignment(&logs).unwrap(), "Essay 1");

        logs[0].assignment = "Essay 2".to_string();
        logs.push(attempt(dir.path(), "s2", 16, &["a.pdf"]));
        let err = single_assignment(&logs).unwrap_err();
        assert!(err.to_string().contains("more than one assignment"));
        assert!(single_assignment(&[]).is_err());
    }

    #[test]
    fn test_drop_duplicate_attempts_keeps_last() {
        let dir = TempDir::new().unwrap();
        let early = attempt(dir.path(), "s1", 16, &["a.pdf"]);
        let late = attempt(dir.path(), "s1", 17, &["b.pdf"]);

        let kept = drop_duplicate_attempts(dir.path(), vec![late.clone(), early.clone()], Keep::Last)
            .unwrap();
        assert_eq!(kept, vec![late.clone()]);
        assert!(!dir.path().join(early.log.as_ref().unwrap()).exists());
        assert!(!dir.path().join(&early.files[0].stored).exists());
        assert!(dir.path().join(&late.files[0].stored).exists());
    }

    #[test]
    fn test_drop_duplicate_attempts_keeps_first() {
        let dir = TempDir::new().unwrap();
        let early = attempt(dir.path(), "s1", 16, &["a.pdf"]);
        let late = attempt(dir.path(), "s1", 17, &["b.pdf"]);
        let other = attempt(dir.path(), "s2", 17, &["c.pdf"]);

        let kept = drop_duplicate_attempts(
            dir.path(),
            vec![other.clone(), late.clone(), early.clone()],
            Keep::First,
        )
        .unwrap();
        assert_eq!(kept, vec![early, other]);
        assert!(!dir.path().join(late.log.as_ref().unwrap()).exists());
    }

    #[test]
    fn test_pack_attempts_lone_zip_is_its_own_pack() {
        let dir = TempDir::new().unwrap();
        let log = attempt(dir.path(), "s1", 16, &["work.zip"]);
        let packs = pack_attempts(dir.path(), std::slice::from_ref(&log)).unwrap();
        assert_eq!(packs["s1"], log.files[0].stored);
        assert!(dir.path().join(&packs["s1"]).exists());
    }

    #[test]
    fn test_pack_attempts_generates_zip_and_placeholder() {
        let dir = TempDir::new().unwrap();
        let several = attempt(dir.path(), "s1", 16, &["a.pdf", "b.docx"]);
        let none = attempt(dir.path(), "s2", 16, &[]);

        let packs = pack_attempts(dir.path(), &[several.clone(), none]).unwrap();
        assert_eq!(packs["s1"], "Essay 1_s1_attempt_2023-01-16-11-56-43-generated.zip");
        assert_eq!(packs["s2"], "Essay 1_s2_attempt_2023-01-16-11-56-43-generated.zip");
        assert!(!dir.path().join(&several.files[0].stored).exists());
        assert!(dir.path().join(&packs["s2"]).exists());

        // the folder now satisfies the strict file-name scan
        let folder = SubmissionBundle::Folder(dir.path().to_path_buf());
        let logs = metadata_from_logs(&folder).unwrap();
        verify_packs(&folder, &logs, &packs, dir.path(), false).unwrap();
    }

    #[test]
    fn test_unpack_student_folders_marks_corrupt_pack() {
        let dir = TempDir::new().unwrap();
        let good = attempt(dir.path(), "s1", 16, &["a.pdf"]);
        let bad = attempt(dir.path(), "s2", 16, &["broken.zip"]);
        let logs = vec![good, bad];
        let packs = pack_attempts(dir.path(), &logs).unwrap();

        let (folders, errors) = unpack_student_folders(dir.path(), &logs, &packs).unwrap();
        assert_eq!(errors, 1);
        assert_eq!(folders["s1"], "submission_files/s1");
        assert!(dir.path().join("s2").join(CORRUPT_MARKER).exists());
        let extracted = dir
            .path()
            .join("s1")
            .join("Essay 1_s1_attempt_2023-01-16-11-56-43-generated")
            .join("Essay 1_s1_attempt_2023-01-16-11-56-43_a.pdf");
        assert!(extracted.is_file());

        let left: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".zip") || n.ends_with(".txt"))
            .collect();
        assert!(left.is_empty(), "leftover files: {left:?}");
    }

    #[test]
    fn test_select_rows_drop_empty_then_filter() {
        let empty = TemplateRow {
            id: "s1".to_string(),
            full_name: "A B".to_string(),
            ..TemplateRow::default()
        };
        let marked = TemplateRow {
            id: "s2".to_string(),
            current_mark: "Needs Marking".to_string(),
            ..TemplateRow::default()
        };
        let other = TemplateRow {
            id: "s3".to_string(),
            feedback: "ok".to_string(),
            ..TemplateRow::default()
        };

        let options = PrepareOptions::default().with_row_filter(|r| r.id != "s3");
        let rows = select_rows(vec![empty.clone(), marked.clone(), other], &options);
        assert_eq!(rows, vec![marked]);

        let keep_all = PrepareOptions {
            drop_empty: false,
            ..PrepareOptions::default()
        };
        assert_eq!(select_rows(vec![empty.clone()], &keep_all), vec![empty]);
    }
}

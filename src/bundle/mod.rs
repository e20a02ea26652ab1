//! Submission bundles: the zip archive the LMS hands out, or its extracted folder

pub mod pack;

use crate::error::{BlearnError, BlearnResult};
use crate::parser::{parse_log, similar_files, LogNameParser};
use crate::types::{FilenameRecord, SubmissionLog};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use zip::ZipArchive;

/// Which entries of a bundle to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSelection {
    /// Every file
    All,
    /// Attempt logs only
    Logs,
    /// Everything that is not an attempt log
    Others,
}

/// A submission bundle on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionBundle {
    Archive(PathBuf),
    Folder(PathBuf),
}

impl SubmissionBundle {
    /// Open a bundle; a path ending in `.zip` is read as an archive,
    /// anything else as an extracted folder.
    pub fn open<P: AsRef<Path>>(path: P) -> BlearnResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(BlearnError::Validation(format!(
                "Submission bundle not found: {}",
                path.display()
            )));
        }
        let is_zip = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".zip"));
        if is_zip {
            Ok(SubmissionBundle::Archive(path))
        } else if path.is_dir() {
            Ok(SubmissionBundle::Folder(path))
        } else {
            Err(BlearnError::Validation(format!(
                "Not a zip archive or folder: {}",
                path.display()
            )))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            SubmissionBundle::Archive(p) | SubmissionBundle::Folder(p) => p,
        }
    }

    /// List file names. Folders are listed sorted by name; archives keep
    /// their entry order.
    pub fn file_names(&self, selection: FileSelection) -> BlearnResult<Vec<String>> {
        let names = match self {
            SubmissionBundle::Archive(path) => {
                let mut archive = ZipArchive::new(File::open(path)?)?;
                let mut names = Vec::with_capacity(archive.len());
                for i in 0..archive.len() {
                    let entry = archive.by_index(i)?;
                    if entry.is_file() {
                        names.push(entry.name().to_string());
                    }
                }
                names
            }
            SubmissionBundle::Folder(path) => {
                let mut names = Vec::new();
                for entry in fs::read_dir(path)? {
                    let entry = entry?;
                    if entry.file_type()?.is_file() {
                        names.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                names.sort();
                names
            }
        };

        Ok(match selection {
            FileSelection::All => names,
            FileSelection::Logs => {
                let parser = LogNameParser::new()?;
                names.into_iter().filter(|n| parser.is_log(n)).collect()
            }
            FileSelection::Others => {
                let parser = LogNameParser::new()?;
                names.into_iter().filter(|n| !parser.is_log(n)).collect()
            }
        })
    }

    /// Read one entry as text (invalid UTF-8 is replaced)
    pub fn read_to_string(&self, name: &str) -> BlearnResult<String> {
        let mut bytes = Vec::new();
        match self {
            SubmissionBundle::Archive(path) => {
                let mut archive = ZipArchive::new(File::open(path)?)?;
                archive.by_name(name)?.read_to_end(&mut bytes)?;
            }
            SubmissionBundle::Folder(path) => {
                bytes = fs::read(path.join(name))?;
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Copy or extract every file of the bundle into `dest`
    pub fn unpack_into(&self, dest: &Path) -> BlearnResult<usize> {
        fs::create_dir_all(dest)?;
        match self {
            SubmissionBundle::Archive(path) => pack::extract_all(path, dest),
            SubmissionBundle::Folder(path) => {
                let names = self.file_names(FileSelection::All)?;
                for name in &names {
                    fs::copy(path.join(name), dest.join(name))?;
                }
                Ok(names.len())
            }
        }
    }
}

/// Parse every attempt log of the bundle, sorted by student id.
pub fn metadata_from_logs(bundle: &SubmissionBundle) -> BlearnResult<Vec<SubmissionLog>> {
    let mut logs = Vec::new();
    for name in bundle.file_names(FileSelection::Logs)? {
        let text = bundle.read_to_string(&name)?;
        logs.push(parse_log(&text, Some(&name), true)?);
    }
    logs.sort_by(|a, b| a.id.cmp(&b.id));
    debug!(count = logs.len(), bundle = %bundle.path().display(), "parsed attempt logs");
    Ok(logs)
}

/// Collect attempt metadata from file names alone.
///
/// Each log is paired with the files sharing its stem. A log without such
/// files is reported and kept, or rejected when `strict` is set.
pub fn metadata_from_filenames(
    bundle: &SubmissionBundle,
    strict: bool,
) -> BlearnResult<Vec<FilenameRecord>> {
    let logs = bundle.file_names(FileSelection::Logs)?;
    let others = bundle.file_names(FileSelection::Others)?;
    let parser = LogNameParser::new()?;

    let mut records = Vec::with_capacity(logs.len());
    for log in logs {
        let Some(meta) = parser.parse(&log) else {
            continue;
        };
        let submission = similar_files(&log, &others);
        if submission.is_empty() {
            let msg = format!("Could not find similar file(s) for `{log}`");
            if strict {
                return Err(BlearnError::Validation(msg));
            }
            error!("{msg}");
        }
        records.push(FilenameRecord {
            id: meta.id,
            assignment: meta.assignment,
            log,
            submitted_at: meta.submitted_at,
            submission,
        });
    }
    records.sort_by(|a, b| a.id.cmp(&b.id));

    let assignments: BTreeSet<&str> = records.iter().map(|r| r.assignment.as_str()).collect();
    if assignments.len() > 1 {
        return Err(BlearnError::Validation(format!(
            "More than one candidate for assignment name: {:?}",
            assignments
        )));
    }
    Ok(records)
}

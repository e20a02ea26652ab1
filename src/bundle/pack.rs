//! Packing a student's attempt into one zip, and extracting it again

use crate::error::{BlearnError, BlearnResult};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Suffix of packs built by this tool (without the extension)
pub const GENERATED_SUFFIX: &str = "-generated";

pub const PLACEHOLDER_TEXT: &str = "File automatically generated.";

/// Move `files` (names relative to `dir`) into `dir/{pack_name}.zip`.
///
/// Inside the archive the files sit under a top-level `pack_name/` folder.
/// The source files are removed once the archive is complete.
pub fn pack_files(dir: &Path, pack_name: &str, files: &[String]) -> BlearnResult<PathBuf> {
    let target = dir.join(format!("{pack_name}.zip"));
    if target.exists() {
        return Err(BlearnError::Validation(format!(
            "Pack already exists: {}",
            target.display()
        )));
    }
    for name in files {
        if !dir.join(name).is_file() {
            return Err(BlearnError::Validation(format!(
                "Submission file not found: {}",
                dir.join(name).display()
            )));
        }
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(File::create(&target)?);
    zip.add_directory(format!("{pack_name}/"), options)?;
    for name in files {
        zip.start_file(format!("{pack_name}/{name}"), options)?;
        let mut source = File::open(dir.join(name))?;
        io::copy(&mut source, &mut zip)?;
    }
    zip.finish()?;

    for name in files {
        fs::remove_file(dir.join(name))?;
    }
    debug!(pack = %target.display(), files = files.len(), "packed submission");
    Ok(target)
}

/// Extract every entry of `archive` under `dest`.
///
/// Entries whose path would land outside `dest` make the whole extraction fail.
pub fn extract_all(archive: &Path, dest: &Path) -> BlearnResult<usize> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let count = zip.len();
    zip.extract(dest)?;
    debug!(archive = %archive.display(), dest = %dest.display(), entries = count, "extracted");
    Ok(count)
}

/// Write the stand-in file used when an attempt came without any file.
/// Returns its file name.
pub fn write_missing_placeholder(dir: &Path, stem: &str, id: &str) -> BlearnResult<String> {
    let name = format!("{stem}{GENERATED_SUFFIX}-missing_submission_{id}.txt");
    fs::write(dir.join(&name), PLACEHOLDER_TEXT)?;
    Ok(name)
}

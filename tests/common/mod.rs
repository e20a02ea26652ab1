//! Builders for LMS downloads used across the integration tests

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const ASSIGNMENT: &str = "Essay 1";

pub const SHEET_HEADER: &str = "Last Name\tFirst Name\tUsername\tStudent ID\tLast Access\tAvailability\tGrade <Numeric MaxPoints:100>\tMarking Notes\tNotes Format\tFeedback to Learner\tFeedback Format";

/// `(last, first, username, student id, last access)`
pub const STUDENTS: [(&str, &str, &str, &str, &str); 6] = [
    ("Lovelace", "Ada", "s1", "1", "2023-01-16 10:00:00"),
    ("Babbage", "Charles", "s2", "2", "2023-01-15 09:30:00"),
    ("Hopper", "Grace", "s3", "3", "2023-01-14 08:00:00"),
    ("Turing", "Alan", "s4", "4", "2023-01-13 12:00:00"),
    ("Noether", "Emmy", "s5", "5", ""),
    ("Preview", "User", "s6_previewuser", "6", ""),
];

/// Tab-separated sheet as the LMS writes it: UTF-16LE with BOM, CRLF
pub fn sheet_utf16(rows: &[(&str, &str, &str, &str, &str)]) -> Vec<u8> {
    let mut text = String::from(SHEET_HEADER);
    text.push_str("\r\n");
    for (last, first, user, sid, access) in rows {
        text.push_str(&format!(
            "{last}\t{first}\t{user}\t{sid}\t{access}\tYes\t\t\tSMART_TEXT\t\tSMART_TEXT\r\n"
        ));
    }
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

pub fn stem(id: &str, stamp: &str) -> String {
    format!("{ASSIGNMENT}_{id}_attempt_{stamp}")
}

/// Log text for an attempt; `stamp` is `YYYY-MM-DD-HH-MM-SS`
pub fn log_text(id: &str, name: &str, stamp: &str, files: &[(&str, String)]) -> String {
    let parts: Vec<&str> = stamp.split('-').collect();
    let month = match parts[1] {
        "01" => "January",
        "02" => "February",
        _ => "March",
    };
    let mut text = format!(
        "Name: {name} ({id})\n\
         Assignment: {ASSIGNMENT}\n\
         Date Submitted: Monday, {} {} {} {}:{}:{} o'clock GMT\n\
         Current Mark: Needs Marking\n\
         \n\
         Submission Field:\n\
         There is no student submission text data for this assignment.\n\
         \n\
         Comments:\n\
         There are no student comments for this assignment.\n\
         \n\
         Files:\n",
        parts[2], month, parts[0], parts[3], parts[4], parts[5]
    );
    if files.is_empty() {
        text.push_str("No files were attached to this submission.\n");
    }
    for (original, stored) in files {
        text.push_str(&format!(
            "\tOriginal filename: {original}\n\tFilename: {stored}\n\n"
        ));
    }
    text
}

/// A zip holding a single `inner.txt`
pub fn inner_zip() -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buf);
        zip.start_file("inner.txt", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"inside").unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}

/// Bundle entries `(name, bytes)`:
///
/// - s1: two attempts (pdf on the 16th, docx on the 17th)
/// - s2: a single zip
/// - s3: no file
/// - s4: a corrupt zip
/// - s5: no attempt
pub fn bundle_entries() -> Vec<(String, Vec<u8>)> {
    let mut entries = Vec::new();
    let mut attempt = |id: &str, name: &str, stamp: &str, files: Vec<(&str, Vec<u8>)>| {
        let stem = stem(id, stamp);
        let listed: Vec<(&str, String)> = files
            .iter()
            .map(|(original, _)| (*original, format!("{stem}_{original}")))
            .collect();
        entries.push((
            format!("{stem}.txt"),
            log_text(id, name, stamp, &listed).into_bytes(),
        ));
        for ((_, stored), (_, bytes)) in listed.into_iter().zip(files) {
            entries.push((stored, bytes));
        }
    };

    attempt("s1", "Ada Lovelace", "2023-01-16-11-56-43", vec![("essay.pdf", b"%PDF-1".to_vec())]);
    attempt("s1", "Ada Lovelace", "2023-01-17-09-05-00", vec![("essay.docx", b"DOCX".to_vec())]);
    attempt("s2", "Charles Babbage", "2023-01-16-08-00-00", vec![("work.zip", inner_zip())]);
    attempt("s3", "Grace Hopper", "2023-01-16-12-00-00", vec![]);
    attempt("s4", "Alan Turing", "2023-01-16-13-00-00", vec![("broken.zip", b"not a zip".to_vec())]);
    entries
}

pub fn write_zip(path: &Path, entries: &[(String, Vec<u8>)]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, bytes) in entries {
        zip.start_file(name.as_str(), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

pub fn write_folder(path: &Path, entries: &[(String, Vec<u8>)]) {
    fs::create_dir_all(path).unwrap();
    for (name, bytes) in entries {
        fs::write(path.join(name), bytes).unwrap();
    }
}

/// Lay out `<root>/blearn-1_ini/{a.xls,a.zip}` with the standard fixtures
pub fn write_project(root: &Path) {
    let input = root.join("blearn-1_ini");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("a.xls"), sheet_utf16(&STUDENTS)).unwrap();
    write_zip(&input.join("a.zip"), &bundle_entries());
}

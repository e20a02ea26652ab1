//! blearn - LMS grading sheets and submission bundles for offline marking
//!
//! This library reads the grading sheet and the submission bundle an LMS hands
//! out for an assignment, keeps one attempt per student, unpacks every attempt
//! into `submission_files/{id}/` and writes a marking template linking to them.
//!
//! # Features
//!
//! - Attempt-log parsing (file names and log text, LMS datetimes)
//! - Zip or extracted-folder bundles
//! - UTF-16 tab-separated grading sheets, or real workbooks
//! - Marking template export (.xlsx) with hyperlinks to student folders
//!
//! # Example
//!
//! ```no_run
//! use blearn::core::{prepare_project, PrepareOptions};
//! use std::path::Path;
//!
//! let options = PrepareOptions {
//!     safe: false,
//!     ..PrepareOptions::default()
//! }
//! .with_row_filter(|row| row.submission.is_some());
//!
//! let project = prepare_project(
//!     Path::new("blearn-1_ini/a.xls"),
//!     Path::new("blearn-1_ini/a.zip"),
//!     Path::new("blearn-2_out"),
//!     &options,
//! )?;
//!
//! println!("Template: {}", project.template.display());
//! println!("Rows: {}", project.rows.len());
//! # Ok::<(), blearn::error::BlearnError>(())
//! ```

pub mod bundle;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod excel;
pub mod logging;
pub mod parser;
pub mod types;

// Re-export commonly used types
pub use error::{BlearnError, BlearnResult};
pub use types::{GradeSheet, Keep, SubmissionLog, TemplateRow};

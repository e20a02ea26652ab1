//! Marking-project preparation

pub mod prepare;
pub mod template;

pub use prepare::{
    prepare_project, read_grade_sheet, PrepareOptions, PreparedProject, RowFilter, CORRUPT_MARKER,
    SUBMISSION_DIR,
};
pub use template::{hyperlink_formula, template_file_name};

//! Excel import/export
//!
//! - Import: the LMS grading sheet (tab-separated UTF-16 "xls", or a real workbook)
//! - Export: any [`SheetTable`](crate::types::SheetTable) as a `grades` worksheet

mod exporter;
mod importer;

pub use exporter::{
    column_widths, truncate_to_cell, write_table, ExportOptions, TableExporter, DATETIME_FORMAT,
    MAX_CELL_CHARS, SHEET_NAME,
};
pub use importer::{
    decode_text, parse_last_access, GradeSheetImporter, COL_FEEDBACK, COL_LAST_NAME,
    COL_MARKING_NOTES, DEFAULT_AUTO_DROP,
};

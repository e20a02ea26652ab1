//! Table exporter - SheetTable → Excel (.xlsx)

use crate::error::{BlearnError, BlearnResult};
use crate::types::{Cell, SheetTable};
use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Formula, Workbook, Worksheet, XlsxError};
use std::path::Path;
use tracing::warn;

pub const SHEET_NAME: &str = "grades";
pub const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Longest string Excel stores in a cell, in characters
pub const MAX_CELL_CHARS: usize = 32_767;

/// Layout options for [`TableExporter`]
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Size columns after their header (and the index column after its content)
    pub adjust_colwidth: bool,
    /// Write the index as the first column
    pub with_index: bool,
    /// Worksheet column indexes to place in a level-1 outline group
    pub group_columns: Vec<u16>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            adjust_colwidth: true,
            with_index: true,
            group_columns: Vec::new(),
        }
    }
}

/// Writes a [`SheetTable`] as a single `grades` worksheet
pub struct TableExporter<'a> {
    table: &'a SheetTable,
    options: ExportOptions,
}

impl<'a> TableExporter<'a> {
    pub fn new(table: &'a SheetTable) -> Self {
        Self {
            table,
            options: ExportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    /// Export the table to an Excel .xlsx file
    pub fn export(&self, output_path: &Path) -> BlearnResult<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(SHEET_NAME)
            .map_err(export_err("Failed to set worksheet name"))?;

        self.write_cells(worksheet)?;
        self.apply_layout(worksheet)?;

        workbook
            .save(output_path)
            .map_err(export_err("Failed to save Excel file"))?;
        Ok(())
    }

    fn write_cells(&self, worksheet: &mut Worksheet) -> BlearnResult<()> {
        let offset: u16 = if self.options.with_index { 1 } else { 0 };
        let datetime_format = Format::new().set_num_format(DATETIME_FORMAT);

        if self.options.with_index {
            worksheet
                .write_string(0, 0, &self.table.index_name)
                .map_err(export_err("Failed to write header"))?;
        }
        for (col_idx, name) in self.table.columns.iter().enumerate() {
            worksheet
                .write_string(0, col_idx as u16 + offset, name)
                .map_err(export_err("Failed to write header"))?;
        }

        for (row_idx, (index, cells)) in self.table.rows.iter().enumerate() {
            let row = row_idx as u32 + 1;
            if self.options.with_index {
                worksheet
                    .write_string(row, 0, index)
                    .map_err(export_err("Failed to write index"))?;
            }
            for (col_idx, cell) in cells.iter().enumerate() {
                let col = col_idx as u16 + offset;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(s) => {
                        let text = truncate_to_cell(s);
                        if text.len() < s.len() {
                            warn!(
                                row = %index,
                                column = self.table.columns.get(col_idx).map_or("", String::as_str),
                                "text longer than {MAX_CELL_CHARS} characters; truncated"
                            );
                        }
                        worksheet
                            .write_string(row, col, text)
                            .map_err(export_err("Failed to write text"))?;
                    }
                    Cell::DateTime(dt) => {
                        worksheet
                            .write_datetime_with_format(row, col, &to_excel_datetime(dt)?, &datetime_format)
                            .map_err(export_err("Failed to write datetime"))?;
                    }
                    Cell::Formula(f) => {
                        worksheet
                            .write_formula(row, col, Formula::new(f))
                            .map_err(export_err("Failed to write formula"))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_layout(&self, worksheet: &mut Worksheet) -> BlearnResult<()> {
        worksheet
            .set_freeze_panes(1, 1)
            .map_err(export_err("Failed to freeze panes"))?;

        if self.options.adjust_colwidth {
            for (col, width) in column_widths(self.table, self.options.with_index)
                .into_iter()
                .enumerate()
            {
                let width = width.max(1) as f64;
                worksheet
                    .set_column_width(col as u16, width)
                    .map_err(export_err("Failed to set column width"))?;
            }
        }

        for (first, last) in contiguous_ranges(&self.options.group_columns) {
            worksheet
                .group_columns(first, last)
                .map_err(export_err("Failed to group columns"))?;
        }
        Ok(())
    }
}

/// Write `table` to `path` with the given layout
pub fn write_table(path: &Path, table: &SheetTable, options: ExportOptions) -> BlearnResult<()> {
    TableExporter::new(table).with_options(options).export(path)
}

/// Column widths from header names; the index column also accounts for its values.
pub fn column_widths(table: &SheetTable, with_index: bool) -> Vec<usize> {
    let mut widths = Vec::with_capacity(table.columns.len() + 1);
    if with_index {
        let longest = table
            .rows
            .iter()
            .map(|(idx, _)| idx.chars().count())
            .chain(std::iter::once(table.index_name.chars().count()))
            .max()
            .unwrap_or(0);
        widths.push(longest);
    }
    widths.extend(table.columns.iter().map(|c| c.chars().count()));
    widths
}

/// Longest prefix of `s` that fits in one Excel cell
pub fn truncate_to_cell(s: &str) -> &str {
    match s.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Collapse sorted column indexes into inclusive `(first, last)` runs
fn contiguous_ranges(columns: &[u16]) -> Vec<(u16, u16)> {
    let mut sorted = columns.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges: Vec<(u16, u16)> = Vec::new();
    for col in sorted {
        match ranges.last_mut() {
            Some((_, last)) if *last + 1 == col => *last = col,
            _ => ranges.push((col, col)),
        }
    }
    ranges
}

fn to_excel_datetime(dt: &NaiveDateTime) -> BlearnResult<ExcelDateTime> {
    let year = u16::try_from(dt.year())
        .map_err(|_| BlearnError::Export(format!("Year out of range: {}", dt)))?;
    ExcelDateTime::from_ymd(year, dt.month() as u8, dt.day() as u8)
        .and_then(|d| d.and_hms(dt.hour() as u16, dt.minute() as u8, dt.second()))
        .map_err(export_err("Invalid datetime"))
}

fn export_err(context: &'static str) -> impl Fn(XlsxError) -> BlearnError {
    move |e| BlearnError::Export(format!("{}: {}", context, e))
}

// Excel workbook import (xlsx, xlsm, xls, xlsb, ods).
//
// Cells are handed to the engine untyped; only dates get special treatment
// because calamine reports them as serials.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use taxrecon_recon::model::CellValue;

use crate::error::IoError;
use crate::table::Table;

/// Upper bound on rows read per sheet.
pub const MAX_ROWS: usize = 1_048_576;

/// Extensions routed to calamine. Anything else is treated as delimited text.
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Sheet names in workbook order.
pub fn sheet_names(path: &Path) -> Result<Vec<String>, IoError> {
    let workbook = open_workbook_auto(path).map_err(|e| IoError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let names = workbook.sheet_names().to_vec();
    if names.is_empty() {
        return Err(IoError::NoSheets(path.to_path_buf()));
    }
    Ok(names)
}

/// Read every sheet of a workbook.
pub fn read_workbook(path: &Path) -> Result<Vec<Table>, IoError> {
    let names = sheet_names(path)?;
    read_sheets(path, &names)
}

/// Read the named sheets of a workbook, in the order given.
pub fn read_sheets(path: &Path, wanted: &[String]) -> Result<Vec<Table>, IoError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| IoError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let available = workbook.sheet_names().to_vec();

    let mut tables = Vec::with_capacity(wanted.len());
    for name in wanted {
        if !available.contains(name) {
            return Err(IoError::UnknownSheet { name: name.clone(), available });
        }
        let range = workbook.worksheet_range(name).map_err(|e| IoError::Sheet {
            sheet: name.clone(),
            message: e.to_string(),
        })?;

        // Range start offset (data may not begin at A1)
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let (height, _) = range.get_size();
        if height > MAX_ROWS {
            log::warn!("sheet '{name}': {height} rows, reading the first {MAX_ROWS}");
        }

        let grid = range.rows().take(MAX_ROWS).enumerate().map(|(idx, row)| {
            let mut cells = vec![CellValue::Empty; start_col as usize];
            cells.extend(row.iter().map(cell_value));
            (start_row as usize + idx + 1, cells)
        });
        let table = Table::from_grid(name, grid);
        log::debug!(
            "sheet '{name}': header at row {}, {} data row(s), {} column(s)",
            table.header_row,
            table.rows.len(),
            table.headers.len()
        );
        tables.push(table);
    }
    Ok(tables)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
        Data::DateTime(dt) => {
            // 1900 date system assumed; calamine does not expose the 1904 flag
            let serial = dt.as_f64();
            match serial_date(serial) {
                Some(date) => CellValue::Date(date),
                None => CellValue::Number(serial),
            }
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Excel serial to calendar date. Pure times (serial < 1) are not dates.
fn serial_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

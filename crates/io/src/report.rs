// Annotated reconciliation workbook (xlsx only)
//
// Each side is written back with its original columns at their original row
// positions, followed by the match columns. A Summary sheet comes last.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use taxrecon_recon::model::{CellValue, DetailRow, MatchStatus, ReconReport, Side};

use crate::error::IoError;
use crate::table::Table;

/// Columns appended to each side's sheet.
pub const ANNOTATION_HEADERS: [&str; 5] = ["Match_Status", "Match_ID", "Matched_Row", "Variance", "Warnings"];

pub const SUMMARY_SHEET: &str = "Summary";

const MAX_SHEET_NAME: usize = 31;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub sheets: usize,
    pub rows: usize,
}

/// `<dir>/<stem>_RECON_<YYYYmmdd_HHMMSS>.xlsx` next to the input file.
pub fn default_output_path(input: &Path, stamp: NaiveDateTime) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("recon");
    let file = format!("{stem}_RECON_{}.xlsx", stamp.format("%Y%m%d_%H%M%S"));
    input.with_file_name(file)
}

/// Write the annotated workbook for a finished run.
pub fn write_report(report: &ReconReport, a: &Table, b: &Table, path: &Path) -> Result<WriteStats, IoError> {
    let write_err = |e: XlsxError| IoError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut workbook = Workbook::new();
    let formats = Formats::new();
    let mut used_names: Vec<String> = vec![SUMMARY_SHEET.to_string()];
    let mut stats = WriteStats::default();

    for (side, table) in [(Side::A, a), (Side::B, b)] {
        let name = unique_sheet_name(&table.name, &mut used_names);
        let worksheet = workbook.add_worksheet().set_name(&name).map_err(write_err)?;
        let details: BTreeMap<usize, &DetailRow> =
            report.details_for(side).map(|d| (d.source_row.row, d)).collect();
        stats.rows += write_side(worksheet, table, &details, &formats).map_err(write_err)?;
        stats.sheets += 1;
    }

    let summary = workbook.add_worksheet().set_name(SUMMARY_SHEET).map_err(write_err)?;
    write_summary(summary, report, &formats).map_err(write_err)?;
    stats.sheets += 1;

    workbook.save(path).map_err(write_err)?;
    log::info!("wrote {} ({} annotated rows)", path.display(), stats.rows);
    Ok(stats)
}

struct Formats {
    header: Format,
    date: Format,
    amount: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            date: Format::new().set_num_format("dd-mm-yyyy"),
            amount: Format::new().set_num_format("#,##0.00"),
        }
    }
}

fn write_side(
    ws: &mut Worksheet,
    table: &Table,
    details: &BTreeMap<usize, &DetailRow>,
    formats: &Formats,
) -> Result<usize, XlsxError> {
    let header_row = table.header_row.saturating_sub(1) as u32;
    let first_note = table.headers.len() as u16;

    for (col, header) in table.headers.iter().enumerate() {
        ws.write_string_with_format(header_row, col as u16, header, &formats.header)?;
    }
    for (i, header) in ANNOTATION_HEADERS.iter().enumerate() {
        ws.write_string_with_format(header_row, first_note + i as u16, *header, &formats.header)?;
    }

    let mut written = 0;
    for raw in &table.rows {
        let row = raw.row_ref.row.saturating_sub(1) as u32;
        for (col, header) in table.headers.iter().enumerate() {
            if let Some(cell) = raw.cells.get(header) {
                write_cell(ws, row, col as u16, cell, formats)?;
            }
        }

        let Some(detail) = details.get(&raw.row_ref.row) else {
            continue;
        };
        ws.write_string(row, first_note, &detail.label)?;
        if let Some(id) = detail.pair_id {
            ws.write_number(row, first_note + 1, id as f64)?;
        }
        if let Some(counterpart) = &detail.counterpart_row {
            ws.write_number(row, first_note + 2, counterpart.row as f64)?;
        }
        if let Some(variance) = detail.variance {
            write_decimal(ws, row, first_note + 3, variance, formats)?;
        }
        if !detail.warnings.is_empty() {
            ws.write_string(row, first_note + 4, detail.warnings.join("; "))?;
        }
        written += 1;
    }

    ws.set_column_width(first_note, 30)?;
    ws.set_column_width(first_note + 4, 40)?;
    ws.set_freeze_panes(header_row + 1, 0)?;
    Ok(written)
}

fn write_cell(ws: &mut Worksheet, row: u32, col: u16, cell: &CellValue, formats: &Formats) -> Result<(), XlsxError> {
    match cell {
        CellValue::Empty => {}
        CellValue::Text(s) => {
            ws.write_string(row, col, s)?;
        }
        CellValue::Number(n) => {
            ws.write_number(row, col, *n)?;
        }
        CellValue::Date(d) => {
            ws.write_number_with_format(row, col, excel_serial(*d), &formats.date)?;
        }
    }
    Ok(())
}

fn write_decimal(ws: &mut Worksheet, row: u32, col: u16, value: Decimal, formats: &Formats) -> Result<(), XlsxError> {
    match value.to_f64() {
        Some(n) => ws.write_number_with_format(row, col, n, &formats.amount)?,
        None => ws.write_string(row, col, value.to_string())?,
    };
    Ok(())
}

fn excel_serial(date: NaiveDate) -> f64 {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .map(|epoch| (date - epoch).num_days() as f64)
        .unwrap_or(0.0)
}

fn write_summary(ws: &mut Worksheet, report: &ReconReport, formats: &Formats) -> Result<(), XlsxError> {
    let summary = &report.summary;
    let mut rows: Vec<(String, SummaryValue)> = vec![
        ("Side A".into(), SummaryValue::Text(report.meta.label_a.clone())),
        ("Side B".into(), SummaryValue::Text(report.meta.label_b.clone())),
        ("Tolerance".into(), SummaryValue::Amount(report.meta.tolerance)),
        ("Records A".into(), SummaryValue::Count(summary.records_a)),
        ("Records B".into(), SummaryValue::Count(summary.records_b)),
        ("Pairs".into(), SummaryValue::Count(summary.pairs)),
    ];
    for status in MatchStatus::ALL {
        rows.push((status.to_string(), SummaryValue::Count(summary.count(status))));
    }
    rows.push(("Low confidence".into(), SummaryValue::Count(summary.low_confidence)));
    rows.push(("Mismatch variance".into(), SummaryValue::Amount(summary.mismatch_variance)));
    rows.push(("Engine version".into(), SummaryValue::Text(report.meta.engine_version.clone())));

    ws.write_string_with_format(0, 0, "Item", &formats.header)?;
    ws.write_string_with_format(0, 1, "Value", &formats.header)?;
    for (i, (label, value)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        ws.write_string(row, 0, label)?;
        match value {
            SummaryValue::Text(s) => {
                ws.write_string(row, 1, s)?;
            }
            SummaryValue::Count(n) => {
                ws.write_number(row, 1, *n as f64)?;
            }
            SummaryValue::Amount(d) => write_decimal(ws, row, 1, *d, formats)?,
        }
    }
    ws.set_column_width(0, 26)?;
    ws.set_column_width(1, 24)?;
    Ok(())
}

enum SummaryValue {
    Text(String),
    Count(usize),
    Amount(Decimal),
}

/// Excel sheet names: at most 31 chars, none of `[]:*?/\`, unique ignoring case.
fn unique_sheet_name(raw: &str, used: &mut Vec<String>) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').to_string();
    let base = if cleaned.is_empty() { "Sheet".to_string() } else { cleaned };

    let mut candidate: String = base.chars().take(MAX_SHEET_NAME).collect();
    let mut n = 2;
    while used.iter().any(|u| u.eq_ignore_ascii_case(&candidate)) {
        let suffix = format!(" ({n})");
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        candidate = base.chars().take(keep).collect::<String>() + &suffix;
        n += 1;
    }
    used.push(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto, Data, Reader};
    use taxrecon_recon::config::ReconConfig;
    use taxrecon_recon::engine::run;
    use taxrecon_recon::model::ReconInput;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn table(name: &str, rows: &[(&str, &str, f64)]) -> Table {
        let mut grid = vec![(1, vec![text("GSTIN"), text("Invoice No"), text("Invoice Value")])];
        for (i, (gstin, inv, total)) in rows.iter().enumerate() {
            grid.push((i + 2, vec![text(gstin), text(inv), CellValue::Number(*total)]));
        }
        Table::from_grid(name, grid)
    }

    #[test]
    fn annotated_workbook_round_trip() {
        let a = table(
            "Purchase Register",
            &[("29ABCDE1234F1Z5", "INV-1", 1000.0), ("29ABCDE1234F1Z5", "INV-2", 50.0)],
        );
        let b = table("GSTR-2B", &[("29ABCDE1234F1Z5", "INV-1", 1000.5)]);
        let input = ReconInput { a: a.to_side_input(), b: b.to_side_input() };
        let report = run(&ReconConfig::new(Decimal::ONE), &input).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let stats = write_report(&report, &a, &b, &path).unwrap();
        assert_eq!(stats, WriteStats { sheets: 3, rows: 3 });

        let mut wb = open_workbook_auto(&path).unwrap();
        assert_eq!(wb.sheet_names().to_vec(), vec!["Purchase Register", "GSTR-2B", "Summary"]);

        let books = wb.worksheet_range("Purchase Register").unwrap();
        assert_eq!(books.get_value((0, 3)), Some(&Data::String("Match_Status".into())));
        assert_eq!(books.get_value((0, 7)), Some(&Data::String("Warnings".into())));
        assert_eq!(books.get_value((1, 3)), Some(&Data::String("MatchedWithinTolerance".into())));
        assert_eq!(books.get_value((1, 4)), Some(&Data::Float(1.0)));
        assert_eq!(books.get_value((1, 5)), Some(&Data::Float(2.0)));
        assert_eq!(books.get_value((1, 6)), Some(&Data::Float(-0.5)));
        assert_eq!(books.get_value((2, 3)), Some(&Data::String("MissingInB".into())));

        let summary = wb.worksheet_range("Summary").unwrap();
        assert_eq!(summary.get_value((1, 1)), Some(&Data::String("Purchase Register".into())));
        assert_eq!(summary.get_value((6, 0)), Some(&Data::String("Pairs".into())));
        assert_eq!(summary.get_value((7, 0)), Some(&Data::String("MatchedExact".into())));
    }

    #[test]
    fn sheet_names_are_sanitized_and_unique() {
        let mut used = vec![SUMMARY_SHEET.to_string()];
        assert_eq!(unique_sheet_name("GSTR/2B [Apr]", &mut used), "GSTR_2B _Apr_");
        assert_eq!(unique_sheet_name("summary", &mut used), "summary (2)");
        assert_eq!(unique_sheet_name("Data", &mut used), "Data");
        assert_eq!(unique_sheet_name("data", &mut used), "data (2)");
        let long = "A very long purchase register sheet name";
        let name = unique_sheet_name(long, &mut used);
        assert_eq!(name.chars().count(), 31);
        let again = unique_sheet_name(long, &mut used);
        assert!(again.ends_with(" (2)"));
        assert_eq!(again.chars().count(), 31);
        assert_eq!(unique_sheet_name("  ", &mut used), "Sheet");
    }

    #[test]
    fn output_name_uses_stem_and_stamp() {
        let stamp = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap().and_hms_opt(9, 3, 15).unwrap();
        let path = default_output_path(Path::new("/data/returns apr.xlsx"), stamp);
        assert_eq!(path, PathBuf::from("/data/returns apr_RECON_20240507_090315.xlsx"));
    }

    #[test]
    fn date_serials() {
        assert_eq!(excel_serial(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()), 45383.0);
    }
}

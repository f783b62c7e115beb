use std::collections::BTreeMap;

use taxrecon_recon::model::{CellValue, RawRow, RowRef, SideInput};

/// One loaded sheet: the header row plus every non-blank data row below it.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    /// Column headers in sheet order. Blank headers become "Column C" style
    /// names; repeated headers get a " (2)", " (3)" suffix.
    pub headers: Vec<String>,
    /// 1-based row number of the header row (0 when the sheet is empty).
    pub header_row: usize,
    pub rows: Vec<RawRow>,
}

impl Table {
    /// Build a table from (1-based row number, cells) pairs in sheet order.
    ///
    /// The header is the first row with at least two non-blank cells, so a
    /// one-cell title line above it is skipped. A sheet whose rows all hold a
    /// single value uses its first non-blank row.
    pub fn from_grid<I>(name: &str, grid: I) -> Self
    where
        I: IntoIterator<Item = (usize, Vec<CellValue>)>,
    {
        let grid: Vec<(usize, Vec<CellValue>)> = grid
            .into_iter()
            .filter(|(_, cells)| !cells.iter().all(CellValue::is_blank))
            .collect();
        let filled = |cells: &[CellValue]| cells.iter().filter(|c| !c.is_blank()).count();
        let header_idx = grid.iter().position(|(_, cells)| filled(cells) >= 2).unwrap_or(0);

        let mut table = Table {
            name: name.to_string(),
            headers: Vec::new(),
            header_row: 0,
            rows: Vec::new(),
        };

        for (row_number, cells) in grid.into_iter().skip(header_idx) {
            if table.header_row == 0 {
                table.headers = header_names(&cells);
                table.header_row = row_number;
                continue;
            }
            let mut row = RawRow::new(RowRef::new(name, row_number));
            for (col, cell) in cells.into_iter().enumerate() {
                if cell.is_blank() {
                    continue;
                }
                // Data past the last header still gets a column
                while table.headers.len() <= col {
                    let letter = column_letter(table.headers.len());
                    table.headers.push(format!("Column {letter}"));
                }
                row.cells.insert(table.headers[col].clone(), cell);
            }
            table.rows.push(row);
        }

        table
    }

    pub fn to_side_input(&self) -> SideInput {
        SideInput::new(self.name.clone(), self.rows.clone()).with_headers(self.headers.clone())
    }

    /// Data rows keyed by their sheet row number.
    pub fn rows_by_number(&self) -> BTreeMap<usize, &RawRow> {
        self.rows.iter().map(|r| (r.row_ref.row, r)).collect()
    }
}

fn header_names(cells: &[CellValue]) -> Vec<String> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    cells
        .iter()
        .enumerate()
        .map(|(col, cell)| {
            let text = cell.as_text();
            let base = text.trim();
            let base = if base.is_empty() {
                format!("Column {}", column_letter(col))
            } else {
                base.to_string()
            };
            let count = seen.entry(base.to_lowercase()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{base} ({count})")
            }
        })
        .collect()
}

/// 0-based column index to spreadsheet letters: 0 -> A, 26 -> AA.
pub fn column_letter(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

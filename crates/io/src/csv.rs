// CSV/TSV import

use std::io::Read;
use std::path::Path;

use taxrecon_recon::model::CellValue;

use crate::error::IoError;
use crate::table::Table;

/// Read a delimited text file as one table. The delimiter is sniffed.
pub fn read_csv(path: &Path, label: &str) -> Result<Table, IoError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    log::debug!("{}: using delimiter {:?}", path.display(), delimiter as char);
    parse_table(&content, delimiter, label).map_err(|message| IoError::Csv {
        path: path.to_path_buf(),
        message,
    })
}

/// Table label for a CSV file: its file stem.
pub fn default_label(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "CSV".to_string())
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // More consistent lines win; more columns break ties
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let open_err = |e: std::io::Error| IoError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut file = std::fs::File::open(path).map_err(open_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(open_err)?;

    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            // Excel on Windows exports CSV as Windows-1252
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };
    Ok(text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text))
}

fn parse_table(content: &str, delimiter: u8, label: &str) -> Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| e.to_string())?;
        // Row numbers as a spreadsheet would show them
        let line = record.position().map(|p| p.line() as usize).unwrap_or(grid.len() + 1);
        let cells = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(field.to_string())
                }
            })
            .collect();
        grid.push((line, cells));
    }

    Ok(Table::from_grid(label, grid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sniff_comma() {
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3\n4,5,6"), b',');
    }

    #[test]
    fn sniff_semicolon_with_decimal_commas() {
        let content = "GSTIN;Invoice No;Total\nX;1;1.180,50\nY;2;99,00";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn sniff_tab() {
        assert_eq!(sniff_delimiter("a\tb\n1\t2"), b'\t');
    }

    #[test]
    fn sniff_single_column_defaults_to_comma() {
        assert_eq!(sniff_delimiter("only\nvalues"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn parse_keeps_row_numbers() {
        let content = "GSTIN,Invoice No,Invoice Value\n\n29ABCDE1234F1Z5,INV-1,\"1,180.00\"\n";
        let table = parse_table(content, b',', "2B").unwrap();
        assert_eq!(table.header_row, 1);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].row_ref.row, 3);
        assert_eq!(table.rows[0].cells["Invoice Value"], CellValue::Text("1,180.00".into()));
    }

    #[test]
    fn read_windows_1252_with_bom_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gstr2b.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        // "Caf\xe9" is not valid UTF-8
        file.write_all(b"GSTIN,Name,Total\nX,Caf\xe9,10\n").unwrap();
        drop(file);

        let table = read_csv(&path, "gstr2b").unwrap();
        assert_eq!(table.headers, vec!["GSTIN", "Name", "Total"]);
        assert_eq!(table.rows[0].cells["Name"], CellValue::Text("Café".into()));

        let bom = dir.path().join("bom.csv");
        std::fs::write(&bom, "\u{feff}GSTIN,Total\nX,1\n").unwrap();
        let table = read_csv(&bom, "bom").unwrap();
        assert_eq!(table.headers[0], "GSTIN");
    }

    #[test]
    fn missing_file() {
        let err = read_csv(Path::new("/definitely/not/here.csv"), "x").unwrap_err();
        assert!(matches!(err, IoError::Open { .. }));
    }

    #[test]
    fn label_from_stem() {
        assert_eq!(default_label(Path::new("dir/GSTR-2B Apr.csv")), "GSTR-2B Apr");
    }
}

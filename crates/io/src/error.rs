use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum IoError {
    /// File could not be opened or read.
    Open { path: PathBuf, message: String },
    /// Workbook opened but a sheet could not be read.
    Sheet { sheet: String, message: String },
    /// Workbook has no worksheets.
    NoSheets(PathBuf),
    /// CSV record error.
    Csv { path: PathBuf, message: String },
    /// Requested sheet name is not in the workbook.
    UnknownSheet { name: String, available: Vec<String> },
    /// The two sides could not be chosen.
    SheetPair(String),
    /// Report could not be written.
    Write { path: PathBuf, message: String },
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, message } => write!(f, "cannot open {}: {message}", path.display()),
            Self::Sheet { sheet, message } => write!(f, "cannot read sheet '{sheet}': {message}"),
            Self::NoSheets(path) => write!(f, "{} contains no sheets", path.display()),
            Self::Csv { path, message } => write!(f, "{}: {message}", path.display()),
            Self::UnknownSheet { name, available } => {
                write!(f, "sheet '{name}' not found (available: {})", available.join(", "))
            }
            Self::SheetPair(msg) => write!(f, "{msg}"),
            Self::Write { path, message } => write!(f, "cannot write {}: {message}", path.display()),
        }
    }
}

impl std::error::Error for IoError {}

impl IoError {
    /// Problems with the shape of the input rather than the filesystem.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::NoSheets(_) | Self::UnknownSheet { .. } | Self::SheetPair(_))
    }
}

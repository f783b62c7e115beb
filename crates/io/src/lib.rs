//! File IO for taxrecon: workbook and CSV loading, sheet-pair detection and
//! the annotated reconciliation workbook.

pub mod csv;
pub mod error;
pub mod report;
pub mod sheets;
pub mod table;
pub mod xlsx;

pub use error::IoError;
pub use table::Table;

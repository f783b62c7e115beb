//! CLI Exit Code Registry
//!
//! Single source of truth for the exit codes of `taxrecon`. Scripts rely on
//! them, so codes are never reused for a different meaning.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | Discrepancies found (only with `--strict`)               |
//! | 2    | Usage error (bad arguments, unsupported input shape)     |
//! | 60   | Invalid configuration (TOML parse or validation)         |
//! | 61   | Structural input error (missing column, empty side, ...) |
//! | 62   | IO error (cannot read input or write the report)         |

/// Success - the run completed. Without `--strict` this includes runs with
/// unmatched or mismatched invoices.
pub const EXIT_SUCCESS: u8 = 0;

/// `--strict` and at least one record is not matched.
pub const EXIT_DISCREPANCIES: u8 = 1;

/// Usage error - bad arguments, or an input that cannot supply two sides.
pub const EXIT_USAGE: u8 = 2;

/// Config file failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 60;

/// Input is readable but unusable: a required column is missing, a side has
/// no rows, or the sheet pair cannot be determined.
pub const EXIT_INPUT: u8 = 61;

/// Filesystem or format error while reading inputs or writing outputs.
pub const EXIT_IO: u8 = 62;

use std::fmt;

use crate::model::Side;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad scale, empty alias list, etc.).
    ConfigValidation(String),
    /// Tolerance is negative or not a number.
    InvalidTolerance(String),
    /// A side has no usable rows.
    EmptySide { side: Side, label: String },
    /// A required field is absent from every row of a side.
    MissingField { side: Side, label: String, field: String, tried: Vec<String> },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::InvalidTolerance(value) => {
                write!(f, "tolerance must be a non-negative number, got '{value}'")
            }
            Self::EmptySide { side, label } => {
                write!(f, "side {side} ('{label}') contains no rows")
            }
            Self::MissingField { side, label, field, tried } => {
                write!(
                    f,
                    "side {side} ('{label}'): no column found for {field} (looked for: {})",
                    tried.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for ReconError {}

impl ReconError {
    /// Structural input problems, as opposed to configuration problems.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::EmptySide { .. } | Self::MissingField { .. })
    }
}

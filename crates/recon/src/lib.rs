//! `taxrecon-recon`: two-sided tax invoice reconciliation engine.
//!
//! Pure engine crate: receives raw rows for both sides, returns a classified
//! report. No CLI or file IO dependencies.

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod report;

pub use config::{CompareMode, FallbackStrategy, ReconConfig};
pub use engine::run;
pub use error::ReconError;
pub use model::{
    CellValue, DetailRow, MatchResult, MatchStatus, RawRow, ReconInput, ReconReport, ReconSummary,
    RowRef, Side, SideInput,
};

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Which dataset a row came from. A is the base (books), B the counterparty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// An untyped spreadsheet cell as handed over by the loader.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Date(_) => false,
        }
    }

    /// Text rendering used for identifiers. Whole numbers drop the fraction.
    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

/// Back-reference to the row a record was read from. Never used for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowRef {
    /// Sheet or file the row belongs to.
    pub source: String,
    /// 1-based row number as the user sees it in the spreadsheet.
    pub row: usize,
}

impl RowRef {
    pub fn new(source: impl Into<String>, row: usize) -> Self {
        Self { source: source.into(), row }
    }
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.source, self.row)
    }
}

/// One raw row: header name to cell value.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub row_ref: RowRef,
    pub cells: BTreeMap<String, CellValue>,
}

impl RawRow {
    pub fn new(row_ref: RowRef) -> Self {
        Self { row_ref, cells: BTreeMap::new() }
    }

    pub fn with(mut self, column: &str, value: impl Into<CellValue>) -> Self {
        self.cells.insert(column.to_string(), value.into());
        self
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(CellValue::is_blank)
    }
}

/// All raw rows for one side, plus the label shown in the report
/// (usually the sheet name, e.g. "Purchase Register" or "GSTR-2B").
#[derive(Debug, Clone)]
pub struct SideInput {
    pub label: String,
    /// Column headers in sheet order, when the loader knows them. Column
    /// lookup prefers the leftmost match.
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl SideInput {
    pub fn new(label: impl Into<String>, rows: Vec<RawRow>) -> Self {
        Self { label: label.into(), headers: Vec::new(), rows }
    }

    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }
}

/// Both sides of a run.
#[derive(Debug, Clone)]
pub struct ReconInput {
    pub a: SideInput,
    pub b: SideInput,
}

impl ReconInput {
    /// Split one pre-tagged row sequence into the two sides, preserving order.
    pub fn from_tagged<I>(label_a: &str, label_b: &str, rows: I) -> Self
    where
        I: IntoIterator<Item = (Side, RawRow)>,
    {
        let mut a = SideInput::new(label_a, Vec::new());
        let mut b = SideInput::new(label_b, Vec::new());
        for (side, row) in rows {
            match side {
                Side::A => a.rows.push(row),
                Side::B => b.rows.push(row),
            }
        }
        Self { a, b }
    }

    pub fn side(&self, side: Side) -> &SideInput {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

/// Semantic field a warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PartyId,
    InvoiceNumber,
    InvoiceDate,
    TaxableValue,
    TaxComponent,
    TotalValue,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PartyId => write!(f, "party id"),
            Self::InvoiceNumber => write!(f, "invoice number"),
            Self::InvoiceDate => write!(f, "invoice date"),
            Self::TaxableValue => write!(f, "taxable value"),
            Self::TaxComponent => write!(f, "tax component"),
            Self::TotalValue => write!(f, "total value"),
        }
    }
}

/// A field-level parse problem. The record is kept, just less trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub field: Field,
    pub column: Option<String>,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(col) => write!(f, "{} ({col}): {} '{}'", self.field, self.reason, self.value),
            None => write!(f, "{}: {} '{}'", self.field, self.reason, self.value),
        }
    }
}

/// Canonical unit of reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub side: Side,
    pub party_id: String,
    pub party_name: Option<String>,
    pub invoice_number: String,
    /// None when the source date could not be parsed.
    pub invoice_date: Option<NaiveDate>,
    pub taxable_value: Decimal,
    /// Named tax amounts (e.g. IGST, CGST, SGST). Absent components are zero.
    pub tax_components: BTreeMap<String, Decimal>,
    pub total_value: Decimal,
    pub source_row: RowRef,
    /// Position within its side, in load order.
    pub ordinal: usize,
    pub warnings: Vec<ParseWarning>,
}

impl Record {
    pub fn key(&self) -> MatchKey {
        MatchKey {
            party_id: self.party_id.clone(),
            invoice_number: self.invoice_number.clone(),
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn component(&self, name: &str) -> Decimal {
        self.tax_components.get(name).copied().unwrap_or(Decimal::ZERO)
    }
}

/// Identity of an invoice: normalized party id + normalized invoice number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MatchKey {
    pub party_id: String,
    pub invoice_number: String,
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.party_id, self.invoice_number)
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MatchStatus {
    MatchedExact,
    MatchedWithinTolerance,
    MismatchedAmount,
    MissingInA,
    MissingInB,
    DuplicateUnmatched,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 6] = [
        Self::MatchedExact,
        Self::MatchedWithinTolerance,
        Self::MismatchedAmount,
        Self::MissingInA,
        Self::MissingInB,
        Self::DuplicateUnmatched,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MatchedExact => "MatchedExact",
            Self::MatchedWithinTolerance => "MatchedWithinTolerance",
            Self::MismatchedAmount => "MismatchedAmount",
            Self::MissingInA => "MissingInA",
            Self::MissingInB => "MissingInB",
            Self::DuplicateUnmatched => "DuplicateUnmatched",
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::MatchedExact | Self::MatchedWithinTolerance)
    }

    /// Status as seen from the other side when A and B swap roles.
    pub fn mirrored(&self) -> Self {
        match self {
            Self::MissingInA => Self::MissingInB,
            Self::MissingInB => Self::MissingInA,
            other => *other,
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the two records of a pair were brought together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    /// Same (party id, invoice number).
    InvoiceKey,
    /// Same (party id, invoice date) with amounts within tolerance.
    PartyDate,
    /// Party id blank on exactly one side; same tax head, amounts within tolerance.
    MissingPartyId,
    /// Same tax head and amounts within tolerance, party ids ignored.
    AmountOnly,
}

impl MatchBasis {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Self::InvoiceKey)
    }
}

/// Matcher output before the confidence overlay.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Bucket key; for fallback pairs, the key of the A record.
    pub key: MatchKey,
    pub status: MatchStatus,
    pub basis: MatchBasis,
    pub a: Option<Record>,
    pub b: Option<Record>,
    pub variance: Option<Decimal>,
}

impl MatchOutcome {
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.a.iter().chain(self.b.iter())
    }
}

/// A classified outcome. Holds one record (unmatched) or two (paired).
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub status: MatchStatus,
    pub low_confidence: bool,
    pub basis: MatchBasis,
    /// Sequential pair number, only for results with two records.
    pub pair_id: Option<u32>,
    pub key: MatchKey,
    pub a: Option<Record>,
    pub b: Option<Record>,
    /// A total minus B total.
    pub variance: Option<Decimal>,
}

impl MatchResult {
    pub const LOW_CONFIDENCE_SUFFIX: &'static str = " (low confidence)";

    pub fn label(&self) -> String {
        if self.low_confidence {
            format!("{}{}", self.status, Self::LOW_CONFIDENCE_SUFFIX)
        } else {
            self.status.to_string()
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.a.iter().chain(self.b.iter())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One output row per input record.
#[derive(Debug, Clone, Serialize)]
pub struct DetailRow {
    pub side: Side,
    pub source_row: RowRef,
    pub party_id: String,
    pub invoice_number: String,
    pub invoice_date: Option<NaiveDate>,
    pub total_value: Decimal,
    pub status: MatchStatus,
    pub low_confidence: bool,
    pub label: String,
    pub basis: MatchBasis,
    pub pair_id: Option<u32>,
    pub counterpart_row: Option<RowRef>,
    pub variance: Option<Decimal>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconSummary {
    pub records_a: usize,
    pub records_b: usize,
    pub pairs: usize,
    pub low_confidence: usize,
    /// Records per status label (always lists every status).
    pub status_counts: BTreeMap<MatchStatus, usize>,
    /// Sum of variances over MismatchedAmount results.
    pub mismatch_variance: Decimal,
}

impl ReconSummary {
    pub fn count(&self, status: MatchStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    /// Anything that needs a reviewer's attention.
    pub fn discrepancies(&self) -> usize {
        self.count(MatchStatus::MismatchedAmount)
            + self.count(MatchStatus::MissingInA)
            + self.count(MatchStatus::MissingInB)
            + self.count(MatchStatus::DuplicateUnmatched)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub label_a: String,
    pub label_b: String,
    pub tolerance: Decimal,
    pub engine_version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub results: Vec<MatchResult>,
    pub details: Vec<DetailRow>,
}

impl ReconReport {
    pub fn details_for(&self, side: Side) -> impl Iterator<Item = &DetailRow> {
        self.details.iter().filter(move |d| d.side == side)
    }

    pub fn label(&self, side: Side) -> &str {
        match side {
            Side::A => &self.meta.label_a,
            Side::B => &self.meta.label_b,
        }
    }
}

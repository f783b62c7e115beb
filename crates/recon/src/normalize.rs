//! Raw rows in, canonical records out.
//!
//! Column lookup happens once per side; every row-level problem becomes a
//! `ParseWarning` on the record instead of an error.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::{FieldAliases, InvoiceKeyMode, KeyConfig, ReconConfig};
use crate::error::ReconError;
use crate::model::{CellValue, Field, ParseWarning, RawRow, Record, Side, SideInput};

/// Identifier cells that mean "nothing here".
const PLACEHOLDERS: &[&str] = &["NONE", "NAN", "NULL", "N/A", "NA", "-"];

/// Two-digit-year formats come first: chrono's `%Y` happily reads "24" as year 24.
const DATE_FORMATS: &[&str] = &[
    "%d-%m-%y",
    "%d/%m/%y",
    "%d.%m.%y",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%b-%y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%Y%m%d",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Spreadsheet serials outside this range are not plausible invoice dates.
const SERIAL_RANGE: std::ops::RangeInclusive<f64> = 1.0..=2_958_465.0;

/// Largest accepted amount magnitude, 10^20. Sums of a handful of such
/// amounts stay far inside the `Decimal` range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_661_992_960, 1_808_227_885, 5, false, 0);

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

/// Which source column feeds each semantic field, for one side.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap {
    pub party_id: String,
    pub invoice_number: String,
    pub party_name: Option<String>,
    pub invoice_date: Option<String>,
    pub taxable_value: Option<String>,
    pub total_value: Option<String>,
    /// (component name, column), in component-name order.
    pub tax_components: Vec<(String, String)>,
}

/// Lower-cased words only: "State/UT Tax(₹)" -> "state ut tax".
fn normalize_header(h: &str) -> String {
    h.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

struct HeaderClaims<'a> {
    headers: Vec<(&'a str, String)>,
    claimed: Vec<bool>,
}

impl<'a> HeaderClaims<'a> {
    fn new(headers: &[&'a str]) -> Self {
        Self {
            headers: headers.iter().map(|h| (*h, normalize_header(h))).collect(),
            claimed: vec![false; headers.len()],
        }
    }

    /// First unclaimed header containing any alias, trying aliases in order.
    fn claim(&mut self, aliases: &[String]) -> Option<String> {
        for alias in aliases {
            let alias = normalize_header(alias);
            if alias.is_empty() {
                continue;
            }
            for (i, (raw, norm)) in self.headers.iter().enumerate() {
                if !self.claimed[i] && norm.contains(&alias) {
                    self.claimed[i] = true;
                    return Some(raw.to_string());
                }
            }
        }
        None
    }
}

impl ColumnMap {
    /// Locate every field among the headers seen on this side.
    ///
    /// Fields claim columns in priority order and a column is never shared,
    /// so "GSTIN of Supplier" feeds the party id, not the party name. Within
    /// one alias the leftmost sheet column wins; columns only known from row
    /// cells come after the listed headers.
    pub fn resolve(side: Side, input: &SideInput, aliases: &FieldAliases) -> Result<Self, ReconError> {
        let listed = input.headers.iter().map(String::as_str);
        let in_rows = input.rows.iter().flat_map(|row| row.cells.keys().map(String::as_str));
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let headers: Vec<&str> = listed.chain(in_rows).filter(|column| seen.insert(*column)).collect();
        let mut claims = HeaderClaims::new(&headers);

        let missing = |field: &str, tried: &[String]| ReconError::MissingField {
            side,
            label: input.label.clone(),
            field: field.to_string(),
            tried: tried.to_vec(),
        };

        let party_id = claims
            .claim(&aliases.party_id)
            .ok_or_else(|| missing("party id", aliases.party_id.as_slice()))?;
        let invoice_number = claims
            .claim(&aliases.invoice_number)
            .ok_or_else(|| missing("invoice number", aliases.invoice_number.as_slice()))?;
        let invoice_date = claims.claim(&aliases.invoice_date);

        let mut tax_components = Vec::new();
        for (name, component_aliases) in &aliases.tax_components {
            if let Some(column) = claims.claim(component_aliases) {
                tax_components.push((name.clone(), column));
            }
        }

        let taxable_value = claims.claim(&aliases.taxable_value);
        let total_value = claims.claim(&aliases.total_value);
        let party_name = claims.claim(&aliases.party_name);

        if total_value.is_none() && taxable_value.is_none() && tax_components.is_empty() {
            let mut tried = aliases.total_value.clone();
            tried.extend(aliases.taxable_value.iter().cloned());
            for component_aliases in aliases.tax_components.values() {
                tried.extend(component_aliases.iter().cloned());
            }
            return Err(missing("any amount (total, taxable value or tax component)", tried.as_slice()));
        }

        Ok(Self {
            party_id,
            invoice_number,
            party_name,
            invoice_date,
            taxable_value,
            total_value,
            tax_components,
        })
    }
}

// ---------------------------------------------------------------------------
// Field parsers
// ---------------------------------------------------------------------------

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_placeholder(s: &str) -> bool {
    PLACEHOLDERS.contains(&s)
}

/// Trim, collapse internal whitespace, upper-case. Placeholders become empty.
pub fn normalize_party_id(raw: &str) -> String {
    let id = collapse_whitespace(raw).to_uppercase();
    if is_placeholder(&id) {
        String::new()
    } else {
        id
    }
}

/// Canonical invoice number for key construction.
pub fn normalize_invoice_number(raw: &str, mode: InvoiceKeyMode, ignore_leading_zeros: bool) -> String {
    let upper = collapse_whitespace(raw).to_uppercase();
    if is_placeholder(&upper) {
        return String::new();
    }
    let normalized = match mode {
        InvoiceKeyMode::Exact => upper,
        InvoiceKeyMode::Alphanumeric => upper.chars().filter(|c| c.is_alphanumeric()).collect(),
    };
    if ignore_leading_zeros {
        strip_leading_zeros(&normalized)
    } else {
        normalized
    }
}

/// Drop leading zeros from every run of digits: "INV-0042/007" -> "INV-42/7".
fn strip_leading_zeros(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let run: String = chars[start..i].iter().collect();
            let trimmed = run.trim_start_matches('0');
            out.push_str(if trimmed.is_empty() { "0" } else { trimmed });
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !SERIAL_RANGE.contains(&serial) {
        return None;
    }
    // 1900 date system, including the phantom 1900-02-29.
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Parse a date cell. `Ok(None)` means the cell was blank.
pub fn parse_date(cell: &CellValue) -> Result<Option<NaiveDate>, String> {
    match cell {
        CellValue::Empty => Ok(None),
        CellValue::Date(d) => Ok(Some(*d)),
        CellValue::Number(n) => serial_to_date(*n)
            .map(Some)
            .ok_or_else(|| format!("number {n} is not a date serial")),
        CellValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            parse_date_text(s).map(Some).ok_or_else(|| "unrecognized date format".to_string())
        }
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    // Serial numbers exported as text
    if s.chars().all(|c| c.is_ascii_digit()) && s.len() == 5 {
        return s.parse::<f64>().ok().and_then(serial_to_date);
    }
    None
}

fn round_amount(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse a monetary cell. Blank cells are zero; failures carry a reason.
pub fn parse_amount(cell: &CellValue, scale: u32) -> Result<Decimal, String> {
    let value = match cell {
        CellValue::Empty => return Ok(Decimal::ZERO),
        CellValue::Number(n) => Decimal::from_f64(*n).ok_or_else(|| format!("number {n} is out of range"))?,
        CellValue::Date(_) => return Err("date found in amount column".to_string()),
        CellValue::Text(s) => {
            if s.trim().is_empty() {
                return Ok(Decimal::ZERO);
            }
            parse_amount_text(s)?
        }
    };
    if value.abs() > MAX_AMOUNT {
        return Err(format!("amount exceeds {MAX_AMOUNT} in magnitude"));
    }
    Ok(round_amount(value, scale))
}

const NOT_A_NUMBER: &str = "not a number";

/// Financial number text:
/// - strips currency symbols / codes, thousands separators, NBSP, spaces
/// - `(123.45)` and `123.45-` are negative
/// - a comma that can only be a decimal separator ("1.180,50", "99,00")
///   is rejected rather than dropped
fn parse_amount_text(s: &str) -> Result<Decimal, String> {
    let trimmed = s.trim();

    let (mut negative, inner) = if trimmed.starts_with('(') && trimmed.ends_with(')') && trimmed.len() > 2 {
        (true, &trimmed[1..trimmed.len() - 1])
    } else {
        (false, trimmed)
    };

    let mut cleaned: String = inner
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '\'' | '₹' | '$' | '€' | '£'))
        .collect();
    if has_decimal_comma(&cleaned) {
        return Err("comma used as decimal separator".to_string());
    }
    cleaned.retain(|c| c != ',');

    for code in ["INR", "RS.", "RS"] {
        if cleaned.get(..code.len()).is_some_and(|p| p.eq_ignore_ascii_case(code)) {
            cleaned = cleaned[code.len()..].to_string();
            break;
        }
    }

    if let Some(stripped) = cleaned.strip_suffix('-') {
        if negative {
            return Err(NOT_A_NUMBER.to_string());
        }
        negative = true;
        cleaned = stripped.to_string();
    }

    if cleaned.is_empty() {
        return Err(NOT_A_NUMBER.to_string());
    }

    for (i, c) in cleaned.chars().enumerate() {
        match c {
            '0'..='9' | '.' => {}
            '-' | '+' if i == 0 && !negative => {}
            'e' | 'E' => {}
            _ => return Err(NOT_A_NUMBER.to_string()),
        }
    }

    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| NOT_A_NUMBER.to_string())?;
    Ok(if negative { -value } else { value })
}

/// True when the last comma cannot be a thousands separator: it follows the
/// last dot, or (without a dot) it is not followed by exactly three digits.
/// Both "1,180.50" and Indian "1,18,000" group correctly.
fn has_decimal_comma(s: &str) -> bool {
    let Some(comma) = s.rfind(',') else { return false };
    match s.rfind('.') {
        Some(dot) => comma > dot,
        None => s[comma + 1..].chars().take_while(|c| c.is_ascii_digit()).count() != 3,
    }
}

/// Taxable value plus every component. `None` when the sum leaves the
/// `Decimal` range.
fn derived_total(taxable_value: Decimal, components: &BTreeMap<String, Decimal>) -> Option<Decimal> {
    components.values().try_fold(taxable_value, |acc, v| acc.checked_add(*v))
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

pub struct Normalizer<'a> {
    side: Side,
    columns: ColumnMap,
    keys: &'a KeyConfig,
    scale: u32,
}

impl<'a> Normalizer<'a> {
    pub fn new(side: Side, input: &SideInput, config: &'a ReconConfig) -> Result<Self, ReconError> {
        let columns = ColumnMap::resolve(side, input, &config.fields)?;
        log::debug!("side {side} ('{}') columns: {columns:?}", input.label);
        Ok(Self {
            side,
            columns,
            keys: &config.keys,
            scale: config.amounts.scale,
        })
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    pub fn normalize(&self, row: &RawRow, ordinal: usize) -> Record {
        let mut warnings = Vec::new();
        let cell = |column: &str| cell_at(row, column);

        let party_cell = cell(self.columns.party_id.as_str());
        let party_id = normalize_party_id(&party_cell.as_text());
        if party_id.is_empty() {
            warnings.push(warning(Field::PartyId, &self.columns.party_id, &party_cell, "missing"));
        } else if self.keys.party_id_length > 0 && party_id.chars().count() != self.keys.party_id_length {
            warnings.push(warning(
                Field::PartyId,
                &self.columns.party_id,
                &party_cell,
                &format!("expected {} characters, found {}", self.keys.party_id_length, party_id.chars().count()),
            ));
        }

        let invoice_cell = cell(self.columns.invoice_number.as_str());
        let invoice_number = normalize_invoice_number(
            &invoice_cell.as_text(),
            self.keys.invoice_mode,
            self.keys.ignore_leading_zeros,
        );
        if invoice_number.is_empty() {
            warnings.push(warning(Field::InvoiceNumber, &self.columns.invoice_number, &invoice_cell, "missing"));
        }

        let invoice_date = match &self.columns.invoice_date {
            Some(column) => {
                let date_cell = cell(column.as_str());
                match parse_date(&date_cell) {
                    Ok(Some(d)) => Some(d),
                    Ok(None) => {
                        warnings.push(warning(Field::InvoiceDate, column, &date_cell, "missing"));
                        None
                    }
                    Err(reason) => {
                        warnings.push(warning(Field::InvoiceDate, column, &date_cell, &reason));
                        None
                    }
                }
            }
            None => None,
        };

        let taxable_value = match &self.columns.taxable_value {
            Some(column) => self.amount(&cell(column.as_str()), column, Field::TaxableValue, &mut warnings),
            None => Decimal::ZERO,
        };

        let mut tax_components = BTreeMap::new();
        for (name, column) in &self.columns.tax_components {
            let value = self.amount(&cell(column.as_str()), column, Field::TaxComponent, &mut warnings);
            tax_components.insert(name.clone(), value);
        }

        let total_cell = self
            .columns
            .total_value
            .as_ref()
            .map(|column| (column, cell(column.as_str())))
            .filter(|(_, value)| !value.is_blank());
        let total_value = match total_cell {
            Some((column, value)) => self.amount(&value, column, Field::TotalValue, &mut warnings),
            None => derived_total(taxable_value, &tax_components).unwrap_or_else(|| {
                warnings.push(ParseWarning {
                    field: Field::TotalValue,
                    column: None,
                    value: String::new(),
                    reason: "taxable value plus tax components is out of range".to_string(),
                });
                Decimal::ZERO
            }),
        };

        let party_name = self
            .columns
            .party_name
            .as_ref()
            .map(|column| collapse_whitespace(&cell(column.as_str()).as_text()))
            .filter(|name| !name.is_empty());

        Record {
            side: self.side,
            party_id,
            party_name,
            invoice_number,
            invoice_date,
            taxable_value,
            tax_components,
            total_value,
            source_row: row.row_ref.clone(),
            ordinal,
            warnings,
        }
    }

    fn amount(&self, cell: &CellValue, column: &str, field: Field, warnings: &mut Vec<ParseWarning>) -> Decimal {
        match parse_amount(cell, self.scale) {
            Ok(value) => value,
            Err(reason) => {
                warnings.push(warning(field, column, cell, &reason));
                Decimal::ZERO
            }
        }
    }
}

fn cell_at(row: &RawRow, column: &str) -> CellValue {
    row.cells.get(column).cloned().unwrap_or(CellValue::Empty)
}

fn warning(field: Field, column: &str, cell: &CellValue, reason: &str) -> ParseWarning {
    ParseWarning {
        field,
        column: Some(column.to_string()),
        value: cell.as_text(),
        reason: reason.to_string(),
    }
}

/// Normalize every non-blank row of one side, in order.
pub fn normalize_side(side: Side, input: &SideInput, config: &ReconConfig) -> Result<Vec<Record>, ReconError> {
    let empty = || ReconError::EmptySide { side, label: input.label.clone() };

    if input.rows.iter().all(RawRow::is_blank) {
        return Err(empty());
    }

    let normalizer = Normalizer::new(side, input, config)?;
    let records: Vec<Record> = input
        .rows
        .iter()
        .filter(|row| !row.is_blank())
        .enumerate()
        .map(|(ordinal, row)| normalizer.normalize(row, ordinal))
        .collect();

    let skipped = input.rows.len() - records.len();
    if skipped > 0 {
        log::debug!("side {side}: skipped {skipped} blank row(s)");
    }
    let flagged = records.iter().filter(|r| r.has_warnings()).count();
    if flagged > 0 {
        log::warn!("side {side} ('{}'): {flagged} of {} record(s) have parse warnings", input.label, records.len());
    }

    Ok(records)
}

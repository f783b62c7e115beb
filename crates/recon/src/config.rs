use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ReconError;

/// GSTIN length. Party ids of any other length get a warning.
pub const DEFAULT_PARTY_ID_LENGTH: usize = 15;

const MAX_AMOUNT_SCALE: u32 = 6;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Engine settings. The tolerance has no engine-side default: callers
/// pick one and document it.
#[derive(Debug, Clone)]
pub struct ReconConfig {
    /// Largest absolute difference in total value still considered a match.
    pub tolerance: Decimal,
    pub keys: KeyConfig,
    pub amounts: AmountConfig,
    pub fallback: FallbackConfig,
    pub fields: FieldAliases,
}

/// On-disk shape of a config file; every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    tolerance: Option<Decimal>,
    keys: KeyConfig,
    amounts: AmountConfig,
    fallback: FallbackConfig,
    fields: FieldAliases,
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub invoice_mode: InvoiceKeyMode,
    /// Treat "INV-007" and "INV-7" as the same invoice.
    pub ignore_leading_zeros: bool,
    /// Expected party id length; 0 disables the check.
    pub party_id_length: usize,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            invoice_mode: InvoiceKeyMode::Alphanumeric,
            ignore_leading_zeros: false,
            party_id_length: DEFAULT_PARTY_ID_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKeyMode {
    /// Keep letters and digits only: "inv/001 " == "INV-001".
    Alphanumeric,
    /// Trim, collapse whitespace and upper-case; punctuation is significant.
    Exact,
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AmountConfig {
    /// Decimal places amounts are rounded to after parsing.
    pub scale: u32,
    pub compare: CompareMode,
}

impl Default for AmountConfig {
    fn default() -> Self {
        Self { scale: 2, compare: CompareMode::Total }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    /// Compare total value only.
    Total,
    /// Taxable value, every tax component and total must each be within tolerance.
    Components,
}

impl FromStr for CompareMode {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "total" => Ok(Self::Total),
            "components" => Ok(Self::Components),
            other => Err(ReconError::ConfigValidation(format!(
                "compare must be \"total\" or \"components\", got \"{other}\""
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Extra passes over records still missing a counterpart after key
/// matching. Strategies run in the listed order; only pairings within
/// tolerance are accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub strategies: Vec<FallbackStrategy>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self { enabled: false, strategies: vec![FallbackStrategy::PartyDate] }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Same party id and invoice date.
    PartyDate,
    /// Party id blank on exactly one side, same tax head.
    MissingPartyId,
    /// Same tax head, party ids ignored.
    AmountOnly,
}

impl FallbackStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PartyDate => "party_date",
            Self::MissingPartyId => "missing_party_id",
            Self::AmountOnly => "amount_only",
        }
    }
}

impl FromStr for FallbackStrategy {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "party_date" => Ok(Self::PartyDate),
            "missing_party_id" => Ok(Self::MissingPartyId),
            "amount_only" => Ok(Self::AmountOnly),
            other => Err(ReconError::ConfigValidation(format!(
                "fallback strategy must be party_date, missing_party_id or amount_only, got \"{other}\""
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Field aliases
// ---------------------------------------------------------------------------

/// Header keywords used to locate each semantic field. Matching is
/// case-insensitive substring search; the first alias that hits wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldAliases {
    pub party_id: Vec<String>,
    pub party_name: Vec<String>,
    pub invoice_number: Vec<String>,
    pub invoice_date: Vec<String>,
    pub taxable_value: Vec<String>,
    pub total_value: Vec<String>,
    /// Component name (as reported) to header keywords.
    pub tax_components: BTreeMap<String, Vec<String>>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            party_id: strings(&["gstin", "gst number", "gst no", "tin"]),
            party_name: strings(&["party", "legal name", "trade name", "supplier", "customer", "name"]),
            invoice_number: strings(&["invoice number", "invoice no", "inv no", "bill no", "document number"]),
            invoice_date: strings(&["invoice date", "inv dt", "date"]),
            taxable_value: strings(&["taxable value", "taxable amount", "taxable"]),
            total_value: strings(&["invoice value", "total value", "total amount", "total"]),
            tax_components: BTreeMap::from([
                ("IGST".to_string(), strings(&["igst", "integrated tax"])),
                ("CGST".to_string(), strings(&["cgst", "central tax"])),
                ("SGST".to_string(), strings(&["sgst", "state tax", "state/ut tax", "utgst"])),
                ("CESS".to_string(), strings(&["cess"])),
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

/// Parse a user-supplied tolerance ("1", "0.50", " 2.5 ").
pub fn parse_tolerance(input: &str) -> Result<Decimal, ReconError> {
    let trimmed = input.trim();
    let value = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| ReconError::InvalidTolerance(input.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ReconError::InvalidTolerance(input.to_string()));
    }
    Ok(value)
}

impl ReconConfig {
    /// Built-in settings with the caller's tolerance.
    pub fn new(tolerance: Decimal) -> Self {
        Self {
            tolerance,
            keys: KeyConfig::default(),
            amounts: AmountConfig::default(),
            fallback: FallbackConfig::default(),
            fields: FieldAliases::default(),
        }
    }

    /// Parse a TOML config. `default_tolerance` applies when the file sets none.
    pub fn from_toml(input: &str, default_tolerance: Decimal) -> Result<Self, ReconError> {
        let file: ConfigFile =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        let config = Self {
            tolerance: file.tolerance.unwrap_or(default_tolerance),
            keys: file.keys,
            amounts: file.amounts,
            fallback: file.fallback,
            fields: file.fields,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_tolerance(mut self, tolerance: Decimal) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.tolerance.is_sign_negative() && !self.tolerance.is_zero() {
            return Err(ReconError::InvalidTolerance(self.tolerance.to_string()));
        }

        if self.amounts.scale > MAX_AMOUNT_SCALE {
            return Err(ReconError::ConfigValidation(format!(
                "amounts.scale must be at most {MAX_AMOUNT_SCALE}, got {}",
                self.amounts.scale
            )));
        }

        let required = [
            ("party_id", &self.fields.party_id),
            ("invoice_number", &self.fields.invoice_number),
        ];
        for (name, aliases) in required {
            if aliases.iter().all(|a| a.trim().is_empty()) {
                return Err(ReconError::ConfigValidation(format!(
                    "fields.{name} needs at least one alias"
                )));
            }
        }

        if self.fallback.enabled && self.fallback.strategies.is_empty() {
            return Err(ReconError::ConfigValidation(
                "fallback.strategies must list at least one strategy when fallback is enabled".into(),
            ));
        }
        for (i, strategy) in self.fallback.strategies.iter().enumerate() {
            if self.fallback.strategies[..i].contains(strategy) {
                return Err(ReconError::ConfigValidation(format!(
                    "fallback strategy {} is listed twice",
                    strategy.as_str()
                )));
            }
        }

        for (component, aliases) in &self.fields.tax_components {
            if component.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "tax component names must not be empty".into(),
                ));
            }
            if aliases.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "fields.tax_components.{component} needs at least one alias"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! `taxrecon run | validate | sheets`

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Args;
use rust_decimal::Decimal;
use taxrecon_io::sheets::{self, SheetKind};
use taxrecon_io::report::{default_output_path, write_report};
use taxrecon_io::{csv, xlsx, Table};
use taxrecon_recon::config::parse_tolerance;
use taxrecon_recon::{CompareMode, FallbackStrategy, MatchStatus, ReconConfig, ReconInput, ReconReport};

use crate::exit_codes::EXIT_DISCREPANCIES;
use crate::CliError;

/// Tolerance when neither --tolerance nor the config file sets one.
pub const DEFAULT_TOLERANCE: Decimal = Decimal::ONE;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workbook holding both sides, or the side A file with --against
    pub input: PathBuf,

    /// Read side B from this workbook or CSV file
    #[arg(long)]
    pub against: Option<PathBuf>,

    /// Sheet for side A (the base register)
    #[arg(long)]
    pub sheet_a: Option<String>,

    /// Sheet for side B
    #[arg(long)]
    pub sheet_b: Option<String>,

    /// Largest total difference still counted as a match [default: 1.00]
    #[arg(long, value_parser = parse_tolerance)]
    pub tolerance: Option<Decimal>,

    /// TOML config file (flags override it)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Re-pair leftovers with the configured fallback strategies
    /// [default strategy: party_date]
    #[arg(long)]
    pub fallback: bool,

    /// Fallback strategies to run, in order (implies --fallback):
    /// party_date, missing_party_id, amount_only
    #[arg(long, value_delimiter = ',', value_parser = FallbackStrategy::from_str)]
    pub fallback_strategy: Vec<FallbackStrategy>,

    /// Amount comparison: total or components
    #[arg(long, value_parser = CompareMode::from_str)]
    pub compare: Option<CompareMode>,

    /// Annotated workbook path [default: <input>_RECON_<timestamp>.xlsx]
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Print the report as JSON to stdout
    #[arg(long)]
    pub json: bool,

    /// Write the report as JSON to a file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Exit 1 when any record is not matched
    #[arg(long)]
    pub strict: bool,
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(&args)?;
    let (a, b) = load_sides(&args)?;

    let input = ReconInput { a: a.to_side_input(), b: b.to_side_input() };
    let report = taxrecon_recon::run(&config, &input)?;

    let output = args.output.clone().unwrap_or_else(|| {
        default_output_path(&args.input, chrono::Local::now().naive_local())
    });
    let stats = write_report(&report, &a, &b, &output)?;
    log::info!("wrote {} ({} sheets, {} rows)", output.display(), stats.sheets, stats.rows);

    if args.json || args.json_output.is_some() {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        if let Some(ref path) = args.json_output {
            std::fs::write(path, &json_str)
                .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
            log::info!("wrote {}", path.display());
        }
        if args.json {
            println!("{json_str}");
        }
    }

    print_summary(&report);
    eprintln!("output: {}", output.display());

    let discrepancies = report.summary.discrepancies();
    if args.strict && discrepancies > 0 {
        return Err(CliError::new(
            EXIT_DISCREPANCIES,
            format!("{discrepancies} record(s) not matched (--strict)"),
        ));
    }
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let fallback = if config.fallback.enabled {
        let names: Vec<&str> = config.fallback.strategies.iter().map(FallbackStrategy::as_str).collect();
        format!("on ({})", names.join(", "))
    } else {
        "off".to_string()
    };
    eprintln!(
        "valid: tolerance {}, compare {}, fallback {}, {} tax component(s)",
        config.tolerance,
        compare_name(config.amounts.compare),
        fallback,
        config.fields.tax_components.len(),
    );
    Ok(())
}

pub fn cmd_sheets(input: PathBuf, json: bool) -> Result<(), CliError> {
    let names = if xlsx::is_workbook(&input) {
        xlsx::sheet_names(&input)?
    } else {
        // Reading checks the file exists and parses
        vec![csv::read_csv(&input, &csv::default_label(&input))?.name]
    };
    let pair = sheets::detect_pair(&names, None, None).ok();

    if json {
        let listed: Vec<serde_json::Value> = names
            .iter()
            .map(|name| {
                serde_json::json!({
                    "name": name,
                    "kind": sheets::classify_sheet(name).map(|k| k.to_string()),
                })
            })
            .collect();
        let out = serde_json::json!({
            "sheets": listed,
            "pair": pair.as_ref().map(|p| serde_json::json!({ "a": p.a, "b": p.b })),
        });
        let json_str = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    for name in &names {
        let kind = sheets::classify_sheet(name).map(|k| k.to_string()).unwrap_or_else(|| "-".into());
        println!("{name}\t{kind}");
    }
    match pair {
        Some(p) => println!("pair: A = {}, B = {}", p.a, p.b),
        None => println!("pair: not detected (use --sheet-a/--sheet-b or --against)"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn read_config(path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    Ok(ReconConfig::from_toml(&config_str, DEFAULT_TOLERANCE)?)
}

/// Config file (or defaults) with command-line overrides applied.
fn load_config(args: &RunArgs) -> Result<ReconConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => ReconConfig::new(DEFAULT_TOLERANCE),
    };
    if let Some(tolerance) = args.tolerance {
        config = config.with_tolerance(tolerance);
    }
    if args.fallback {
        config.fallback.enabled = true;
    }
    if !args.fallback_strategy.is_empty() {
        config.fallback.enabled = true;
        config.fallback.strategies = args.fallback_strategy.clone();
    }
    if let Some(mode) = args.compare {
        config.amounts.compare = mode;
    }
    config.validate()?;
    Ok(config)
}

fn load_sides(args: &RunArgs) -> Result<(Table, Table), CliError> {
    if let Some(against) = &args.against {
        let a = load_single(&args.input, args.sheet_a.as_deref(), &[SheetKind::Books])?;
        let b = load_single(against, args.sheet_b.as_deref(), &[SheetKind::Gstr2b, SheetKind::Gstr3b])?;
        return Ok((a, b));
    }

    if !xlsx::is_workbook(&args.input) {
        return Err(CliError::usage(format!(
            "{} holds a single table, a run needs two sides",
            args.input.display()
        ))
        .with_hint("pass side B with --against <file>"));
    }

    let names = xlsx::sheet_names(&args.input)?;
    let pair = sheets::detect_pair(&names, args.sheet_a.as_deref(), args.sheet_b.as_deref())?;
    log::info!("side A: '{}', side B: '{}'", pair.a, pair.b);

    let mut tables = xlsx::read_sheets(&args.input, &[pair.a, pair.b])?.into_iter();
    match (tables.next(), tables.next()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(CliError::io(format!("cannot read both sheets of {}", args.input.display()))),
    }
}

/// One side from its own file: a sheet of a workbook, or a whole CSV.
fn load_single(path: &Path, sheet: Option<&str>, preferred: &[SheetKind]) -> Result<Table, CliError> {
    if !xlsx::is_workbook(path) {
        if let Some(sheet) = sheet {
            log::warn!("{} is not a workbook, ignoring sheet name '{sheet}'", path.display());
        }
        return Ok(csv::read_csv(path, &csv::default_label(path))?);
    }

    let names = xlsx::sheet_names(path)?;
    let name = sheets::pick_sheet(&names, sheet, preferred)?;
    log::info!("{}: using sheet '{name}'", path.display());
    xlsx::read_sheets(path, &[name])?
        .pop()
        .ok_or_else(|| CliError::io(format!("cannot read {}", path.display())))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn compare_name(mode: CompareMode) -> &'static str {
    match mode {
        CompareMode::Total => "total",
        CompareMode::Components => "components",
    }
}

fn print_summary(report: &ReconReport) {
    let meta = &report.meta;
    let s = &report.summary;
    eprintln!(
        "recon: '{}' ({} records) vs '{}' ({} records), tolerance {}",
        meta.label_a, s.records_a, meta.label_b, s.records_b, meta.tolerance,
    );
    eprintln!("  {} pair(s), {} low-confidence record(s)", s.pairs, s.low_confidence);
    let fallback_pairs = report.results.iter().filter(|r| r.pair_id.is_some() && r.basis.is_fallback()).count();
    if fallback_pairs > 0 {
        eprintln!("  {fallback_pairs} pair(s) from fallback strategies");
    }
    for status in MatchStatus::ALL {
        eprintln!("  {:<24} {}", status.as_str(), s.count(status));
    }
    if !s.mismatch_variance.is_zero() {
        eprintln!("  mismatch variance: {}", s.mismatch_variance);
    }
}

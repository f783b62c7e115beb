// taxrecon - reconcile purchase books against GSTR-2B / GSTR-3B returns

mod exit_codes;
mod logging;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::*;
use recon::RunArgs;

#[derive(Parser)]
#[command(name = "taxrecon")]
#[command(about = "Reconcile invoice registers against GST returns")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile two sheets and write the annotated workbook
    #[command(after_help = "\
Side A is the base register (purchase books), side B the return it is checked
against. Without --sheet-a/--sheet-b the pair is detected from sheet names:
Books/2B, then Books/3B, then 3B/2B, else a workbook with exactly two sheets.

Examples:
  taxrecon run returns.xlsx
  taxrecon run returns.xlsx --sheet-a 'PR Apr' --sheet-b 'GSTR-2B Apr'
  taxrecon run books.csv --against gstr2b.csv --tolerance 0.5
  taxrecon run returns.xlsx --config recon.toml --fallback --json
  taxrecon run returns.xlsx --fallback-strategy party_date,missing_party_id,amount_only")]
    Run(RunArgs),

    /// Check a config file without running
    #[command(after_help = "\
Examples:
  taxrecon validate recon.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },

    /// List the sheets of an input and the pair a run would use
    #[command(after_help = "\
Examples:
  taxrecon sheets returns.xlsx
  taxrecon sheets returns.xlsx --json")]
    Sheets {
        /// Workbook or CSV file
        input: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            "\nengine:  taxrecon-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            "\nengine:  taxrecon-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => recon::cmd_run(args),
        Commands::Validate { config } => recon::cmd_validate(config),
        Commands::Sheets { input, json } => recon::cmd_sheets(input, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<taxrecon_io::IoError> for CliError {
    fn from(err: taxrecon_io::IoError) -> Self {
        let code = if err.is_input_error() { EXIT_INPUT } else { EXIT_IO };
        let hint = match &err {
            taxrecon_io::IoError::SheetPair(_) | taxrecon_io::IoError::UnknownSheet { .. } => {
                Some("name the sheets with --sheet-a and --sheet-b".to_string())
            }
            _ => None,
        };
        CliError { code, message: err.to_string(), hint }
    }
}

impl From<taxrecon_recon::ReconError> for CliError {
    fn from(err: taxrecon_recon::ReconError) -> Self {
        use taxrecon_recon::ReconError;
        let code = if err.is_input_error() { EXIT_INPUT } else { EXIT_INVALID_CONFIG };
        let hint = match &err {
            ReconError::MissingField { field, .. } => Some(format!(
                "rename the column or add its header to [fields] {field} in the config"
            )),
            _ => None,
        };
        CliError { code, message: err.to_string(), hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "taxrecon", "-v", "run", "r.xlsx", "--sheet-a", "PR", "--tolerance", "0.5", "--compare",
            "components", "--fallback", "--strict",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.input, PathBuf::from("r.xlsx"));
                assert_eq!(args.sheet_a.as_deref(), Some("PR"));
                assert_eq!(args.tolerance, Some(rust_decimal::Decimal::new(5, 1)));
                assert!(args.fallback);
                assert!(args.fallback_strategy.is_empty());
                assert!(args.strict);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn bad_tolerance_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["taxrecon", "run", "r.xlsx", "--tolerance", "-1"]).is_err());
        assert!(Cli::try_parse_from(["taxrecon", "run", "r.xlsx", "--tolerance", "abc"]).is_err());
        assert!(Cli::try_parse_from(["taxrecon", "run", "r.xlsx", "--compare", "fuzzy"]).is_err());
        assert!(Cli::try_parse_from(["taxrecon", "run", "r.xlsx", "--fallback-strategy", "gstin"]).is_err());
    }

    #[test]
    fn error_codes_follow_error_kind() {
        let err: CliError = taxrecon_io::IoError::SheetPair("x".into()).into();
        assert_eq!(err.code, EXIT_INPUT);
        assert!(err.hint.is_some());

        let err: CliError = taxrecon_recon::ReconError::ConfigParse("bad".into()).into();
        assert_eq!(err.code, EXIT_INVALID_CONFIG);
    }
}

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use ledgerlift_core::{
    reconcile, FileFormat, Milliunits, ParseResult, ReconciliationInput, ReconciliationReport,
};
use ledgerlift_import::{
    detect_format, parse_file, preview, ColumnMapping, CsvOptions, HistoryEntry, ImportConfig,
    KnownPayee, ParseOptions, PayeeCategoryIndex,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Cli, Commands, ParseArgs};

#[derive(Debug, Serialize)]
pub struct DetectOutput {
    pub file: PathBuf,
    /// `None` serialises as `"unknown"`.
    #[serde(serialize_with = "format_or_unknown")]
    pub format: Option<FileFormat>,
}

fn format_or_unknown<S: serde::Serializer>(
    format: &Option<FileFormat>,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.serialize_str(format.map_or("unknown", FileFormat::as_str))
}

#[derive(Debug, Serialize)]
pub struct ParseOutput {
    #[serde(flatten)]
    pub result: ParseResult,
    pub transaction_count: usize,
    pub total_amount: Milliunits,
    pub total_display: String,
}

impl From<ParseResult> for ParseOutput {
    fn from(result: ParseResult) -> Self {
        let total = result.total_amount();
        ParseOutput {
            transaction_count: result.len(),
            total_amount: total,
            total_display: total.to_string(),
            result,
        }
    }
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Detect { file } => {
            print_json(&detect(&file).await?)?;
        }
        Commands::Parse { file, options } => {
            let config = load_config(cli.config.as_deref()).await?;
            let result = parse(&file, &parse_options(&config, &options)?).await?;
            print_json(&ParseOutput::from(result))?;
        }
        Commands::Reconcile {
            file,
            options,
            imported,
            duplicates,
            imported_total,
        } => {
            let config = load_config(cli.config.as_deref()).await?;
            let result = parse(&file, &parse_options(&config, &options)?).await?;
            let report = check_import(&result, imported, duplicates, imported_total);
            print_json(&report)?;
            if !report.all_passed {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Suggest {
            file,
            options,
            history,
            payees,
        } => {
            let config = load_config(cli.config.as_deref()).await?;
            let result = parse(&file, &parse_options(&config, &options)?).await?;
            let history: Vec<HistoryEntry> = read_json(&history).await?;
            let known: Vec<KnownPayee> = match payees {
                Some(path) => read_json(&path).await?,
                None => Vec::new(),
            };
            let index = PayeeCategoryIndex::new(history);
            print_json(&preview(&result.transactions, &index, &known))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn detect(file: &Path) -> Result<DetectOutput> {
    let format = detect_format(file).await?;
    Ok(DetectOutput {
        file: file.to_path_buf(),
        format,
    })
}

async fn parse(file: &Path, options: &ParseOptions) -> Result<ParseResult> {
    // Not wrapped in context: `main` reports ImportError by its code.
    Ok(parse_file(file, options).await?)
}

pub fn check_import(
    result: &ParseResult,
    imported: u64,
    duplicates: u64,
    imported_total: Milliunits,
) -> ReconciliationReport {
    reconcile(ReconciliationInput {
        source_transaction_count: result.len() as u64,
        source_total_amount: result.total_amount(),
        imported_count: imported,
        duplicate_count: duplicates,
        imported_total_amount: imported_total,
    })
}

pub async fn load_config(path: Option<&Path>) -> Result<ImportConfig> {
    match path {
        Some(path) => ImportConfig::load(path)
            .await
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ImportConfig::default()),
    }
}

/// Flags layered over the config file; profile and inference apply below both.
pub fn parse_options(config: &ImportConfig, args: &ParseArgs) -> Result<ParseOptions> {
    Ok(ParseOptions {
        format: args.format,
        csv: config.csv.clone().overlay(csv_overrides(args)?),
    })
}

fn csv_overrides(args: &ParseArgs) -> Result<CsvOptions> {
    let invert_amounts = match (args.invert, args.no_invert) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    };

    let any_column = [
        &args.amount_column,
        &args.debit_column,
        &args.credit_column,
        &args.memo_column,
    ]
    .iter()
    .any(|c| c.is_some());

    let column_mapping = match (&args.date_column, &args.payee_column) {
        (Some(date), Some(payee)) => Some(ColumnMapping {
            date: date.clone(),
            payee: payee.clone(),
            amount: args.amount_column.clone(),
            debit: args.debit_column.clone(),
            credit: args.credit_column.clone(),
            memo: args.memo_column.clone(),
        }),
        (None, None) if !any_column => None,
        _ => bail!("--date-column and --payee-column are both required for a custom column mapping"),
    };

    Ok(CsvOptions {
        column_mapping,
        date_format_hint: args.date_format,
        invert_amounts,
    })
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

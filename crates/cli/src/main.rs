use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use ledgerlift_core::{DateFormatHint, FileFormat, Milliunits};
use ledgerlift_import::ImportError;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "ledgerlift",
    version,
    about = "Normalize bank exports (CSV, OFX, QFX) for deduplicated ledger import."
)]
pub struct Cli {
    /// TOML import settings
    #[arg(long, global = true, env = "LEDGERLIFT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report the format of an export file.
    Detect {
        file: PathBuf,
    },
    /// Parse an export file into normalized transactions.
    Parse {
        file: PathBuf,
        #[command(flatten)]
        options: ParseArgs,
    },
    /// Check an import outcome against the parsed source file.
    Reconcile {
        file: PathBuf,
        #[command(flatten)]
        options: ParseArgs,
        /// Transactions the ledger accepted
        #[arg(long)]
        imported: u64,
        /// Transactions the ledger rejected as duplicates
        #[arg(long, default_value_t = 0)]
        duplicates: u64,
        /// Sum of the accepted amounts, e.g. -1234.56
        #[arg(long, allow_hyphen_values = true)]
        imported_total: Milliunits,
    },
    /// Preview an import with category suggestions from ledger history.
    Suggest {
        file: PathBuf,
        #[command(flatten)]
        options: ParseArgs,
        /// JSON array of {payee, category_id, category_name, date}
        #[arg(long)]
        history: PathBuf,
        /// JSON array of {id, name}
        #[arg(long)]
        payees: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct ParseArgs {
    /// Parse as this format instead of detecting it (csv, ofx, qfx)
    #[arg(long)]
    pub format: Option<FileFormat>,
    /// Day/month order for ambiguous CSV dates (MM/DD/YYYY, DD/MM/YYYY, auto)
    #[arg(long)]
    pub date_format: Option<DateFormatHint>,
    /// Flip the sign of every CSV amount
    #[arg(long, conflicts_with = "no_invert")]
    pub invert: bool,
    /// Keep CSV signs even when the bank profile would flip them
    #[arg(long)]
    pub no_invert: bool,
    /// CSV column holding the transaction date
    #[arg(long)]
    pub date_column: Option<String>,
    /// CSV column holding the payee
    #[arg(long)]
    pub payee_column: Option<String>,
    /// CSV column holding a signed amount
    #[arg(long)]
    pub amount_column: Option<String>,
    /// CSV column holding outflows
    #[arg(long)]
    pub debit_column: Option<String>,
    /// CSV column holding inflows
    #[arg(long)]
    pub credit_column: Option<String>,
    /// CSV column holding the memo
    #[arg(long)]
    pub memo_column: Option<String>,
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    code: &'a str,
    message: String,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("LEDGERLIFT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match commands::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // Ingestion failures are reported as data; everything else is a crash.
            if let Some(import) = e.downcast_ref::<ImportError>() {
                tracing::error!(code = import.code(), "{e:#}");
                let output = ErrorOutput {
                    code: import.code(),
                    message: import.to_string(),
                };
                if let Ok(json) = serde_json::to_string_pretty(&output) {
                    println!("{json}");
                }
            } else {
                tracing::error!("{e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

pub mod config;
pub mod csv;
pub mod detect;
pub mod error;
pub mod markup;
pub mod ofx;
pub mod profile;
pub mod row;
pub mod suggest;

use std::path::Path;
use std::time::Instant;

use ledgerlift_core::{FileFormat, ParseResult};

pub use config::{ConfigError, ImportConfig};
pub use self::csv::{parse_csv, CsvOptions};
pub use detect::{
    detect_format, detect_from_content, detect_loaded, format_from_extension, read_content,
};
pub use error::ImportError;
pub use ofx::parse_ofx;
pub use profile::{detect_profile, infer_mapping, BankProfile, ColumnMapping, BANK_PROFILES};
pub use row::{RowOutcome, SkipReason};
pub use suggest::{
    match_known_payee, preview, CategorySuggestion, Confidence, HistoryEntry, ImportPreview,
    KnownPayee, PayeeCategoryIndex, TransactionPreview,
};

/// What to do with one export file.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Skip detection and parse as this format.
    pub format: Option<FileFormat>,
    pub csv: CsvOptions,
}

/// Detect (unless told), read and parse one export file.
pub async fn parse_file(path: &Path, options: &ParseOptions) -> Result<ParseResult, ImportError> {
    let started = Instant::now();

    let content = read_content(path).await?;
    let format = options
        .format
        .or_else(|| detect_loaded(path, &content))
        .ok_or_else(|| ImportError::UnsupportedFormat(path.to_path_buf()))?;

    let result = match format {
        FileFormat::Csv => parse_csv(&content, &options.csv)?,
        FileFormat::Ofx | FileFormat::Qfx => parse_ofx(&content, format).await?,
    };

    tracing::info!(
        path = %path.display(),
        %format,
        transactions = result.len(),
        total = %result.total_amount(),
        warnings = result.warnings.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "parsed export file"
    );
    Ok(result)
}

use ledgerlift_core::{NormalizedTransaction, ParseResult};
use thiserror::Error;

/// Why a single source row was left out. `Display` is the warning text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("Row {row}: missing date, skipping")]
    MissingDate { row: usize },
    #[error("Row {row}: could not parse date \"{raw}\", skipping")]
    UnparseableDate { row: usize, raw: String },
    #[error("Row {row}: invalid calendar date \"{raw}\", skipping")]
    InvalidDate { row: usize, raw: String },
    #[error("Row {row}: missing amount, skipping")]
    MissingAmount { row: usize },
    #[error("Row {row}: invalid amount \"{raw}\", skipping")]
    InvalidAmount { row: usize, raw: String },
    #[error("Row {row}: missing payee/description, skipping")]
    MissingPayee { row: usize },
    #[error("Transaction {index}: {detail}, skipping")]
    Transaction { index: usize, detail: String },
}

/// Per-row result of ingestion.
#[derive(Debug, Clone)]
pub enum RowOutcome {
    Parsed(NormalizedTransaction),
    Skipped(SkipReason),
}

impl RowOutcome {
    /// Fold one outcome into the run result, emitting exactly one warning per skip.
    pub fn record(self, result: &mut ParseResult) {
        match self {
            RowOutcome::Parsed(tx) => result.transactions.push(tx),
            RowOutcome::Skipped(reason) => {
                tracing::debug!(%reason, "skipped row");
                result.warnings.push(reason.to_string());
            }
        }
    }
}

impl From<SkipReason> for RowOutcome {
    fn from(reason: SkipReason) -> Self {
        RowOutcome::Skipped(reason)
    }
}

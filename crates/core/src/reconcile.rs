use serde::{Deserialize, Serialize};

use crate::money::{describe_amount, Milliunits};

/// Aggregates from the source file and from the ledger's import response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationInput {
    pub source_transaction_count: u64,
    pub source_total_amount: Milliunits,
    pub imported_count: u64,
    pub duplicate_count: u64,
    pub imported_total_amount: Milliunits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub all_passed: bool,
    pub count_match: bool,
    pub amount_match: bool,
    /// `source - (imported + duplicates)`; positive means rows went missing.
    pub count_difference: i64,
    /// `source_total - imported_total`.
    pub amount_difference: Milliunits,
    pub hints: Vec<String>,
    #[serde(flatten)]
    pub input: ReconciliationInput,
}

/// Compare source statistics against what the ledger accepted.
pub fn reconcile(input: ReconciliationInput) -> ReconciliationReport {
    let accounted = i128::from(input.imported_count) + i128::from(input.duplicate_count);
    let count_difference = (i128::from(input.source_transaction_count) - accounted)
        .clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64;
    let amount_difference = input.source_total_amount - input.imported_total_amount;

    let count_match = count_difference == 0;
    let amount_match = amount_difference.is_zero();

    let mut hints = Vec::new();
    if !count_match {
        let direction = if count_difference > 0 {
            "missing from import"
        } else {
            "extra in import"
        };
        hints.push(format!(
            "Count mismatch: {} transaction(s) {direction}. Check for skipped rows (bad dates, missing amounts) in the parse step.",
            count_difference.unsigned_abs()
        ));
    }
    if !amount_match {
        hints.push(format!(
            "Amount mismatch: difference of {}. This may indicate a parsing error or amount sign issue.",
            describe_amount(amount_difference.value())
        ));
    }

    ReconciliationReport {
        all_passed: count_match && amount_match,
        count_match,
        amount_match,
        count_difference,
        amount_difference,
        hints,
        input,
    }
}
